use std::fs;
use std::path::Path;

use crate::io::vault_io::{VaultError, CONFIG_FILE};
use crate::model::config::VaultConfig;

/// Read the vault config, returning both the parsed config and the raw
/// toml_edit document for round-trip-safe editing. A missing file reads as
/// an empty document.
pub fn read_config(root: &Path) -> Result<(VaultConfig, toml_edit::DocumentMut), VaultError> {
    let config_path = root.join(CONFIG_FILE);
    let config_text = if config_path.exists() {
        fs::read_to_string(&config_path).map_err(|e| VaultError::ReadError {
            path: config_path.clone(),
            source: e,
        })?
    } else {
        String::new()
    };
    let config: VaultConfig = toml::from_str(&config_text)?;
    let doc: toml_edit::DocumentMut = config_text.parse()?;
    Ok((config, doc))
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(root: &Path, doc: &toml_edit::DocumentMut) -> Result<(), VaultError> {
    let config_path = root.join(CONFIG_FILE);
    crate::io::recovery::atomic_write(&config_path, doc.to_string().as_bytes()).map_err(|e| {
        VaultError::WriteError {
            path: config_path,
            source: e,
        }
    })?;
    Ok(())
}

/// Set `pages.base_folder` in the config document
pub fn set_base_folder(doc: &mut toml_edit::DocumentMut, folder: &str) {
    if !doc.contains_key("pages") {
        doc["pages"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["pages"]["base_folder"] = toml_edit::value(folder.trim_matches('/'));
}
