use std::fs;
use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::vault_io::{self, CONFIG_FILE};

const CONFIG_TEMPLATE: &str = r##"# retag vault configuration

[vault]
# Vault-relative directories skipped when scanning for documents
ignore = [".obsidian", ".trash", ".git"]

# File extensions treated as documents
extensions = ["md"]

[pages]
# Folder where `retag page <TAG> --create` puts new tag pages.
# Empty means the vault root.
base_folder = {base_folder}
"##;

/// Render .retag.toml with the given base folder.
fn render_config(base_folder: &str) -> String {
    let quoted = toml_edit::Value::from(base_folder.trim_matches('/')).to_string();
    CONFIG_TEMPLATE.replace("{base_folder}", quoted.trim())
}

pub fn cmd_init(args: InitArgs, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = dir.join(CONFIG_FILE);

    if config_path.exists() && !args.force {
        return Err(format!("{} already exists (use --force to overwrite)", CONFIG_FILE).into());
    }

    if let Some(parent) = dir.parent()
        && let Ok(parent_root) = vault_io::discover_vault(parent)
    {
        eprintln!("Note: enclosing vault found at {}/", parent_root.display());
        eprintln!("Creating new vault config in ./{}", CONFIG_FILE);
    }

    let base_folder = args.base_folder.unwrap_or_default();
    fs::write(&config_path, render_config(&base_folder))?;

    println!("Initialized retag vault: {}", dir.display());
    if !base_folder.is_empty() {
        println!("  tag pages: {}/", base_folder.trim_matches('/'));
    }
    Ok(())
}
