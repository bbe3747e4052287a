use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::model::config::{VaultConfig, VaultSettings};
use crate::model::document::{Document, RewriteOutcome};
use crate::ops::store::{DocumentStore, StoreError};

/// Name of the vault config file at the vault root
pub const CONFIG_FILE: &str = ".retag.toml";

/// Directory Obsidian keeps its own settings in; also marks a vault root
pub const OBSIDIAN_DIR: &str = ".obsidian";

/// Error type for vault discovery and loading
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("not a vault: no {CONFIG_FILE} or {OBSIDIAN_DIR}/ found")]
    NotAVault,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {CONFIG_FILE}: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit {CONFIG_FILE}: {0}")]
    ConfigEditError(#[from] toml_edit::TomlError),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A discovered vault and its configuration
#[derive(Debug, Clone)]
pub struct Vault {
    pub root: PathBuf,
    pub config: VaultConfig,
}

impl Vault {
    pub fn store(&self) -> FileStore {
        FileStore::new(&self.root, &self.config.vault)
    }
}

/// Find the vault root by walking up from `start` to the first directory
/// holding `.retag.toml` or `.obsidian/`.
pub fn discover_vault(start: &Path) -> Result<PathBuf, VaultError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).is_file() || current.join(OBSIDIAN_DIR).is_dir() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(VaultError::NotAVault);
        }
    }
}

/// Read `.retag.toml` at the vault root. A missing file means defaults.
pub fn load_config(root: &Path) -> Result<VaultConfig, VaultError> {
    let config_path = root.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(VaultConfig::default());
    }
    let text = fs::read_to_string(&config_path).map_err(|e| VaultError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    Ok(toml::from_str(&text)?)
}

pub fn load_vault(root: &Path) -> Result<Vault, VaultError> {
    Ok(Vault {
        root: root.to_path_buf(),
        config: load_config(root)?,
    })
}

/// Documents on disk under a vault root.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    ignore: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl FileStore {
    pub fn new(root: &Path, settings: &VaultSettings) -> Self {
        FileStore {
            root: root.to_path_buf(),
            ignore: settings
                .ignore
                .iter()
                .map(|dir| PathBuf::from(dir.trim_matches('/')))
                .collect(),
            extensions: settings
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a document handle
    pub fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    /// Document handle for an absolute path, if it is a document of this store
    pub fn handle_for(&self, full: &Path) -> Option<String> {
        let rel = full.strip_prefix(&self.root).ok()?;
        if self.is_ignored(rel) || !self.is_document(rel) {
            return None;
        }
        to_handle(rel)
    }

    fn is_ignored(&self, rel: &Path) -> bool {
        self.ignore.iter().any(|dir| rel.starts_with(dir))
    }

    fn is_document(&self, rel: &Path) -> bool {
        rel.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }

    fn keep_entry(&self, entry: &DirEntry) -> bool {
        match entry.path().strip_prefix(&self.root) {
            Ok(rel) => rel.as_os_str().is_empty() || !self.is_ignored(rel),
            Err(_) => false,
        }
    }
}

/// Vault-relative path with `/` separators
fn to_handle(rel: &Path) -> Option<String> {
    let parts: Option<Vec<&str>> = rel
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    parts.map(|p| p.join("/"))
}

impl DocumentStore for FileStore {
    fn list_documents(&self) -> Result<Vec<String>, StoreError> {
        let mut docs = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.keep_entry(e));
        for entry in walker {
            let entry = entry.map_err(|e| StoreError::ListError {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone()),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(handle) = self.handle_for(entry.path()) {
                docs.push(handle);
            }
        }
        Ok(docs)
    }

    fn read_document(&self, path: &str) -> Result<Document, StoreError> {
        let text = fs::read_to_string(self.full_path(path)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_string())
            } else {
                StoreError::ReadError {
                    path: path.to_string(),
                    source: e,
                }
            }
        })?;
        Ok(Document::from_text(path, &text))
    }

    fn write_document(&self, original: &Document, outcome: &RewriteOutcome) -> Result<(), StoreError> {
        let content = original.render(outcome);
        let full = self.full_path(&original.path);
        if let Err(e) = recovery::atomic_write(&full, content.as_bytes()) {
            recovery::log_recovery(
                &self.root,
                RecoveryEntry {
                    timestamp: chrono::Utc::now(),
                    category: RecoveryCategory::Write,
                    description: "document write failed".to_string(),
                    fields: vec![
                        ("Target".to_string(), original.path.clone()),
                        ("Error".to_string(), e.to_string()),
                    ],
                    body: content,
                },
            );
            return Err(StoreError::WriteError {
                path: original.path.clone(),
                source: e,
            });
        }
        Ok(())
    }

    fn create_document(&self, path: &str, text: &str) -> Result<(), StoreError> {
        let full = self.full_path(path);
        let write_error = |source| StoreError::WriteError {
            path: path.to_string(),
            source,
        };
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    StoreError::AlreadyExists(path.to_string())
                } else {
                    write_error(e)
                }
            })?;
        file.write_all(text.as_bytes()).map_err(write_error)?;
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.full_path(path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn create_test_vault(dir: &Path) {
        fs::create_dir_all(dir.join(".obsidian")).unwrap();
        fs::create_dir_all(dir.join("notes/deep")).unwrap();
        fs::write(dir.join(".obsidian/workspace.md"), "#ignored").unwrap();
        fs::write(dir.join("index.md"), "---\ntags: [proj]\n---\n#proj\n").unwrap();
        fs::write(dir.join("notes/a.md"), "see #proj/a\n").unwrap();
        fs::write(dir.join("notes/deep/b.MD"), "#other\n").unwrap();
        fs::write(dir.join("notes/image.png"), "not a note").unwrap();
    }

    #[test]
    fn test_discover_vault() {
        let tmp = TempDir::new().unwrap();
        create_test_vault(tmp.path());

        assert_eq!(discover_vault(tmp.path()).unwrap(), tmp.path());
        let sub = tmp.path().join("notes/deep");
        assert_eq!(discover_vault(&sub).unwrap(), tmp.path());
    }

    #[test]
    fn test_discover_vault_by_config_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "").unwrap();
        assert_eq!(discover_vault(tmp.path()).unwrap(), tmp.path());
    }

    #[test]
    fn test_discover_vault_not_found() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(discover_vault(tmp.path()), Err(VaultError::NotAVault)));
    }

    #[test]
    fn test_load_config_missing_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.pages.base_folder, "");
    }

    #[test]
    fn test_load_config_parse_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[pages\n").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(VaultError::ConfigParseError(_))));
    }

    #[test]
    fn test_list_documents_honors_settings() {
        let tmp = TempDir::new().unwrap();
        create_test_vault(tmp.path());
        let store = FileStore::new(tmp.path(), &VaultSettings::default());
        assert_eq!(
            store.list_documents().unwrap(),
            vec!["index.md", "notes/a.md", "notes/deep/b.MD"]
        );
    }

    #[test]
    fn test_read_and_write_document() {
        let tmp = TempDir::new().unwrap();
        create_test_vault(tmp.path());
        let store = FileStore::new(tmp.path(), &VaultSettings::default());

        let doc = store.read_document("notes/a.md").unwrap();
        assert_eq!(doc.inline[0].text, "#proj/a");

        let outcome = RewriteOutcome {
            body: "see #arch/a\n".to_string(),
            tags: None,
            aliases: None,
            inline_replaced: 1,
            changed: true,
        };
        store.write_document(&doc, &outcome).unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path().join("notes/a.md")).unwrap(),
            "see #arch/a\n"
        );
    }

    #[test]
    fn test_read_missing_document() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path(), &VaultSettings::default());
        assert!(matches!(
            store.read_document("nope.md"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_create_document() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path(), &VaultSettings::default());
        store.create_document("Tags/new.md", "hello").unwrap();
        assert!(store.exists("Tags/new.md"));
        assert!(matches!(
            store.create_document("Tags/new.md", "again"),
            Err(StoreError::AlreadyExists(_))
        ));
        assert_eq!(fs::read_to_string(tmp.path().join("Tags/new.md")).unwrap(), "hello");
    }

    #[test]
    fn test_handle_for() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path(), &VaultSettings::default());
        assert_eq!(
            store.handle_for(&tmp.path().join("a/b.md")),
            Some("a/b.md".to_string())
        );
        assert_eq!(store.handle_for(&tmp.path().join(".obsidian/x.md")), None);
        assert_eq!(store.handle_for(&tmp.path().join("a/b.txt")), None);
    }
}
