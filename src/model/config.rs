use serde::{Deserialize, Serialize};

/// Configuration from .retag.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub vault: VaultSettings,
    #[serde(default)]
    pub pages: PagesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSettings {
    /// Vault-relative directories skipped when scanning
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
    /// Extensions of files treated as documents
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for VaultSettings {
    fn default() -> Self {
        VaultSettings {
            ignore: default_ignore(),
            extensions: default_extensions(),
        }
    }
}

/// Default: see src/cli/handlers/init.rs
fn default_ignore() -> Vec<String> {
    vec![".obsidian".to_string(), ".trash".to_string(), ".git".to_string()]
}

/// Default: see src/cli/handlers/init.rs
fn default_extensions() -> Vec<String> {
    vec!["md".to_string()]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PagesConfig {
    /// Folder (vault-relative) where new tag pages are created.
    /// Empty means the vault root.
    #[serde(default)]
    pub base_folder: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: VaultConfig = toml::from_str("").unwrap();
        assert_eq!(config.vault.extensions, vec!["md"]);
        assert!(config.vault.ignore.contains(&".obsidian".to_string()));
        assert_eq!(config.pages.base_folder, "");
    }

    #[test]
    fn test_partial_config() {
        let config: VaultConfig = toml::from_str("[pages]\nbase_folder = \"Tags\"\n").unwrap();
        assert_eq!(config.pages.base_folder, "Tags");
        assert_eq!(config.vault.extensions, vec!["md"]);
    }
}
