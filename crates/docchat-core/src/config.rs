use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Top-level configuration for the docchat client.
///
/// Loaded from `~/.docchat/config.toml` by default. Every section falls back
/// to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocChatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl DocChatConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DocChatConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Location of the persisted session token.
    ///
    /// An absolute `session.token_file` is used as-is; a relative one is
    /// resolved against the data directory.
    pub fn token_path(&self) -> PathBuf {
        let file = Path::new(&self.session.token_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.general.resolved_data_dir().join(file)
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the session token and other local state.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.docchat".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl GeneralConfig {
    /// Expand a leading `~/` against the user's home directory.
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the document/chat backend.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Session persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Well-known key (file name) under which the token is persisted.
    pub token_file: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_file: "token".to_string(),
        }
    }
}

/// Default config file path for the current platform.
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".docchat").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".docchat").join("config.toml");
    }
    PathBuf::from("config.toml")
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocChatError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = DocChatConfig::default();
        assert_eq!(config.general.data_dir, "~/.docchat");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.timeout_secs, 60);
        assert_eq!(config.session.token_file, "token");
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/var/lib/docchat"
log_level = "debug"

[api]
base_url = "http://13.71.103.227/"
timeout_secs = 15

[session]
token_file = "auth-token"
"#;
        let file = create_temp_config(content);
        let config = DocChatConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/var/lib/docchat");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.api.base_url, "http://13.71.103.227/");
        assert_eq!(config.api.timeout_secs, 15);
        assert_eq!(
            config.token_path(),
            PathBuf::from("/var/lib/docchat").join("auth-token")
        );
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[api]\nbase_url = \"http://backend:9000\"\n");
        let config = DocChatConfig::load(file.path()).unwrap();
        assert_eq!(config.api.base_url, "http://backend:9000");
        // Remaining fields use defaults
        assert_eq!(config.api.timeout_secs, 60);
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.session.token_file, "token");
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = DocChatConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "~/.docchat");
        assert_eq!(config.api.timeout_secs, 60);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = DocChatConfig::load(file.path());
        assert!(matches!(result, Err(DocChatError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = DocChatConfig::load_or_default(Path::new("/does/not/exist/config.toml"));
        assert_eq!(config.api.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = DocChatConfig::default();
        config.api.base_url = "http://example.test".to_string();
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = DocChatConfig::load(&path).unwrap();
        assert_eq!(reloaded.api.base_url, "http://example.test");
        assert_eq!(reloaded.session.token_file, "token");
    }

    #[test]
    fn test_absolute_token_file_is_used_verbatim() {
        let mut config = DocChatConfig::default();
        config.session.token_file = "/tmp/docchat-token".to_string();
        assert_eq!(config.token_path(), PathBuf::from("/tmp/docchat-token"));
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/data"), PathBuf::from("/data"));
        assert_eq!(expand_home("relative/dir"), PathBuf::from("relative/dir"));
    }
}
