//! Configuration loading for the lattice server.
//!
//! The main entry point is [`Settings`], the contents of
//! `lattice.yaml`. A missing file yields the defaults; individual
//! values can be overridden through `LATTICE_*` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The configuration file contained invalid YAML.
    #[error("failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Root directory for blob storage; per-collection documents
    /// directories resolve against it when relative.
    pub data_dir: PathBuf,

    /// Path of the SQLite metadata database.
    pub database_path: PathBuf,

    /// HTTP listen address, `host:port`.
    pub listen: String,

    /// Whether named ingestions take an object lock.
    pub enable_object_locking: bool,

    /// Seconds after which a lock may be forcibly reclaimed.
    pub object_lock_expiration_seconds: i64,

    /// tracing-subscriber env-filter directive.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./lattice-data"),
            database_path: PathBuf::from("./lattice-data/lattice.db"),
            listen: "127.0.0.1:8101".to_owned(),
            enable_object_locking: true,
            object_lock_expiration_seconds: 30,
            log_filter: "info".to_owned(),
        }
    }
}

impl Settings {
    /// Loads settings from the given YAML file, falling back to
    /// defaults when the file does not exist, then applies environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)?;
                serde_yaml::from_str(&text)?
            }
            _ => Self::default(),
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Applies `LATTICE_DATA_DIR`, `LATTICE_DB_PATH` and
    /// `LATTICE_LISTEN` when set.
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("LATTICE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("LATTICE_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Ok(listen) = std::env::var("LATTICE_LISTEN") {
            self.listen = listen;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.listen, "127.0.0.1:8101");
        assert!(settings.enable_object_locking);
        assert_eq!(settings.object_lock_expiration_seconds, 30);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = Settings::load(Some(Path::new("/nonexistent/lattice.yaml"))).unwrap();
        assert_eq!(settings.listen, Settings::default().listen);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("lattice.yaml");
        std::fs::write(
            &path,
            "listen: 0.0.0.0:9000\nobject-lock-expiration-seconds: 60\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.listen, "0.0.0.0:9000");
        assert_eq!(settings.object_lock_expiration_seconds, 60);
        assert!(settings.enable_object_locking);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("lattice.yaml");
        std::fs::write(&path, "listen: [unterminated").unwrap();
        assert!(matches!(
            Settings::load(Some(&path)),
            Err(ConfigError::ParseError(_))
        ));
    }
}
