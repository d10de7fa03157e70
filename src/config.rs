use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::reconciliation::DEFAULT_IMAGE_EXTENSIONS;

pub const CONFIG_ENV: &str = "TRIP_JOURNAL_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "trip-journal.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Root holding the `images/` and `memories/` photo directories
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// File extensions the media cleanup treats as photos
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("trip-journal.db")
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_image_extensions() -> Vec<String> {
    DEFAULT_IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            media_root: default_media_root(),
            bind_addr: default_bind_addr(),
            image_extensions: default_image_extensions(),
        }
    }
}

impl Config {
    /// `$TRIP_JOURNAL_CONFIG`, else `./trip-journal.toml` if present, else
    /// defaults; environment overrides applied last.
    pub fn load() -> Result<Self> {
        let mut config = match env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup("TRIP_JOURNAL_DB") {
            self.db_path = PathBuf::from(db);
        }
        if let Some(media) = lookup("TRIP_JOURNAL_MEDIA") {
            self.media_root = PathBuf::from(media);
        }
        if let Some(addr) = lookup("TRIP_JOURNAL_ADDR") {
            self.bind_addr = addr;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.image_extensions, vec!["jpg", "png", "jpeg"]);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            media_root = "/srv/trips/media"
            image_extensions = ["jpg", "webp"]
            "#,
        )
        .unwrap();

        assert_eq!(config.media_root, PathBuf::from("/srv/trips/media"));
        assert_eq!(config.image_extensions, vec!["jpg", "webp"]);
        assert_eq!(config.bind_addr, "127.0.0.1:8000");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_toml("db_path = [").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TRIP_JOURNAL_DB", "/tmp/trips.db"),
            ("TRIP_JOURNAL_ADDR", "0.0.0.0:9000"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.db_path, PathBuf::from("/tmp/trips.db"));
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.media_root, PathBuf::from("media"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trip-journal.toml");
        fs::write(&path, "bind_addr = \"127.0.0.1:8080\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert!(Config::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
