use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Deployment configuration for the four core engines.
///
/// Root path resolution priority order: explicit path, then `OBSCORE_PATH`,
/// then the XDG data directory, then `~/.obscore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub event_store_root: PathBuf,
    pub blob_store_root: PathBuf,
    pub bus_worker_pool_size: usize,
    pub bus_event_buffer_size: usize,
    pub default_player_speed: f64,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_workspace_root();
        Self {
            event_store_root: root.join("events"),
            blob_store_root: root.join("blobs"),
            bus_worker_pool_size: 10,
            bus_event_buffer_size: 1000,
            default_player_speed: 1.0,
        }
    }
}

impl Config {
    /// Load configuration from `path` (an `obscore.toml`), or from the
    /// default workspace's `obscore.toml` if `path` is `None`. A missing
    /// file is not an error: `Config::default()` is returned instead.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_workspace_root().join("obscore.toml"),
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate cross-field invariants beyond what `serde` enforces, and
    /// normalize zero-valued pool/buffer sizes to their defaults — the
    /// same "always comes up usable" policy `BusConfig::normalized`
    /// applies at construction.
    pub fn normalized(mut self) -> Result<Self> {
        if self.default_player_speed <= 0.0 {
            return Err(Error::InvalidInput(
                "default_player_speed must be positive".to_string(),
            ));
        }
        if self.bus_worker_pool_size == 0 {
            self.bus_worker_pool_size = Config::default().bus_worker_pool_size;
        }
        if self.bus_event_buffer_size == 0 {
            self.bus_event_buffer_size = Config::default().bus_event_buffer_size;
        }
        Ok(self)
    }
}

fn default_workspace_root() -> PathBuf {
    if let Ok(env_path) = std::env::var("OBSCORE_PATH") {
        return expand_tilde(&env_path);
    }
    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("obscore");
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".obscore");
    }
    PathBuf::from(".obscore")
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("obscore.toml"))).unwrap();
        assert_eq!(config.bus_worker_pool_size, 10);
        assert_eq!(config.default_player_speed, 1.0);
    }

    #[test]
    fn loads_overrides_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obscore.toml");
        std::fs::write(
            &path,
            r#"
            bus_worker_pool_size = 4
            default_player_speed = 2.0
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.bus_worker_pool_size, 4);
        assert_eq!(config.default_player_speed, 2.0);
    }

    #[test]
    fn normalized_rejects_non_positive_speed() {
        let config = Config {
            default_player_speed: 0.0,
            ..Config::default()
        };
        assert!(config.normalized().is_err());
    }

    #[test]
    fn normalized_fixes_zero_pool_size() {
        let config = Config {
            bus_worker_pool_size: 0,
            ..Config::default()
        };
        assert_eq!(config.normalized().unwrap().bus_worker_pool_size, 10);
    }
}
