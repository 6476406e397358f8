use super::schema::RecorderConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable naming a config file that replaces the search.
pub const CONFIG_ENV: &str = "WAPT_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `$WAPT_CONFIG` when set, otherwise the first existing file of
    /// [`ConfigLoader::search_paths`], otherwise the defaults.
    pub async fn load_default() -> Result<RecorderConfig, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load_from(Path::new(&path)).await;
        }

        for path in Self::search_paths(dirs::home_dir()) {
            if path.exists() {
                return Self::load_from(&path).await;
            }
        }

        debug!("No config file found, using defaults");
        Ok(RecorderConfig::default())
    }

    /// `./wapt.yaml`, then `<home>/.wapt/config.yaml`.
    pub fn search_paths(home: Option<PathBuf>) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./wapt.yaml")];
        if let Some(home) = home {
            paths.push(home.join(".wapt").join("config.yaml"));
        }
        paths
    }

    pub async fn load_from(path: &Path) -> Result<RecorderConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: RecorderConfig = serde_yaml::from_str(&content)?;
        config.validate().map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DeliveryMode;

    #[tokio::test]
    async fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wapt.yaml");
        std::fs::write(
            &path,
            "capture_scroll: false\ndelivery:\n  mode: fire_and_forget\n  max_retries: 1\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from(&path).await.unwrap();
        assert!(!config.capture_scroll);
        assert_eq!(config.script_id, "wapt-recorder");
        assert_eq!(config.query_param, "record");
        assert_eq!(config.delivery.mode, DeliveryMode::FireAndForget);
        assert_eq!(config.delivery.max_retries, 1);
        assert_eq!(config.delivery.retry_delay_ms, 500);
    }

    #[tokio::test]
    async fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wapt.yaml");
        std::fs::write(&path, "capture_scroll: [not, a, bool]\n").unwrap();

        let err = ConfigLoader::load_from(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn empty_query_param_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wapt.yaml");
        std::fs::write(&path, "query_param: \"\"\n").unwrap();

        let err = ConfigLoader::load_from(&path).await.unwrap_err();
        match err {
            ConfigError::Invalid { path: bad, reason } => {
                assert_eq!(bad, path);
                assert!(reason.contains("query_param"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn search_prefers_working_directory() {
        let paths = ConfigLoader::search_paths(Some(PathBuf::from("/home/u")));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("./wapt.yaml"),
                PathBuf::from("/home/u/.wapt/config.yaml"),
            ]
        );
        assert_eq!(ConfigLoader::search_paths(None).len(), 1);
    }
}
