use crate::capture::EventKind;
use crate::snapshot::ScriptMatcher;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use wapt_common::error::SnapshotError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default = "default_capture_scroll")]
    pub capture_scroll: bool,
    #[serde(default = "default_script_id")]
    pub script_id: String,
    #[serde(default)]
    pub script_src: Option<String>,
    #[serde(default = "default_query_param")]
    pub query_param: String,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            capture_scroll: default_capture_scroll(),
            script_id: default_script_id(),
            script_src: None,
            query_param: default_query_param(),
            delivery: DeliveryConfig::default(),
            archive_dir: default_archive_dir(),
        }
    }
}

impl RecorderConfig {
    /// Matcher for the recorder's own script tag; `script_src` wins when set.
    pub fn script_matcher(&self) -> Result<ScriptMatcher, SnapshotError> {
        match &self.script_src {
            Some(src) => ScriptMatcher::by_src(src),
            None => ScriptMatcher::by_id(&self.script_id),
        }
    }

    pub fn listeners(&self) -> Vec<EventKind> {
        EventKind::listeners(self.capture_scroll)
    }

    /// Reject settings that would leave the recorder unable to run.
    pub fn validate(&self) -> Result<(), String> {
        if self.query_param.trim().is_empty() {
            return Err("query_param must not be empty".into());
        }
        match &self.script_src {
            Some(src) if src.trim().is_empty() => {
                return Err("script_src must not be empty when set".into());
            }
            None if self.script_id.trim().is_empty() => {
                return Err("script_id must not be empty".into());
            }
            _ => {}
        }
        if self.delivery.timeout_ms == 0 {
            return Err("delivery.timeout_ms must be positive".into());
        }
        self.script_matcher().map_err(|e| e.to_string())?;
        Ok(())
    }
}

fn default_capture_scroll() -> bool {
    true
}

fn default_script_id() -> String {
    "wapt-recorder".to_string()
}

fn default_query_param() -> String {
    "record".to_string()
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("./out")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Wait for a 2xx answer before clearing the store.
    #[default]
    AckThenClear,
    /// Send unobserved and clear immediately.
    FireAndForget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub mode: DeliveryMode,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::default(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_timeout_ms() -> u64 {
    10000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RecorderConfig::default().validate().is_ok());
    }

    #[test]
    fn blank_script_matcher_is_rejected() {
        let config = RecorderConfig {
            script_src: Some(" ".into()),
            ..RecorderConfig::default()
        };
        assert!(config.validate().unwrap_err().contains("script_src"));

        let config = RecorderConfig {
            script_id: String::new(),
            ..RecorderConfig::default()
        };
        assert!(config.validate().unwrap_err().contains("script_id"));
    }
}
