use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use wapt_common::protocol::Payload;

pub const ARCHIVE_FILE_NAME: &str = "end_user_actions.json";

pub async fn read_payload(path: &Path) -> Result<Payload, Box<dyn Error>> {
    let content = tokio::fs::read_to_string(path).await?;
    let payload: Payload = serde_json::from_str(&content)?;
    Ok(payload)
}

/// `<out>/<task>/<unix seconds>/end_user_actions.json`, spaces in the task name
/// replaced by underscores.
pub fn archive_path(out: &Path, task_name: &str, unix_seconds: u64) -> PathBuf {
    out.join(task_name.replace(' ', "_"))
        .join(unix_seconds.to_string())
        .join(ARCHIVE_FILE_NAME)
}

pub async fn archive_payload(
    payload: &Payload,
    out: &Path,
    unix_seconds: u64,
) -> Result<PathBuf, Box<dyn Error>> {
    let path = archive_path(out, &payload.task_name, unix_seconds);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_string_pretty(payload)?;
    tokio::fs::write(&path, body).await?;
    info!("Archived {} records to {}", payload.len(), path.display());
    Ok(path)
}

pub fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
