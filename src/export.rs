//! Saving synthesized audio to disk.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::api::VerbatikClient;
use crate::error::Result;

/// Used when the asset URL has no usable file name.
pub const FALLBACK_FILE_NAME: &str = "speech.mp3";

/// Last path segment of `url` with query and fragment stripped, or
/// `FALLBACK_FILE_NAME` when that segment is empty or has no extension.
pub fn suggested_file_name(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = rest.split(['?', '#']).next().unwrap_or_default();
    let name = path
        .split_once('/')
        .and_then(|(_, path)| path.rsplit('/').next())
        .unwrap_or_default();

    if name.contains('.') && !name.starts_with('.') {
        name.to_string()
    } else {
        FALLBACK_FILE_NAME.to_string()
    }
}

/// A directory target gets the file name suggested by `url`.
pub fn resolve_target(target: &Path, url: &str) -> PathBuf {
    if target.is_dir() {
        target.join(suggested_file_name(url))
    } else {
        target.to_path_buf()
    }
}

/// Write `bytes` to `target` (see `resolve_target`), creating parent
/// directories. Returns the path written.
pub async fn write_audio(target: &Path, url: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = resolve_target(target, url);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&path, bytes).await?;
    info!("Saved {} bytes of audio to {}", bytes.len(), path.display());
    Ok(path)
}

/// Download the asset behind `url` and write it to `target`.
pub async fn save_audio(client: &VerbatikClient, url: &str, target: &Path) -> Result<PathBuf> {
    let bytes = client.fetch_audio(url).await?;
    write_audio(target, url, &bytes).await
}
