// SPDX-License-Identifier: MIT

//! Filesystem ops (`spec.md` §4.F).

use agentkernel_core::KernelError;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shared with the HTTP op's response cap definition site for
/// discoverability, not because the spec ties them together.
pub const MAX_READ_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    Write,
    Append,
}

#[derive(Debug, Serialize)]
pub struct ReadResult {
    pub success: bool,
    pub content: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when `content` is base64 because the file was not valid UTF-8.
    pub base64: bool,
}

#[derive(Debug, Serialize)]
pub struct WriteResult {
    pub success: bool,
    pub bytes_written: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn read_file(path: &Path) -> Result<ReadResult, KernelError> {
    let metadata = tokio::fs::metadata(path).await.map_err(KernelError::Io)?;
    if metadata.len() > MAX_READ_BYTES {
        return Err(KernelError::TooLarge(format!("{} exceeds read cap", path.display())));
    }
    let bytes = tokio::fs::read(path).await.map_err(KernelError::Io)?;
    match String::from_utf8(bytes.clone()) {
        Ok(text) => {
            Ok(ReadResult { success: true, content: text, size: bytes.len() as u64, error: None, base64: false })
        }
        Err(_) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            Ok(ReadResult { success: true, content: encoded, size: bytes.len() as u64, error: None, base64: true })
        }
    }
}

/// Atomic when `mode = Write`: writes to a temp file in the same directory
/// then renames over the target, so a crash mid-write never leaves a
/// partial file visible at `path`.
pub async fn write_file(path: &Path, content: &str, mode: WriteMode) -> Result<WriteResult, KernelError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(KernelError::Io)?;
        }
    }

    let bytes_written = match mode {
        WriteMode::Append => {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .map_err(KernelError::Io)?;
            file.write_all(content.as_bytes()).await.map_err(KernelError::Io)?;
            content.len() as u64
        }
        WriteMode::Write => {
            let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
            let tmp_name = format!(".{}.tmp.{}", path.file_name().and_then(|n| n.to_str()).unwrap_or("write"), std::process::id());
            let tmp_path = parent.join(tmp_name);
            tokio::fs::write(&tmp_path, content.as_bytes()).await.map_err(KernelError::Io)?;
            tokio::fs::rename(&tmp_path, path).await.map_err(KernelError::Io)?;
            content.len() as u64
        }
    };

    Ok(WriteResult { success: true, bytes_written, error: None })
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
