//! Best-effort normalization of media files the embedded decoder rejects.
//!
//! Strategies are tried in order and the first one that succeeds wins. A
//! failing step is logged and the next one is tried; nothing here panics or
//! propagates an error to the caller.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::RepairError;

const ID3_HEADER_LEN: usize = 10;
const ID3_FOOTER_FLAG: u8 = 0x10;

/// One way of rewriting a file in place.
pub trait RepairStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, path: &Path) -> Result<(), RepairError>;
}

pub struct FormatRepair {
    strategies: Vec<Box<dyn RepairStrategy>>,
}

impl FormatRepair {
    /// External transcoder first, structural tag strip second.
    pub fn new(transcoder: &str) -> Self {
        Self::with_strategies(vec![
            Box::new(Transcode::new(transcoder)),
            Box::new(StripId3),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn RepairStrategy>>) -> Self {
        Self { strategies }
    }

    /// Returns true as soon as one strategy rewrote the file.
    pub fn repair(&self, path: &Path) -> bool {
        for strategy in &self.strategies {
            match strategy.apply(path) {
                Ok(()) => {
                    info!(strategy = strategy.name(), path = %path.display(), "media repaired");
                    return true;
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), "repair step failed: {}", e);
                }
            }
        }
        false
    }
}

/// Re-encode through an external tool (ffmpeg-compatible CLI).
pub struct Transcode {
    program: String,
}

impl Transcode {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl RepairStrategy for Transcode {
    fn name(&self) -> &'static str {
        "transcode"
    }

    fn apply(&self, path: &Path) -> Result<(), RepairError> {
        // Output lands next to the input so the final rename stays atomic
        let output = tempfile::Builder::new()
            .prefix(".repair-")
            .suffix(".mp3")
            .tempfile_in(parent_dir(path))?;

        let status = Command::new(&self.program)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(path)
            .args(["-acodec", "mp3"])
            .arg(output.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => RepairError::ToolUnavailable(self.program.clone()),
                _ => RepairError::Io(e),
            })?;

        if !status.success() {
            return Err(RepairError::ToolFailed {
                tool: self.program.clone(),
                status: status.to_string(),
            });
        }

        output.persist(path).map_err(|e| RepairError::Io(e.error))?;
        Ok(())
    }
}

/// Drop a leading ID3v2 tag and keep the raw frame stream after it.
pub struct StripId3;

impl RepairStrategy for StripId3 {
    fn name(&self) -> &'static str {
        "strip-id3v2"
    }

    fn apply(&self, path: &Path) -> Result<(), RepairError> {
        let data = fs::read(path)?;
        let stream = strip_id3v2(&data)?;

        let mut staging = NamedTempFile::new_in(parent_dir(path))?;
        staging.write_all(stream)?;
        staging.flush()?;
        staging.persist(path).map_err(|e| RepairError::Io(e.error))?;
        Ok(())
    }
}

/// Slice of `data` after the ID3v2 header, tag body and optional footer.
pub fn strip_id3v2(data: &[u8]) -> Result<&[u8], RepairError> {
    if data.len() < ID3_HEADER_LEN || &data[..3] != b"ID3" {
        return Err(RepairError::NoTag);
    }

    // Bytes 6..10: 28-bit synchsafe size, 7 bits per byte
    let size = data[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | (b & 0x7f) as usize);
    let footer = if data[5] & ID3_FOOTER_FLAG != 0 {
        ID3_HEADER_LEN
    } else {
        0
    };

    let end = ID3_HEADER_LEN + size + footer;
    if end > data.len() {
        return Err(RepairError::TruncatedTag {
            declared: end,
            actual: data.len(),
        });
    }
    Ok(&data[end..])
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}
