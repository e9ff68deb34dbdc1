//! Screenshot harvesting from an agent transcript

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

use crate::error::{E2eError, E2eResult};
use crate::message::{Message, MessagePart};

/// Prefix of legacy screenshot references inside a JSON string array
pub const LEGACY_MARKER: &str = "[screenshot_path] ";

/// File extension for an image media type
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// Writes the screenshots found in one scenario's transcript.
///
/// Files are named `<n>.<ext>` with `n` counting from 1 in encounter order.
/// Existing files are never overwritten; their names are skipped. Artifacts
/// that cannot be decoded or read do not consume a name.
pub struct ScreenshotHarvester {
    dir: PathBuf,
    next: usize,
    saved: Vec<String>,
}

impl ScreenshotHarvester {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next: 1,
            saved: Vec::new(),
        }
    }

    /// Walk the transcript and return the saved filenames in order
    pub fn harvest(mut self, transcript: &[Message]) -> Vec<String> {
        for message in transcript {
            let Message::Tool(reply) = message else {
                continue;
            };

            for part in &reply.parts {
                if let MessagePart::Image { data, mime_type } = part {
                    let outcome = STANDARD
                        .decode(data.trim())
                        .map_err(|e| E2eError::ToolArtifact(format!("invalid base64 from {}: {}", reply.name, e)))
                        .and_then(|bytes| self.store(&bytes, extension_for(mime_type)));
                    self.record(outcome);
                }
            }

            for part in &reply.parts {
                if let MessagePart::Text(text) = part {
                    for source in legacy_references(text) {
                        let outcome = self.copy_legacy(&source);
                        self.record(outcome);
                    }
                }
            }
        }
        self.saved
    }

    fn record(&mut self, outcome: E2eResult<String>) {
        match outcome {
            Ok(name) => {
                debug!("saved screenshot {}", self.dir.join(&name).display());
                self.saved.push(name);
                self.next += 1;
            }
            Err(e) => warn!("skipping screenshot: {}", e),
        }
    }

    fn copy_legacy(&mut self, source: &Path) -> E2eResult<String> {
        if !source.is_file() {
            return Err(E2eError::ToolArtifact(format!(
                "legacy screenshot {} does not exist",
                source.display()
            )));
        }
        let bytes = std::fs::read(source)?;
        let ext = source
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .unwrap_or("png")
            .to_ascii_lowercase();
        self.store(&bytes, &ext)
    }

    fn store(&mut self, bytes: &[u8], ext: &str) -> E2eResult<String> {
        loop {
            let name = format!("{}.{}", self.next, ext);
            let path = self.dir.join(&name);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("{} already exists, trying the next name", path.display());
                    self.next += 1;
                    continue;
                }
                Err(e) => {
                    return Err(E2eError::ToolArtifact(format!(
                        "cannot create {}: {}",
                        path.display(),
                        e
                    )))
                }
            };

            if let Err(e) = file.write_all(bytes) {
                drop(file);
                if let Err(cleanup) = std::fs::remove_file(&path) {
                    warn!("cannot remove partial {}: {}", path.display(), cleanup);
                }
                return Err(E2eError::ToolArtifact(format!(
                    "cannot write {}: {}",
                    path.display(),
                    e
                )));
            }
            return Ok(name);
        }
    }
}

/// Source paths named by a legacy `["[screenshot_path] /path", ...]` payload.
/// Anything that is not a JSON array of strings yields nothing.
fn legacy_references(text: &str) -> Vec<PathBuf> {
    let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(text) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| item.as_str())
        .filter_map(|item| item.strip_prefix(LEGACY_MARKER))
        .map(|path| PathBuf::from(path.trim()))
        .filter(|path| !path.as_os_str().is_empty())
        .collect()
}
