//! Artifact lookup in job history and persistence of downloaded bytes.

use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ImageError, Result};
use crate::types::ArtifactDescriptor;

/// Artifacts produced by a job, keyed by producing node id in response order.
pub type ArtifactOutputs = IndexMap<String, Vec<ArtifactDescriptor>>;

#[derive(Deserialize)]
struct HistoryEntry {
    outputs: IndexMap<String, NodeOutput>,
}

#[derive(Deserialize)]
struct NodeOutput {
    #[serde(default)]
    images: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryResponse {
    Entry(HistoryEntry),
    ById(IndexMap<String, HistoryEntry>),
}

/// Parse a `/history/{prompt_id}` body into per-node artifact lists.
///
/// Accepts both `{"<prompt_id>": {"outputs": ...}}` and a bare
/// `{"outputs": ...}` entry. Image entries without a filename are skipped.
pub fn parse_history(body: &str, prompt_id: &str) -> Result<ArtifactOutputs> {
    let response: HistoryResponse = serde_json::from_str(body)
        .map_err(|e| ImageError::DownloadError(format!("Invalid history response: {}", e)))?;

    let entry = match response {
        HistoryResponse::Entry(entry) => entry,
        HistoryResponse::ById(mut by_id) => by_id.shift_remove(prompt_id).ok_or_else(|| {
            ImageError::DownloadError(format!("No history entry for prompt {}", prompt_id))
        })?,
    };

    Ok(entry
        .outputs
        .into_iter()
        .map(|(node_id, output)| {
            let images = output
                .images
                .into_iter()
                .filter_map(|img| serde_json::from_value::<ArtifactDescriptor>(img).ok())
                .collect();
            (node_id, images)
        })
        .collect())
}

/// First artifact of the first node with a non-empty artifact list.
///
/// When several nodes produce images the earliest one in response order
/// wins, regardless of what the node does.
pub fn first_artifact(outputs: &ArtifactOutputs) -> Option<(&str, &ArtifactDescriptor)> {
    outputs
        .iter()
        .find_map(|(node_id, images)| images.first().map(|img| (node_id.as_str(), img)))
}

/// Write `bytes` to `<dir>/<name>.<ext>`, replacing any existing file.
///
/// The bytes go to a temporary file in `dir` first and are renamed into
/// place only once fully written; on failure the temporary file is removed.
pub fn persist(
    dir: &Path,
    name: &str,
    artifact: &ArtifactDescriptor,
    bytes: &[u8],
) -> Result<PathBuf> {
    let io = |context: String| move |source: std::io::Error| ImageError::Io { context, source };

    std::fs::create_dir_all(dir)
        .map_err(io(format!("Failed to create output directory {}", dir.display())))?;

    let target = dir.join(format!("{}.{}", name, artifact.extension()));

    let mut tmp = tempfile::Builder::new()
        .prefix(".partial-")
        .tempfile_in(dir)
        .map_err(io(format!("Failed to create temp file in {}", dir.display())))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(io(format!("Failed to write {}", target.display())))?;
    tmp.persist(&target)
        .map_err(|e| e.error)
        .map_err(io(format!("Failed to move image into {}", target.display())))?;

    Ok(target)
}
