use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{ImageError, Result};
use crate::graph::WorkflowGraph;

/// A directory of workflow templates saved in ComfyUI's API format.
#[derive(Debug, Clone)]
pub struct WorkflowLibrary {
    dir: PathBuf,
}

impl WorkflowLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a template name to its file path. The `.json` extension is optional.
    pub fn path_for(&self, name: &str) -> PathBuf {
        if name.ends_with(".json") {
            self.dir.join(name)
        } else {
            self.dir.join(format!("{}.json", name))
        }
    }

    /// Load and validate a template. Each call returns a fresh graph.
    pub fn load(&self, name: &str) -> Result<WorkflowGraph> {
        let path = self.path_for(name);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ImageError::TemplateNotFound { path });
            }
            Err(e) => {
                return Err(ImageError::Io {
                    context: format!("Failed to read workflow template {}", path.display()),
                    source: e,
                })
            }
        };

        let graph = parse_template(name, &text)?;
        tracing::debug!(template = name, nodes = graph.len(), "Loaded workflow template");
        Ok(graph)
    }

    /// List template names (file stems) in the library, sorted.
    pub fn available(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| ImageError::Io {
            context: format!("Failed to list workflow directory {}", self.dir.display()),
            source: e,
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Parse template text into a validated graph.
pub fn parse_template(name: &str, text: &str) -> Result<WorkflowGraph> {
    let malformed = |reason: String| ImageError::MalformedTemplate {
        name: name.to_string(),
        reason,
    };

    let graph = match WorkflowGraph::from_json(text) {
        Ok(graph) => graph,
        Err(e) => {
            // The UI export has a top-level "nodes" array instead of an id map.
            let ui_export = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|v| v.get("nodes").map(Value::is_array))
                .unwrap_or(false);
            let reason = if ui_export {
                "this is a UI workflow export; re-save it with \"Save (API Format)\"".to_string()
            } else {
                e.to_string()
            };
            return Err(malformed(reason));
        }
    };

    graph.validate().map_err(malformed)?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, file: &str, body: &str) {
        std::fs::write(dir.join(file), body).unwrap();
    }

    #[test]
    fn test_path_for_adds_extension() {
        let lib = WorkflowLibrary::new("/tmp/workflows");
        assert_eq!(lib.path_for("txt2img"), PathBuf::from("/tmp/workflows/txt2img.json"));
        assert_eq!(lib.path_for("txt2img.json"), PathBuf::from("/tmp/workflows/txt2img.json"));
    }

    #[test]
    fn test_load_valid_template() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "basic.json",
            r#"{"6": {"class_type": "CLIPTextEncode", "inputs": {"text": ""}},
                "3": {"class_type": "KSampler", "inputs": {"positive": ["6", 0]}}}"#,
        );
        let graph = WorkflowLibrary::new(dir.path()).load("basic").unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let err = WorkflowLibrary::new(dir.path()).load("nope").unwrap_err();
        match err {
            ImageError::TemplateNotFound { path } => assert!(path.ends_with("nope.json")),
            other => panic!("Expected TemplateNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_template() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.json", r#"{"3": {"inputs": {}}}"#);
        let err = WorkflowLibrary::new(dir.path()).load("bad").unwrap_err();
        assert!(matches!(err, ImageError::MalformedTemplate { .. }));
    }

    #[test]
    fn test_not_json_is_malformed() {
        let err = parse_template("junk", "not json at all").unwrap_err();
        assert!(matches!(err, ImageError::MalformedTemplate { .. }));
    }

    #[test]
    fn test_ui_export_is_explained() {
        let err = parse_template("ui", r#"{"nodes": [], "links": []}"#).unwrap_err();
        match err {
            ImageError::MalformedTemplate { reason, .. } => assert!(reason.contains("API Format")),
            other => panic!("Expected MalformedTemplate, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_graph_loads_but_has_no_sampler() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "empty.json", "{}");
        let graph = WorkflowLibrary::new(dir.path()).load("empty").unwrap();
        assert!(graph.is_empty());
        assert!(matches!(
            crate::resolve::resolve(&graph),
            Err(ImageError::SamplerNotFound)
        ));
    }

    #[test]
    fn test_dangling_reference_is_malformed() {
        let err = parse_template(
            "dangling",
            r#"{"3": {"class_type": "KSampler", "inputs": {"positive": ["6", 0]}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ImageError::MalformedTemplate { .. }));
    }

    #[test]
    fn test_available_lists_json_stems() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.json", "{}");
        write(dir.path(), "a.json", "{}");
        write(dir.path(), "notes.txt", "");
        let names = WorkflowLibrary::new(dir.path()).available().unwrap();
        assert_eq!(names, vec!["a", "b"]);
    }
}
