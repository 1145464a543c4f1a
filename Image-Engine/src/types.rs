use serde::{Deserialize, Serialize};

/// A submitted generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Correlation id assigned by ComfyUI (`prompt_id`).
    pub prompt_id: String,
    pub seed: u64,
    pub prompt_text: String,
    /// Session the job was submitted under.
    pub client_id: String,
}

/// Real-time sampling progress from the notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub current_step: u32,
    pub total_steps: u32,
}

/// Reference to a file in ComfyUI's output namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Storage class: `output`, `temp` or `input`.
    #[serde(rename = "type", default = "default_storage")]
    pub storage: String,
}

fn default_storage() -> String {
    "output".to_string()
}

impl ArtifactDescriptor {
    /// File extension of the artifact, defaulting to `png`.
    pub fn extension(&self) -> &str {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .unwrap_or("png")
    }
}
