use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by image generation jobs.
///
/// Every variant is terminal for the job that produced it; nothing in this
/// crate retries.
#[derive(Error, Debug)]
pub enum ImageError {
    /// The named workflow template does not exist in the template directory.
    #[error("Workflow template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    /// The template exists but is not a valid node mapping.
    #[error("Malformed workflow template {name}: {reason}")]
    MalformedTemplate { name: String, reason: String },

    /// No sampler node could be located in the graph.
    #[error("No sampler node (KSampler) found in workflow")]
    SamplerNotFound,

    /// No positive prompt node could be located in the graph.
    #[error("No prompt node (CLIPTextEncode) found in workflow")]
    PromptNodeNotFound,

    /// ComfyUI refused the job, or the request never reached it.
    #[error("ComfyUI rejected the prompt: {0}")]
    SubmissionRejected(String),

    /// The WebSocket notification channel failed before completion.
    #[error("Notification channel error: {0}")]
    ChannelError(String),

    /// The completion signal did not arrive before the deadline.
    #[error("Timed out after {secs}s waiting for prompt {prompt_id}")]
    TimedOut { prompt_id: String, secs: u64 },

    /// The wait was cancelled by the caller.
    #[error("Wait for prompt {0} was cancelled")]
    Cancelled(String),

    /// The job finished but its history lists no images.
    #[error("Prompt {0} finished without producing an image")]
    NoArtifactProduced(String),

    /// Fetching job history or image bytes failed.
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// A control request (such as freeing memory) failed or was refused.
    #[error("ComfyUI control request failed: {0}")]
    ControlFailed(String),

    /// Local filesystem failure with context.
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ImageError>;
