use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::artifact::{first_artifact, persist};
use crate::client::ComfyClient;
use crate::error::{ImageError, Result};
use crate::graph::WorkflowGraph;
use crate::job::{inject, random_seed};
use crate::library::WorkflowLibrary;
use crate::resolve::resolve;
use crate::session::Session;
use crate::types::ProgressUpdate;

/// Configuration for [`ImageEngine`].
///
/// Use [`ImageEngineConfig::builder()`] to override individual settings, or
/// [`ImageEngineConfig::default()`] for a local ComfyUI install.
#[derive(Debug, Clone)]
pub struct ImageEngineConfig {
    /// Base URL of the ComfyUI server.
    pub endpoint: String,

    /// Base URL of the notification channel when it differs from `endpoint`.
    pub ws_endpoint: Option<String>,

    /// Directory holding API-format workflow templates.
    pub workflows_dir: PathBuf,

    /// Template name within `workflows_dir`, with or without `.json`.
    pub workflow: String,

    /// Directory generated images are written to.
    pub output_dir: PathBuf,

    /// Upper bound on waiting for a single job to complete.
    pub timeout: Duration,
}

impl Default for ImageEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8188".into(),
            ws_endpoint: None,
            workflows_dir: PathBuf::from("workflows"),
            workflow: "comfy_workflow_api".into(),
            output_dir: PathBuf::from("output"),
            timeout: Duration::from_secs(600),
        }
    }
}

impl ImageEngineConfig {
    pub fn builder() -> ImageEngineConfigBuilder {
        ImageEngineConfigBuilder::default()
    }
}

/// Builder for [`ImageEngineConfig`].
#[derive(Default)]
pub struct ImageEngineConfigBuilder {
    config: ImageEngineConfig,
}

impl ImageEngineConfigBuilder {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn with_ws_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.ws_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_workflows_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workflows_dir = dir.into();
        self
    }

    pub fn with_workflow(mut self, name: impl Into<String>) -> Self {
        self.config.workflow = name.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> ImageEngineConfig {
        self.config
    }
}

/// Anything that can turn a prompt into an image file on disk.
///
/// Callers that orchestrate many scenes depend on this instead of on
/// [`ImageEngine`] directly so they can run without a ComfyUI server.
pub trait ImageGenerator {
    /// Generate one image for `prompt` and store it as `<output>/<name>.<ext>`.
    fn generate(&self, prompt: &str, name: &str) -> impl Future<Output = Result<PathBuf>> + Send;

    /// Whether the backend can take jobs right now.
    fn ready(&self) -> impl Future<Output = bool> + Send {
        async { true }
    }
}

/// Turns a text prompt into a saved image via a ComfyUI workflow template.
///
/// Each call runs one job end to end:
/// load template, resolve nodes, inject prompt and seed, open a channel under
/// a fresh client id, submit, await completion, fetch the artifact, persist.
///
/// # Example
/// ```no_run
/// use image_engine::{ImageEngine, ImageEngineConfig};
///
/// # async fn example() -> image_engine::Result<()> {
/// let engine = ImageEngine::new(
///     ImageEngineConfig::builder()
///         .with_workflow("txt2img")
///         .with_output_dir("output")
///         .build(),
/// );
/// let path = engine.generate_image("a fox reading under a tree", "book_scene_1").await?;
/// println!("saved {}", path.display());
/// # Ok(())
/// # }
/// ```
pub struct ImageEngine {
    client: ComfyClient,
    library: WorkflowLibrary,
    config: ImageEngineConfig,
    cancel: CancellationToken,
}

impl ImageEngine {
    pub fn new(config: ImageEngineConfig) -> Self {
        let mut client = ComfyClient::new(config.endpoint.clone());
        if let Some(ws) = &config.ws_endpoint {
            client = client.with_ws_endpoint(ws.clone());
        }
        Self {
            client,
            library: WorkflowLibrary::new(config.workflows_dir.clone()),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight waits when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &ImageEngineConfig {
        &self.config
    }

    pub fn client(&self) -> &ComfyClient {
        &self.client
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    pub async fn health(&self) -> Result<bool> {
        self.client.health().await
    }

    /// Ask ComfyUI to release cached models and VRAM.
    pub async fn free_memory(&self) -> Result<()> {
        self.client.free_memory(true).await
    }

    /// Load the configured template and prepare it for `prompt`.
    ///
    /// Returns the injected graph and the seed that went into it.
    pub fn prepare(&self, prompt: &str) -> Result<(WorkflowGraph, u64)> {
        let mut graph = self.library.load(&self.config.workflow)?;
        let nodes = resolve(&graph)?;
        let seed = random_seed();
        inject(&mut graph, &nodes, prompt, seed)?;
        Ok((graph, seed))
    }

    pub async fn generate_image(&self, prompt: &str, name: &str) -> Result<PathBuf> {
        self.generate_image_with_progress(prompt, name, |p| {
            tracing::debug!(step = p.current_step, total = p.total_steps, "Sampling");
        })
        .await
    }

    /// Like [`generate_image`](Self::generate_image), reporting sampler steps
    /// to `on_progress`.
    pub async fn generate_image_with_progress<F>(
        &self,
        prompt: &str,
        name: &str,
        on_progress: F,
    ) -> Result<PathBuf>
    where
        F: FnMut(ProgressUpdate) + Send,
    {
        let (graph, seed) = self.prepare(prompt)?;

        let client_id = Uuid::new_v4().to_string();
        let mut session = Session::open(&self.client, client_id).await?;
        let outcome = self.run(&mut session, &graph, prompt, seed, name, on_progress).await;
        session.close().await;

        match &outcome {
            Ok(path) => tracing::info!(name, path = %path.display(), "Image saved"),
            Err(e) => tracing::warn!(name, error = %e, "Image generation failed"),
        }
        outcome
    }

    async fn run<F>(
        &self,
        session: &mut Session<'_>,
        graph: &WorkflowGraph,
        prompt: &str,
        seed: u64,
        name: &str,
        on_progress: F,
    ) -> Result<PathBuf>
    where
        F: FnMut(ProgressUpdate),
    {
        let job = session.submit(graph, prompt, seed).await?;
        session
            .await_completion(&job, self.config.timeout, &self.cancel, on_progress)
            .await?;

        let outputs = self.client.history(&job.prompt_id).await?;
        let (node, artifact) = first_artifact(&outputs)
            .ok_or_else(|| ImageError::NoArtifactProduced(job.prompt_id.clone()))?;
        tracing::debug!(node, filename = %artifact.filename, "Fetching artifact");

        let bytes = self.client.view(artifact).await?;
        persist(&self.config.output_dir, name, artifact, &bytes)
    }
}

impl ImageGenerator for ImageEngine {
    fn generate(&self, prompt: &str, name: &str) -> impl Future<Output = Result<PathBuf>> + Send {
        self.generate_image(prompt, name)
    }

    async fn ready(&self) -> bool {
        self.health().await.unwrap_or(false)
    }
}
