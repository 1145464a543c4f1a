use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::artifact::{parse_history, ArtifactOutputs};
use crate::error::{ImageError, Result};
use crate::graph::WorkflowGraph;
use crate::types::ArtifactDescriptor;

/// Body of `POST /prompt`.
#[derive(Serialize)]
struct PromptRequest<'a> {
    prompt: &'a WorkflowGraph,
    client_id: &'a str,
}

fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// REST client for a ComfyUI server.
///
/// Holds no per-job state; the client id that ties a submission to its
/// notification channel is passed in by the [`Session`](crate::Session)
/// that owns that channel.
///
/// # Example
/// ```no_run
/// use image_engine::ComfyClient;
///
/// # async fn example() -> image_engine::Result<()> {
/// let client = ComfyClient::new("http://127.0.0.1:8188");
/// let healthy = client.health().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ComfyClient {
    http: Client,
    endpoint: String,
    ws_endpoint: Option<String>,
}

impl ComfyClient {
    /// Create a new client pointing at the given ComfyUI endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: normalize(endpoint.into()),
            ws_endpoint: None,
        }
    }

    /// Serve the notification channel from a different base URL than REST.
    pub fn with_ws_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.ws_endpoint = Some(normalize(endpoint.into()));
        self
    }

    /// Use a custom `reqwest::Client` (for connection pooling, timeouts, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Returns the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// WebSocket URL of the notification channel for `client_id`.
    pub fn ws_url(&self, client_id: &str) -> String {
        let base = self.ws_endpoint.as_deref().unwrap_or(&self.endpoint);
        format!(
            "{}/ws?clientId={}",
            base.replace("http://", "ws://").replace("https://", "wss://"),
            client_id
        )
    }

    // ── Health ──────────────────────────────────────────────────────

    /// Check whether ComfyUI is reachable via `/system_stats`.
    pub async fn health(&self) -> Result<bool> {
        let url = format!("{}/system_stats", self.endpoint);
        match self
            .http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                tracing::debug!(endpoint = %self.endpoint, error = %e, "ComfyUI health probe failed");
                Ok(false)
            }
        }
    }

    // ── Prompt ──────────────────────────────────────────────────────

    /// Queue a workflow for execution under `client_id`. Returns the `prompt_id`.
    pub async fn queue_prompt(&self, graph: &WorkflowGraph, client_id: &str) -> Result<String> {
        let url = format!("{}/prompt", self.endpoint);
        let body = PromptRequest {
            prompt: graph,
            client_id,
        };

        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ImageError::SubmissionRejected(format!(
                    "Cannot connect to ComfyUI at {}: is the service running? ({})",
                    self.endpoint, e
                ))
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(ImageError::SubmissionRejected(format!(
                "HTTP {}: {}",
                status, body_text
            )));
        }

        let json: Value = resp.json().await.map_err(|e| {
            ImageError::SubmissionRejected(format!("Failed to parse /prompt response: {}", e))
        })?;

        if let Some(errors) = json.get("node_errors") {
            if let Some(obj) = errors.as_object() {
                if !obj.is_empty() {
                    return Err(ImageError::SubmissionRejected(format!(
                        "Workflow node errors: {}",
                        serde_json::to_string_pretty(errors).unwrap_or_default()
                    )));
                }
            }
        }

        json.get("prompt_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ImageError::SubmissionRejected("Response missing prompt_id".into()))
    }

    // ── History ─────────────────────────────────────────────────────

    /// Fetch the artifacts a finished prompt produced, per node.
    pub async fn history(&self, prompt_id: &str) -> Result<ArtifactOutputs> {
        let url = format!("{}/history/{}", self.endpoint, prompt_id);
        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| ImageError::DownloadError(format!("Failed to fetch history: {}", e)))?;

        if !resp.status().is_success() {
            return Err(ImageError::DownloadError(format!(
                "History request returned HTTP {}",
                resp.status().as_u16()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ImageError::DownloadError(format!("Failed to read history: {}", e)))?;
        parse_history(&body, prompt_id)
    }

    // ── Artifact download ───────────────────────────────────────────

    /// Download an output artifact by its descriptor. Returns raw bytes.
    pub async fn view(&self, artifact: &ArtifactDescriptor) -> Result<Vec<u8>> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/view", self.endpoint),
            &[
                ("filename", artifact.filename.as_str()),
                ("subfolder", artifact.subfolder.as_str()),
                ("type", artifact.storage.as_str()),
            ],
        )
        .map_err(|e| ImageError::DownloadError(format!("Bad image URL: {}", e)))?;

        let resp = self
            .http
            .get(url)
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| {
                ImageError::DownloadError(format!(
                    "Failed to fetch image {} from ComfyUI: {}",
                    artifact.filename, e
                ))
            })?;

        if !resp.status().is_success() {
            return Err(ImageError::DownloadError(format!(
                "Fetching image {} returned HTTP {}",
                artifact.filename,
                resp.status().as_u16()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ImageError::DownloadError(format!("Failed to read image bytes: {}", e)))?;
        Ok(bytes.to_vec())
    }

    // ── Control ─────────────────────────────────────────────────────

    /// Free VRAM. If `unload_models` is true, all models are unloaded.
    pub async fn free_memory(&self, unload_models: bool) -> Result<()> {
        let url = format!("{}/free", self.endpoint);
        let body = if unload_models {
            serde_json::json!({"unload_models": true, "free_memory": true})
        } else {
            serde_json::json!({"free_memory": true})
        };
        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await
            .map_err(|e| ImageError::ControlFailed(format!("Failed to send free request: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(ImageError::ControlFailed(format!(
                "Free request returned HTTP {}: {}",
                status, body_text
            )));
        }
        Ok(())
    }
}
