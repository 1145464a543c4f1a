use std::time::Duration;

use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::client::ComfyClient;
use crate::error::{ImageError, Result};
use crate::graph::WorkflowGraph;
use crate::handshake;
use crate::types::{Job, ProgressUpdate};

type Channel = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One client id with its open notification channel.
///
/// The channel is opened before anything is submitted so no event for a job
/// can be missed. Call [`Session::close`] when done; dropping the session
/// also tears down the socket, just without a close handshake.
pub struct Session<'c> {
    client: &'c ComfyClient,
    client_id: String,
    channel: Channel,
}

impl<'c> Session<'c> {
    /// Connect the notification channel for `client_id`.
    pub async fn open(client: &'c ComfyClient, client_id: impl Into<String>) -> Result<Self> {
        let client_id = client_id.into();
        let url = client.ws_url(&client_id);
        let (channel, _) = connect_async(url.as_str()).await.map_err(|e| {
            ImageError::ChannelError(format!("Cannot open notification channel {}: {}", url, e))
        })?;
        tracing::debug!(%client_id, "Notification channel open");
        Ok(Self {
            client,
            client_id,
            channel,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Queue an already-injected graph under this session's client id.
    pub async fn submit(&self, graph: &WorkflowGraph, prompt_text: &str, seed: u64) -> Result<Job> {
        let prompt_id = self.client.queue_prompt(graph, &self.client_id).await?;
        tracing::info!(%prompt_id, seed, "Job queued");
        Ok(Job {
            prompt_id,
            seed,
            prompt_text: prompt_text.to_string(),
            client_id: self.client_id.clone(),
        })
    }

    /// Block until `job` finishes, times out, or is cancelled.
    pub async fn await_completion<F>(
        &mut self,
        job: &Job,
        timeout: Duration,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<()>
    where
        F: FnMut(ProgressUpdate),
    {
        handshake::await_completion(&mut self.channel, &job.prompt_id, timeout, cancel, on_progress)
            .await
    }

    /// Close the channel. Close failures are logged, not returned.
    pub async fn close(mut self) {
        if let Err(e) = self.channel.close(None).await {
            tracing::debug!(client_id = %self.client_id, error = %e, "Channel close failed");
        }
    }
}
