//! Completion handshake over ComfyUI's WebSocket notification channel.
//!
//! After a prompt is queued, ComfyUI broadcasts a stream of `{type, data}`
//! events to the submitting client. The job is finished when an `executing`
//! event arrives whose `node` is null and whose `prompt_id` is the job's.
//! Everything else is skipped.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::error::{ImageError, Result};
use crate::types::ProgressUpdate;

/// Where a handshake currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Awaiting,
    Done,
    TimedOut,
    Errored,
    Cancelled,
}

impl HandshakeState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, HandshakeState::Awaiting)
    }
}

/// One event from the notification channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl ChannelEvent {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn node(&self) -> Option<&str> {
        self.data.get("node").and_then(Value::as_str)
    }

    pub fn prompt_id(&self) -> Option<&str> {
        self.data.get("prompt_id").and_then(Value::as_str)
    }

    /// `executing` with an explicit null node for `prompt_id`: the job has
    /// finished. A missing `node` key is not a completion signal.
    pub fn completes(&self, prompt_id: &str) -> bool {
        self.kind == "executing"
            && self.data.get("node").is_some_and(Value::is_null)
            && self.prompt_id() == Some(prompt_id)
    }

    /// Step progress for `prompt_id`. Events without a prompt id are accepted.
    pub fn progress_for(&self, prompt_id: &str) -> Option<ProgressUpdate> {
        if self.kind != "progress" {
            return None;
        }
        if self.prompt_id().is_some_and(|pid| pid != prompt_id) {
            return None;
        }
        let value = self.data.get("value").and_then(Value::as_u64).unwrap_or(0);
        let max = self.data.get("max").and_then(Value::as_u64).unwrap_or(1);
        Some(ProgressUpdate {
            current_step: value as u32,
            total_steps: max as u32,
        })
    }
}

/// State machine consuming channel frames for a single prompt.
#[derive(Debug)]
pub struct Handshake {
    prompt_id: String,
    state: HandshakeState,
    discarded: usize,
}

impl Handshake {
    pub fn new(prompt_id: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            state: HandshakeState::Awaiting,
            discarded: 0,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn prompt_id(&self) -> &str {
        &self.prompt_id
    }

    /// Number of frames skipped so far.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Feed the next item from the channel. `None` means the stream ended.
    ///
    /// Returns the new state, or the channel error that moved the handshake
    /// to [`HandshakeState::Errored`].
    pub fn advance<F>(
        &mut self,
        frame: Option<std::result::Result<Message, tungstenite::Error>>,
        on_progress: &mut F,
    ) -> Result<HandshakeState>
    where
        F: FnMut(ProgressUpdate),
    {
        if self.state.is_terminal() {
            return Ok(self.state);
        }

        let text = match frame {
            None => return Err(self.fail("channel closed before completion".into())),
            Some(Err(e)) => return Err(self.fail(e.to_string())),
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| format!("server closed channel: {} {}", f.code, f.reason))
                    .unwrap_or_else(|| "server closed channel".into());
                return Err(self.fail(reason));
            }
            // Preview images, pings and pongs.
            Some(Ok(_)) => {
                self.discarded += 1;
                return Ok(self.state);
            }
        };

        let event = ChannelEvent::parse(&text)
            .map_err(|e| self.fail(format!("malformed event: {}", e)))?;

        if event.completes(&self.prompt_id) {
            self.state = HandshakeState::Done;
            tracing::debug!(
                prompt_id = %self.prompt_id,
                discarded = self.discarded,
                "Completion signal received"
            );
            return Ok(self.state);
        }

        if let Some(progress) = event.progress_for(&self.prompt_id) {
            on_progress(progress);
        }
        self.discarded += 1;
        Ok(self.state)
    }

    fn fail(&mut self, reason: String) -> ImageError {
        self.state = HandshakeState::Errored;
        tracing::warn!(prompt_id = %self.prompt_id, %reason, "Notification channel failed");
        ImageError::ChannelError(reason)
    }
}

/// Consume `stream` until `prompt_id` completes, the deadline passes, or
/// `cancel` fires.
pub async fn await_completion<S, F>(
    stream: &mut S,
    prompt_id: &str,
    timeout: Duration,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<()>
where
    S: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
    F: FnMut(ProgressUpdate),
{
    let mut handshake = Handshake::new(prompt_id);
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                handshake.state = HandshakeState::Cancelled;
                return Err(ImageError::Cancelled(prompt_id.to_string()));
            }
            _ = &mut deadline => {
                handshake.state = HandshakeState::TimedOut;
                tracing::warn!(prompt_id, secs = timeout.as_secs(), "Timed out waiting for completion");
                return Err(ImageError::TimedOut {
                    prompt_id: prompt_id.to_string(),
                    secs: timeout.as_secs(),
                });
            }
            frame = stream.next() => frame,
        };

        if handshake.advance(frame, &mut on_progress)? == HandshakeState::Done {
            return Ok(());
        }
    }
}
