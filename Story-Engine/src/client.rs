use crate::{
    error::{Result, StoryError},
    prompt::{render, STORY_PROMPT_TEMPLATE, STORY_SYSTEM_PROMPT},
    types::{Story, StoryOutput},
};
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Configuration for story requests.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,

    /// Context window in tokens (`num_ctx`).
    pub context_window: u32,

    /// Maximum tokens to generate. `None` leaves the model default.
    pub max_tokens: Option<u32>,

    /// Request JSON format output from the model.
    pub json_mode: bool,

    /// System prompt sent with every story request.
    pub system_prompt: String,

    /// User prompt template with a `{topic}` placeholder.
    pub prompt_template: String,

    /// Pause after unloading the model so the GPU memory is really released.
    pub unload_cooldown: Duration,

    /// Custom options merged into the Ollama options object.
    pub options: Option<Value>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            context_window: 8192,
            max_tokens: None,
            json_mode: true,
            system_prompt: STORY_SYSTEM_PROMPT.to_string(),
            prompt_template: STORY_PROMPT_TEMPLATE.to_string(),
            unload_cooldown: Duration::from_secs(10),
            options: None,
        }
    }
}

impl LlmConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_context_window(mut self, tokens: u32) -> Self {
        self.context_window = tokens;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn with_json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    pub fn with_unload_cooldown(mut self, cooldown: Duration) -> Self {
        self.unload_cooldown = cooldown;
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// Ollama client for story generation.
///
/// # Example
/// ```no_run
/// use story_engine::OllamaClient;
///
/// # async fn example() -> story_engine::Result<()> {
/// let ollama = OllamaClient::new("http://localhost:11434", "llama3.1");
/// let output = ollama
///     .generate_story_streaming("a hedgehog who wants to fly", |t| print!("{}", t))
///     .await?;
/// for scene in output.story.scenes() {
///     println!("{}: {}", scene.number, scene.image_prompt);
/// }
/// ollama.unload_model().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    endpoint: String,
    model: String,
    config: LlmConfig,
}

impl OllamaClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            config: LlmConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom `reqwest::Client` (for connection pooling, timeouts, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.endpoint)
    }

    /// Request body for a streaming story generation.
    pub fn story_request(&self, topic: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "prompt": render(&self.config.prompt_template, &[("topic", topic)]),
            "system": self.config.system_prompt,
            "stream": true,
            "options": {
                "temperature": self.config.temperature,
                "num_ctx": self.config.context_window,
            },
        });

        if let Some(max) = self.config.max_tokens {
            body["options"]["num_predict"] = json!(max);
        }

        if self.config.json_mode {
            body["format"] = json!("json");
        }

        merge_custom_options(&mut body, &self.config);
        body
    }

    /// Write a story about `topic`, discarding the token stream.
    pub async fn generate_story(&self, topic: &str) -> Result<Story> {
        Ok(self.generate_story_streaming(topic, |_| {}).await?.story)
    }

    /// Write a story about `topic`, invoking `on_token` for each streamed token.
    pub async fn generate_story_streaming<F>(&self, topic: &str, mut on_token: F) -> Result<StoryOutput>
    where
        F: FnMut(&str),
    {
        tracing::info!(model = %self.model, topic, "Generating story");
        let body = self.story_request(topic);
        let resp = self.post(&body).await?;

        let mut stream = resp.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut accumulated = String::new();
        let mut finished = false;

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(StoryError::Request)?;
            for line in lines.push(&chunk) {
                if consume_line(&line, &mut accumulated, &mut on_token) {
                    finished = true;
                    break 'read;
                }
            }
        }
        if !finished {
            if let Some(line) = lines.finish() {
                consume_line(&line, &mut accumulated, &mut on_token);
            }
        }

        let (thinking, cleaned) = extract_thinking(&accumulated);
        let story: Story = parse_output(&cleaned)?;
        tracing::info!(title = %story.title, blocks = story.blocks.len(), "Story generated");

        Ok(StoryOutput {
            story,
            thinking,
            raw_response: accumulated,
        })
    }

    /// Evict the model from GPU memory (`keep_alive: 0`), then wait out the
    /// configured cooldown.
    pub async fn unload_model(&self) -> Result<()> {
        tracing::info!(model = %self.model, "Unloading model");
        let body = json!({
            "model": self.model,
            "prompt": "",
            "keep_alive": 0,
        });
        self.post(&body).await?;

        if !self.config.unload_cooldown.is_zero() {
            tracing::debug!(secs = self.config.unload_cooldown.as_secs(), "Waiting for VRAM release");
            tokio::time::sleep(self.config.unload_cooldown).await;
        }
        Ok(())
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let url = self.generate_url();
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| StoryError::Unreachable {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StoryError::Service { status, body });
        }
        Ok(resp)
    }
}

/// Splits a byte stream into newline-terminated lines, holding back a
/// partial line until the rest of it arrives.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Append the token carried by one NDJSON line. Returns `true` on `done`.
fn consume_line<F: FnMut(&str)>(line: &str, accumulated: &mut String, on_token: &mut F) -> bool {
    let Ok(json) = serde_json::from_str::<Value>(line) else {
        tracing::debug!(line, "Skipping undecodable stream line");
        return false;
    };
    if let Some(token) = json.get("response").and_then(|v| v.as_str()) {
        if !token.is_empty() {
            accumulated.push_str(token);
            on_token(token);
        }
    }
    json.get("done").and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Extract `<think>...</think>` blocks from a response (DeepSeek R1 style).
fn extract_thinking(text: &str) -> (Option<String>, String) {
    let think_start = "<think>";
    let think_end = "</think>";

    if let Some(start_idx) = text.find(think_start) {
        if let Some(end_idx) = text.find(think_end) {
            let thinking = text[start_idx + think_start.len()..end_idx].trim().to_string();
            let mut cleaned = String::new();
            cleaned.push_str(&text[..start_idx]);
            cleaned.push_str(&text[end_idx + think_end.len()..]);
            let thinking = (!thinking.is_empty()).then_some(thinking);
            return (thinking, cleaned.trim().to_string());
        }
    }

    (None, text.to_string())
}

/// Parse model output as `T`, tolerating markdown fences and chatter
/// around the JSON.
fn parse_output<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();

    if let Ok(val) = serde_json::from_str::<T>(trimmed) {
        return Ok(val);
    }

    if let Some(json_str) = extract_json_block(trimmed) {
        if let Ok(val) = serde_json::from_str::<T>(&json_str) {
            return Ok(val);
        }
    }

    if let Some(idx) = trimmed.find('{') {
        let candidate = &trimmed[idx..];
        if let Some(end) = candidate.rfind('}') {
            if let Ok(val) = serde_json::from_str::<T>(&candidate[..=end]) {
                return Ok(val);
            }
        }
    }

    let preview: String = trimmed.chars().take(200).collect();
    Err(StoryError::InvalidStory(format!(
        "expected {{title, blocks}} JSON, got: {}",
        preview
    )))
}

/// Extract JSON from ```json ... ``` code blocks.
fn extract_json_block(text: &str) -> Option<String> {
    let markers = ["```json", "```JSON", "```"];
    for marker in markers {
        if let Some(start) = text.find(marker) {
            let content_start = start + marker.len();
            if let Some(end) = text[content_start..].find("```") {
                return Some(text[content_start..content_start + end].trim().to_string());
            }
        }
    }
    None
}

/// Merge custom options into the body's options object.
fn merge_custom_options(body: &mut Value, config: &LlmConfig) {
    if let Some(ref opts) = config.options {
        if let Some(options) = body["options"].as_object_mut() {
            if let Some(custom) = opts.as_object() {
                for (k, v) in custom {
                    options.insert(k.clone(), v.clone());
                }
            }
        }
    }
}
