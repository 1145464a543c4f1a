//! Phase 1: write the story, store the book and its scenes, free the GPU.

use std::io::Write;

use anyhow::{Context, Result};
use scene_store::{NewScene, RecordStore};
use story_engine::OllamaClient;

use crate::config::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorySummary {
    pub book_id: String,
    pub title: String,
    pub scenes_saved: usize,
    pub scenes_failed: usize,
}

pub async fn execute(config: &AppConfig, topic: &str) -> Result<StorySummary> {
    tracing::info!(topic, backend = config.store.backend_name(), "Story phase starting");

    let ollama = OllamaClient::new(config.ollama_url.clone(), config.ollama_model.clone())
        .with_config(config.llm_config());
    let store = config.store.open().context("Failed to open record store")?;

    let summary = run(&ollama, &store, topic).await?;
    tracing::info!(
        book_id = %summary.book_id,
        title = %summary.title,
        scenes = summary.scenes_saved,
        failed = summary.scenes_failed,
        "Story phase finished; run `kidsbook art` next"
    );
    Ok(summary)
}

/// Generate, persist and unload. Tokens are echoed to stdout as they arrive.
///
/// Story generation and book creation failures abort the run. A scene that
/// cannot be stored is logged and counted; a failed unload only warns.
pub async fn run(ollama: &OllamaClient, store: &impl RecordStore, topic: &str) -> Result<StorySummary> {
    let mut stdout = std::io::stdout();
    let output = ollama
        .generate_story_streaming(topic, |token| echo_token(&mut stdout, token))
        .await
        .context("Story generation failed")?;
    println!();

    if let Some(thinking) = &output.thinking {
        tracing::debug!(chars = thinking.len(), "Model reasoning stripped");
    }

    let story = output.story;
    let book_id = store
        .create_book(&story.title, topic)
        .await
        .context("Failed to create book record")?;

    let mut summary = StorySummary {
        book_id: book_id.clone(),
        title: story.title.clone(),
        scenes_saved: 0,
        scenes_failed: 0,
    };

    for scene in story.scenes() {
        let record = NewScene::new(&book_id, scene.number, scene.text, scene.image_prompt);
        match store.add_scene(&record).await {
            Ok(id) => {
                tracing::info!(scene = scene.number, scene_id = %id, "Scene saved");
                summary.scenes_saved += 1;
            }
            Err(e) => {
                tracing::error!(scene = scene.number, error = %e, "Failed to save scene");
                summary.scenes_failed += 1;
            }
        }
    }

    if let Err(e) = ollama.unload_model().await {
        tracing::warn!(error = %e, "Could not unload text model; VRAM may still be occupied");
    }

    Ok(summary)
}

/// Write a streamed token to `out`. Echo failures are logged, never fatal.
fn echo_token(out: &mut impl Write, token: &str) {
    if let Err(e) = out.write_all(token.as_bytes()).and_then(|()| out.flush()) {
        tracing::debug!(error = %e, "Could not echo story token");
    }
}
