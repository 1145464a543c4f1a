//! Phase 2: illustrate every Pending scene, one job at a time.

use anyhow::{bail, Context, Result};
use image_engine::{ImageEngine, ImageError, ImageGenerator};
use scene_store::RecordStore;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;

#[derive(Debug, Default)]
pub struct ArtSummary {
    pub pending: usize,
    pub generated: usize,
    /// `(scene id, reason)` for every scene left Pending.
    pub failed: Vec<(String, String)>,
    pub cancelled: bool,
}

pub async fn execute(config: &AppConfig, cancel: CancellationToken) -> Result<ArtSummary> {
    tracing::info!(backend = config.store.backend_name(), workflow = %config.workflow_name, "Art phase starting");

    let store = config.store.open().context("Failed to open record store")?;
    let engine = ImageEngine::new(config.image_engine_config()).with_cancellation(cancel.clone());

    let summary = run(&engine, &store, &cancel).await.with_context(|| {
        format!("Art phase failed (ComfyUI at {})", config.comfy_url)
    })?;

    if summary.generated > 0 {
        if let Err(e) = engine.free_memory().await {
            tracing::warn!(error = %e, "Could not ask ComfyUI to release VRAM");
        }
    }

    tracing::info!(
        pending = summary.pending,
        generated = summary.generated,
        failed = summary.failed.len(),
        cancelled = summary.cancelled,
        "Art phase finished"
    );
    for (scene_id, reason) in &summary.failed {
        tracing::warn!(scene_id = %scene_id, reason = %reason, "Scene still pending");
    }
    Ok(summary)
}

/// Work through the pending scenes in store order.
///
/// A failed scene stays Pending for the next run and the batch moves on.
/// Cancellation stops the batch before the next scene starts.
pub async fn run(
    images: &impl ImageGenerator,
    store: &impl RecordStore,
    cancel: &CancellationToken,
) -> Result<ArtSummary> {
    let scenes = store
        .pending_scenes()
        .await
        .context("Failed to query pending scenes")?;

    let mut summary = ArtSummary {
        pending: scenes.len(),
        ..ArtSummary::default()
    };
    if scenes.is_empty() {
        tracing::info!("No pending scenes, nothing to do");
        return Ok(summary);
    }

    if !images.ready().await {
        bail!("Image backend is not reachable but {} scenes are pending", scenes.len());
    }
    tracing::info!(count = scenes.len(), "Illustrating pending scenes");

    for scene in scenes {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        let name = scene.output_name();
        tracing::info!(scene = scene.scene_number, scene_id = %scene.id, name = %name, "Generating illustration");

        let path = match images.generate(&scene.image_prompt, &name).await {
            Ok(path) => path,
            Err(ImageError::Cancelled(prompt_id)) => {
                tracing::warn!(scene_id = %scene.id, prompt_id = %prompt_id, "Generation cancelled");
                summary.cancelled = true;
                break;
            }
            Err(e) => {
                tracing::error!(scene_id = %scene.id, error = %e, "Illustration failed");
                summary.failed.push((scene.id, e.to_string()));
                continue;
            }
        };

        let path = path.display().to_string();
        match store.mark_scene_done(&scene.id, &path).await {
            Ok(()) => summary.generated += 1,
            Err(e) => {
                tracing::error!(scene_id = %scene.id, error = %e, "Image saved but scene not updated");
                summary.failed.push((scene.id, e.to_string()));
            }
        }
    }

    Ok(summary)
}
