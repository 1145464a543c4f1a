//! Generate a single image from a workflow template.
//!
//! Requires a running ComfyUI instance at http://127.0.0.1:8188 and an
//! API-format template at `workflows/comfy_workflow_api.json`.
//!
//! ```sh
//! cargo run --example simple_generation -- "a red kite over a green hill"
//! ```

use image_engine::{ImageEngine, ImageEngineConfig};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "a beautiful sunset over mountains".to_string());

    let engine = ImageEngine::new(ImageEngineConfig::default());

    if !engine.health().await? {
        eprintln!("ComfyUI is not responding");
        return Ok(());
    }

    let path = engine
        .generate_image_with_progress(&prompt, "example", |p| {
            println!("Step {}/{}", p.current_step, p.total_steps)
        })
        .await?;
    println!("Saved: {}", path.display());

    Ok(())
}
