//! Stream a story from a local Ollama instance and print its scenes.
//!
//! ```sh
//! cargo run --example write_story -- "a penguin who is afraid of water"
//! ```

use std::io::Write;

use story_engine::{LlmConfig, OllamaClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let topic = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "a small dragon learning to fly".to_string());

    let ollama = OllamaClient::new("http://localhost:11434", "llama3.1")
        .with_config(LlmConfig::default().with_unload_cooldown(std::time::Duration::ZERO));

    let output = ollama
        .generate_story_streaming(&topic, |token| {
            print!("{}", token);
            let _ = std::io::stdout().flush();
        })
        .await?;
    println!();

    if let Some(thinking) = &output.thinking {
        println!("(model reasoning: {} chars)", thinking.len());
    }

    println!("\n{}", output.story.title);
    for scene in output.story.scenes() {
        println!("\n[{}] {}\n    -> {}", scene.number, scene.text, scene.image_prompt);
    }

    ollama.unload_model().await?;
    Ok(())
}
