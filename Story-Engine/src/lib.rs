//! # Story Engine
//!
//! Streaming [Ollama](https://ollama.com) client that writes a children's
//! story as a sequence of narration (`text`) and illustration
//! (`image_prompt`) blocks.
//!
//! ## Features
//!
//! - **Streaming**: tokens are handed to a callback as they arrive
//! - **Defensive parsing**: accepts raw JSON, fenced markdown blocks, and
//!   JSON embedded in chatter; strips `<think>` reasoning blocks
//! - **Scene pairing**: [`Story::scenes`] pairs each image prompt with the
//!   narration before it
//! - **VRAM hand-off**: [`OllamaClient::unload_model`] evicts the model and
//!   waits for the GPU memory to be released
//!
//! ## Quick Start
//!
//! ```no_run
//! use story_engine::OllamaClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ollama = OllamaClient::new("http://localhost:11434", "llama3.1");
//!     let story = ollama.generate_story("a lighthouse keeper's cat").await?;
//!
//!     println!("{}", story.title);
//!     for scene in story.scenes() {
//!         println!("{}. {}", scene.number, scene.image_prompt);
//!     }
//!
//!     ollama.unload_model().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod prompt;
pub mod types;

pub use client::{LlmConfig, OllamaClient};
pub use error::{Result, StoryError};
pub use types::{Scene, Story, StoryBlock, StoryOutput};
