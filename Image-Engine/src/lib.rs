//! # image-engine
//!
//! Job orchestration for [ComfyUI](https://github.com/comfyanonymous/ComfyUI).
//!
//! Loads an API-format workflow template, finds the sampler and its positive
//! prompt node, injects a prompt and a fresh seed, submits the job over REST,
//! waits for the completion event on ComfyUI's WebSocket channel, then
//! downloads the first produced image and writes it to the output directory.
//!
//! ## Quick Start
//!
//! ```no_run
//! use image_engine::{ImageEngine, ImageEngineConfig};
//!
//! # async fn example() -> image_engine::Result<()> {
//! let engine = ImageEngine::new(
//!     ImageEngineConfig::builder()
//!         .with_endpoint("http://127.0.0.1:8188")
//!         .with_workflows_dir("workflows")
//!         .with_workflow("comfy_workflow_api")
//!         .build(),
//! );
//!
//! let path = engine
//!     .generate_image_with_progress("a cat in a hat", "scene_1", |p| {
//!         println!("Step {}/{}", p.current_step, p.total_steps)
//!     })
//!     .await?;
//! println!("{}", path.display());
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod client;
pub mod engine;
pub mod error;
pub mod graph;
pub mod handshake;
pub mod job;
pub mod library;
pub mod resolve;
pub mod session;
pub mod types;

pub use client::ComfyClient;
pub use engine::{ImageEngine, ImageEngineConfig, ImageEngineConfigBuilder, ImageGenerator};
pub use error::{ImageError, Result};
pub use graph::{InputRef, InputValue, NodeClass, NodeDef, WorkflowGraph};
pub use handshake::HandshakeState;
pub use library::WorkflowLibrary;
pub use resolve::{resolve, ResolvedNodes};
pub use session::Session;
pub use types::{ArtifactDescriptor, Job, ProgressUpdate};
