//! # Scene Store
//!
//! Books and scenes for the kidsbook pipeline. The story phase writes a book
//! and one Pending scene per illustration; the art phase reads Pending scenes
//! as its work queue and marks each Done once its image is on disk.
//!
//! Two backends implement [`RecordStore`]:
//!
//! - [`SqliteStore`]: a local SQLite file (default)
//! - [`AirtableStore`]: an Airtable base with `Books` and `Scenes` tables
//!
//! ## Example
//!
//! ```no_run
//! use scene_store::{NewScene, RecordStore, StoreConfig};
//!
//! # async fn example() -> scene_store::Result<()> {
//! let store = StoreConfig::sqlite("kidsbook.db").open()?;
//! let book = store.create_book("Der kleine Drache", "a dragon who can't fly").await?;
//! store
//!     .add_scene(&NewScene::new(&book, 1, "Es war einmal...", "a small green dragon"))
//!     .await?;
//!
//! for scene in store.pending_scenes().await? {
//!     println!("{} -> {}", scene.output_name(), scene.image_prompt);
//! }
//! # Ok(())
//! # }
//! ```

pub mod airtable;
pub mod config;
pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use airtable::AirtableStore;
pub use config::{Store, StoreConfig};
pub use error::{Result, StoreError};
pub use store::{RecordStore, SqliteStore};
pub use types::{BookRecord, ImageStatus, NewScene, SceneRecord, BOOK_READY_FOR_ART, UNKNOWN_BOOK};
