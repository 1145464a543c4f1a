use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::db;
use crate::error::{Result, StoreError};
use crate::types::{NewScene, SceneRecord};

/// Where books and scenes live between the story and art phases.
///
/// Implement this trait to plug in another backend. The art phase treats
/// [`pending_scenes`](RecordStore::pending_scenes) as its work queue.
pub trait RecordStore: Send + Sync {
    /// Create a book with status "Ready for Art". Returns its id.
    fn create_book(&self, title: &str, topic: &str) -> impl Future<Output = Result<String>> + Send;

    /// Add a Pending scene to a book. Returns its id.
    fn add_scene(&self, scene: &NewScene) -> impl Future<Output = Result<String>> + Send;

    /// Every scene still waiting for an illustration.
    fn pending_scenes(&self) -> impl Future<Output = Result<Vec<SceneRecord>>> + Send;

    /// Store the illustration path and move the scene to Done.
    fn mark_scene_done(
        &self,
        scene_id: &str,
        image_path: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Local SQLite store.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database. `None` opens an in-memory database.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let conn = db::open_database(path)?;
        if let Some(p) = path {
            tracing::debug!(path = %p.display(), "Opened record database");
        }
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(None)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|e| StoreError::Other(e.to_string()))
    }

    /// All scenes of a book in scene order.
    pub fn scenes_for_book(&self, book_id: &str) -> Result<Vec<SceneRecord>> {
        let conn = self.conn()?;
        Ok(db::scenes_for_book(&conn, book_id)?)
    }
}

impl RecordStore for SqliteStore {
    async fn create_book(&self, title: &str, topic: &str) -> Result<String> {
        let id = {
            let conn = self.conn()?;
            db::insert_book(&conn, title, topic)?
        };
        tracing::info!(book_id = %id, title, "Book created");
        Ok(id)
    }

    async fn add_scene(&self, scene: &NewScene) -> Result<String> {
        let conn = self.conn()?;
        Ok(db::insert_scene(&conn, scene)?)
    }

    async fn pending_scenes(&self) -> Result<Vec<SceneRecord>> {
        let conn = self.conn()?;
        Ok(db::pending_scenes(&conn)?)
    }

    async fn mark_scene_done(&self, scene_id: &str, image_path: &str) -> Result<()> {
        let conn = self.conn()?;
        if db::mark_scene_done(&conn, scene_id, image_path)? {
            Ok(())
        } else {
            Err(StoreError::NotFound(scene_id.to_string()))
        }
    }
}
