use std::path::PathBuf;

use crate::airtable::AirtableStore;
use crate::error::Result;
use crate::store::{RecordStore, SqliteStore};
use crate::types::{NewScene, SceneRecord};

/// Which backend holds the records.
///
/// Use [`StoreConfig::sqlite`] or [`StoreConfig::airtable`], then
/// [`StoreConfig::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// Local SQLite file. `None` = in-memory database.
    Sqlite { db_path: Option<PathBuf> },

    /// Airtable base with `Books` and `Scenes` tables.
    Airtable {
        api_key: String,
        base_id: String,
        api_base: Option<String>,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Sqlite {
            db_path: Some(PathBuf::from("kidsbook.db")),
        }
    }
}

impl StoreConfig {
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        StoreConfig::Sqlite {
            db_path: Some(path.into()),
        }
    }

    pub fn airtable(api_key: impl Into<String>, base_id: impl Into<String>) -> Self {
        StoreConfig::Airtable {
            api_key: api_key.into(),
            base_id: base_id.into(),
            api_base: None,
        }
    }

    /// Short backend name for logs.
    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreConfig::Sqlite { .. } => "sqlite",
            StoreConfig::Airtable { .. } => "airtable",
        }
    }

    /// Open the configured backend.
    pub fn open(&self) -> Result<Store> {
        match self {
            StoreConfig::Sqlite { db_path } => Ok(Store::Sqlite(SqliteStore::open(db_path.as_deref())?)),
            StoreConfig::Airtable {
                api_key,
                base_id,
                api_base,
            } => {
                let mut store = AirtableStore::new(api_key.clone(), base_id.clone())?;
                if let Some(base) = api_base {
                    store = store.with_api_base(base.clone());
                }
                Ok(Store::Airtable(store))
            }
        }
    }
}

/// A store opened from a [`StoreConfig`].
#[derive(Clone)]
pub enum Store {
    Sqlite(SqliteStore),
    Airtable(AirtableStore),
}

impl RecordStore for Store {
    async fn create_book(&self, title: &str, topic: &str) -> Result<String> {
        match self {
            Store::Sqlite(s) => s.create_book(title, topic).await,
            Store::Airtable(s) => s.create_book(title, topic).await,
        }
    }

    async fn add_scene(&self, scene: &NewScene) -> Result<String> {
        match self {
            Store::Sqlite(s) => s.add_scene(scene).await,
            Store::Airtable(s) => s.add_scene(scene).await,
        }
    }

    async fn pending_scenes(&self) -> Result<Vec<SceneRecord>> {
        match self {
            Store::Sqlite(s) => s.pending_scenes().await,
            Store::Airtable(s) => s.pending_scenes().await,
        }
    }

    async fn mark_scene_done(&self, scene_id: &str, image_path: &str) -> Result<()> {
        match self {
            Store::Sqlite(s) => s.mark_scene_done(scene_id, image_path).await,
            Store::Airtable(s) => s.mark_scene_done(scene_id, image_path).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn test_default_is_sqlite_file() {
        assert_eq!(StoreConfig::default(), StoreConfig::sqlite("kidsbook.db"));
        assert_eq!(StoreConfig::default().backend_name(), "sqlite");
    }

    #[test]
    fn test_open_in_memory() {
        let store = StoreConfig::Sqlite { db_path: None }.open().unwrap();
        assert!(matches!(store, Store::Sqlite(_)));
    }

    #[test]
    fn test_airtable_needs_credentials() {
        let err = StoreConfig::airtable("", "").open().err().unwrap();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }
}
