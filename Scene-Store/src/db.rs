use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};

use crate::types::{BookRecord, ImageStatus, NewScene, SceneRecord, BOOK_READY_FOR_ART};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS books (
    id              TEXT PRIMARY KEY,
    title           TEXT NOT NULL,
    topic           TEXT NOT NULL,
    status          TEXT NOT NULL,
    created_at      DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS scenes (
    id                  TEXT PRIMARY KEY,
    book_id             TEXT REFERENCES books(id) ON DELETE CASCADE,
    scene_number        INTEGER NOT NULL,
    story_text          TEXT NOT NULL DEFAULT '',
    image_prompt        TEXT NOT NULL,
    image_status        TEXT NOT NULL CHECK(image_status IN ('Pending', 'Done')),
    local_image_path    TEXT,
    created_at          DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at          DATETIME
);

CREATE INDEX IF NOT EXISTS idx_scenes_status ON scenes(image_status, book_id, scene_number);
"#;

/// Open (or create) the record database. Pass `None` for an in-memory database.
pub fn open_database(path: Option<&std::path::Path>) -> Result<Connection> {
    let conn = match path {
        Some(p) => Connection::open(p)
            .with_context(|| format!("Failed to open record database {}", p.display()))?,
        None => Connection::open_in_memory().context("Failed to open in-memory database")?,
    };

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
    .context("Failed to set PRAGMA options")?;

    conn.execute_batch(SCHEMA)
        .context("Failed to create record schema")?;

    Ok(conn)
}

/// Insert a book with status "Ready for Art". Returns the new id.
pub fn insert_book(conn: &Connection, title: &str, topic: &str) -> Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO books (id, title, topic, status) VALUES (?1, ?2, ?3, ?4)",
        params![id, title, topic, BOOK_READY_FOR_ART],
    )
    .context("Failed to insert book")?;
    Ok(id)
}

/// Insert a Pending scene. Returns the new id.
pub fn insert_scene(conn: &Connection, scene: &NewScene) -> Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO scenes (id, book_id, scene_number, story_text, image_prompt, image_status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            scene.book_id,
            scene.scene_number,
            scene.story_text,
            scene.image_prompt,
            ImageStatus::Pending.as_str()
        ],
    )
    .with_context(|| format!("Failed to insert scene {}", scene.scene_number))?;
    Ok(id)
}

fn scene_from_row(row: &Row<'_>) -> rusqlite::Result<(SceneRecord, String)> {
    let status: String = row.get(5)?;
    Ok((
        SceneRecord {
            id: row.get(0)?,
            book_id: row.get(1)?,
            scene_number: row.get(2)?,
            story_text: row.get(3)?,
            image_prompt: row.get(4)?,
            image_status: ImageStatus::Pending,
            local_image_path: row.get(6)?,
        },
        status,
    ))
}

fn with_status((mut scene, status): (SceneRecord, String)) -> Result<SceneRecord> {
    scene.image_status = ImageStatus::parse(&status)
        .with_context(|| format!("Scene '{}' has unknown status '{}'", scene.id, status))?;
    Ok(scene)
}

const SCENE_COLUMNS: &str =
    "id, book_id, scene_number, story_text, image_prompt, image_status, local_image_path";

/// All Pending scenes, ordered by book creation then scene number.
///
/// `created_at` has one-second resolution; `rowid` keeps insertion order
/// among books created within the same second.
pub fn pending_scenes(conn: &Connection) -> Result<Vec<SceneRecord>> {
    let sql = "SELECT s.id, s.book_id, s.scene_number, s.story_text, s.image_prompt,
                      s.image_status, s.local_image_path
               FROM scenes s LEFT JOIN books b ON b.id = s.book_id
               WHERE s.image_status = 'Pending'
               ORDER BY b.created_at ASC, b.rowid ASC, s.book_id ASC, s.scene_number ASC";
    let mut stmt = conn
        .prepare(sql)
        .context("Failed to prepare pending_scenes query")?;

    let rows = stmt
        .query_map([], scene_from_row)
        .context("Failed to query pending scenes")?;

    let mut scenes = Vec::new();
    for row in rows {
        scenes.push(with_status(row.context("Failed to read scene row")?)?);
    }
    Ok(scenes)
}

/// Record the image path and mark the scene Done. Returns `false` when no
/// scene has that id.
pub fn mark_scene_done(conn: &Connection, scene_id: &str, image_path: &str) -> Result<bool> {
    let now = chrono::Utc::now().to_rfc3339();
    let changed = conn
        .execute(
            "UPDATE scenes SET image_status = 'Done', local_image_path = ?1, updated_at = ?2
             WHERE id = ?3",
            params![image_path, now, scene_id],
        )
        .context("Failed to mark scene as done")?;
    Ok(changed > 0)
}

/// Get a single scene by id.
pub fn get_scene(conn: &Connection, scene_id: &str) -> Result<Option<SceneRecord>> {
    let sql = format!("SELECT {} FROM scenes WHERE id = ?1", SCENE_COLUMNS);
    let mut stmt = conn.prepare(&sql).context("Failed to prepare get_scene query")?;
    let mut rows = stmt.query_map(params![scene_id], scene_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(with_status(row?)?)),
        None => Ok(None),
    }
}

/// Get a single book by id.
pub fn get_book(conn: &Connection, book_id: &str) -> Result<Option<BookRecord>> {
    let mut stmt = conn
        .prepare("SELECT id, title, topic, status, created_at FROM books WHERE id = ?1")
        .context("Failed to prepare get_book query")?;
    let mut rows = stmt.query(params![book_id])?;

    if let Some(row) = rows.next()? {
        Ok(Some(BookRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            topic: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
        }))
    } else {
        Ok(None)
    }
}

/// All scenes of a book in scene order.
pub fn scenes_for_book(conn: &Connection, book_id: &str) -> Result<Vec<SceneRecord>> {
    let sql = format!(
        "SELECT {} FROM scenes WHERE book_id = ?1 ORDER BY scene_number ASC",
        SCENE_COLUMNS
    );
    let mut stmt = conn
        .prepare(&sql)
        .context("Failed to prepare scenes_for_book query")?;
    let rows = stmt.query_map(params![book_id], scene_from_row)?;

    let mut scenes = Vec::new();
    for row in rows {
        scenes.push(with_status(row.context("Failed to read scene row")?)?);
    }
    Ok(scenes)
}
