use serde::{Deserialize, Serialize};

/// Status a freshly written book is given: its scenes are ready for
/// illustration.
pub const BOOK_READY_FOR_ART: &str = "Ready for Art";

/// Book id used in file names when a scene is not linked to a book.
pub const UNKNOWN_BOOK: &str = "unknown_book";

/// Illustration status of a scene: Pending -> Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageStatus {
    Pending,
    Done,
}

impl ImageStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ImageStatus::Pending => "Pending",
            ImageStatus::Done => "Done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(ImageStatus::Pending),
            "Done" => Some(ImageStatus::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    pub topic: String,
    pub status: String,
    pub created_at: Option<String>,
}

/// A scene as stored, one per illustration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub id: String,
    pub book_id: Option<String>,
    pub scene_number: u32,
    pub story_text: String,
    pub image_prompt: String,
    pub image_status: ImageStatus,
    pub local_image_path: Option<String>,
}

impl SceneRecord {
    /// File stem for this scene's illustration: `<book>_scene_<n>`.
    pub fn output_name(&self) -> String {
        format!(
            "{}_scene_{}",
            self.book_id.as_deref().unwrap_or(UNKNOWN_BOOK),
            self.scene_number
        )
    }
}

/// A scene to be inserted. It always starts out [`ImageStatus::Pending`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScene {
    pub book_id: String,
    pub scene_number: u32,
    pub story_text: String,
    pub image_prompt: String,
}

impl NewScene {
    pub fn new(
        book_id: impl Into<String>,
        scene_number: u32,
        story_text: impl Into<String>,
        image_prompt: impl Into<String>,
    ) -> Self {
        Self {
            book_id: book_id.into(),
            scene_number,
            story_text: story_text.into(),
            image_prompt: image_prompt.into(),
        }
    }
}
