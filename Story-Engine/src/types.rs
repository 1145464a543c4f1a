use serde::{Deserialize, Serialize};

/// A story as returned by the model: a title and an ordered list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub blocks: Vec<StoryBlock>,
}

/// One block of a story. Block types other than `text` and `image_prompt`
/// are kept as [`StoryBlock::Other`] and ignored when building scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoryBlock {
    Text { content: String },
    ImagePrompt { content: String },
    #[serde(other)]
    Other,
}

/// A page of the book: the narration preceding an illustration and the
/// prompt for that illustration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    /// 1-based position in the book.
    pub number: u32,
    pub text: String,
    pub image_prompt: String,
}

impl Story {
    /// Pair each image prompt with the most recent text block before it.
    ///
    /// A text block is consumed by the first image prompt after it, so an
    /// image prompt with no fresh text in front of it gets empty text.
    /// Trailing text with no image prompt after it produces no scene.
    pub fn scenes(&self) -> Vec<Scene> {
        let mut scenes = Vec::new();
        let mut pending_text = String::new();

        for block in &self.blocks {
            match block {
                StoryBlock::Text { content } => pending_text = content.clone(),
                StoryBlock::ImagePrompt { content } => {
                    scenes.push(Scene {
                        number: scenes.len() as u32 + 1,
                        text: std::mem::take(&mut pending_text),
                        image_prompt: content.clone(),
                    });
                }
                StoryBlock::Other => {}
            }
        }
        scenes
    }
}

/// Result of a generation call.
#[derive(Debug, Clone)]
pub struct StoryOutput {
    pub story: Story,

    /// Content of a `<think>...</think>` block, if the model emitted one.
    pub thinking: Option<String>,

    /// The full response text as streamed.
    pub raw_response: String,
}
