use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Result, StoreError};
use crate::store::RecordStore;
use crate::types::{ImageStatus, NewScene, SceneRecord, BOOK_READY_FOR_ART};

pub const DEFAULT_API_BASE: &str = "https://api.airtable.com/v0";

/// Formula selecting scenes that still need an illustration.
pub const PENDING_FORMULA: &str = "{Image Status} = 'Pending'";

/// Airtable base with a `Books` and a `Scenes` table.
///
/// Field names match the base layout the pipeline was designed around:
/// `Title`, `Topic`, `Status` on books; `Book` (linked record), `Scene Number`,
/// `Story Text`, `Image Prompt`, `Image Status`, `Local Image Path` on scenes.
#[derive(Debug, Clone)]
pub struct AirtableStore {
    http: Client,
    api_base: String,
    base_id: String,
    api_key: String,
    books_table: String,
    scenes_table: String,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    records: Vec<SceneRow>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SceneRow {
    id: String,
    #[serde(default)]
    fields: SceneFields,
}

#[derive(Debug, Default, Deserialize)]
struct SceneFields {
    #[serde(rename = "Book", default)]
    book: Vec<String>,
    #[serde(rename = "Scene Number", default)]
    scene_number: u32,
    #[serde(rename = "Story Text", default)]
    story_text: String,
    #[serde(rename = "Image Prompt", default)]
    image_prompt: String,
    #[serde(rename = "Image Status", default)]
    image_status: Option<String>,
    #[serde(rename = "Local Image Path", default)]
    local_image_path: Option<String>,
}

impl From<SceneRow> for SceneRecord {
    fn from(row: SceneRow) -> Self {
        let f = row.fields;
        SceneRecord {
            id: row.id,
            book_id: f.book.into_iter().next(),
            scene_number: f.scene_number,
            story_text: f.story_text,
            image_prompt: f.image_prompt,
            image_status: f
                .image_status
                .as_deref()
                .and_then(ImageStatus::parse)
                .unwrap_or(ImageStatus::Pending),
            local_image_path: f.local_image_path,
        }
    }
}

impl AirtableStore {
    /// Create a store for `base_id`. Both credentials must be non-empty.
    pub fn new(api_key: impl Into<String>, base_id: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let base_id = base_id.into();
        if api_key.trim().is_empty() || base_id.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "Airtable API key and base id are required".into(),
            ));
        }
        Ok(Self {
            http: Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            base_id,
            api_key,
            books_table: "Books".into(),
            scenes_table: "Scenes".into(),
        })
    }

    /// Point at a different API root (for proxies and tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_tables(mut self, books: impl Into<String>, scenes: impl Into<String>) -> Self {
        self.books_table = books.into();
        self.scenes_table = scenes.into();
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    fn url(&self, table: &str, record_id: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| StoreError::InvalidConfig(format!("Bad Airtable URL: {}", e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::InvalidConfig("Airtable URL cannot be a base".into()))?;
            segments.pop_if_empty().push(&self.base_id).push(table);
            if let Some(id) = record_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<reqwest::Response> {
        let mut req = self.http.request(method, url).bearer_auth(&self.api_key);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Airtable { status, body });
        }
        Ok(resp)
    }

    async fn create(&self, table: &str, fields: Value) -> Result<String> {
        let url = self.url(table, None)?;
        let resp = self
            .send(Method::POST, url, Some(&json!({ "fields": fields })))
            .await?;
        let created: CreatedRecord = resp.json().await?;
        Ok(created.id)
    }
}

impl RecordStore for AirtableStore {
    async fn create_book(&self, title: &str, topic: &str) -> Result<String> {
        let id = self
            .create(
                &self.books_table,
                json!({ "Title": title, "Topic": topic, "Status": BOOK_READY_FOR_ART }),
            )
            .await?;
        tracing::info!(book_id = %id, title, "Book created in Airtable");
        Ok(id)
    }

    async fn add_scene(&self, scene: &NewScene) -> Result<String> {
        self.create(
            &self.scenes_table,
            json!({
                "Book": [scene.book_id],
                "Scene Number": scene.scene_number,
                "Story Text": scene.story_text,
                "Image Prompt": scene.image_prompt,
                "Image Status": ImageStatus::Pending.as_str(),
            }),
        )
        .await
    }

    async fn pending_scenes(&self) -> Result<Vec<SceneRecord>> {
        let mut scenes = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut url = self.url(&self.scenes_table, None)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("filterByFormula", PENDING_FORMULA);
                if let Some(ref o) = offset {
                    query.append_pair("offset", o);
                }
            }

            let page: RecordPage = self.send(Method::GET, url, None).await?.json().await?;
            scenes.extend(page.records.into_iter().map(SceneRecord::from));

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        tracing::info!(count = scenes.len(), "Fetched pending scenes from Airtable");
        Ok(scenes)
    }

    async fn mark_scene_done(&self, scene_id: &str, image_path: &str) -> Result<()> {
        let url = self.url(&self.scenes_table, Some(scene_id))?;
        let body = json!({
            "fields": {
                "Local Image Path": image_path,
                "Image Status": ImageStatus::Done.as_str(),
            }
        });
        self.send(Method::PATCH, url, Some(&body)).await?;
        tracing::debug!(scene_id, "Scene marked done in Airtable");
        Ok(())
    }
}
