//! Airtable backend against a wiremock server.

use scene_store::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer) -> AirtableStore {
    AirtableStore::new("pat_test", "appBASE")
        .unwrap()
        .with_api_base(server.uri())
}

#[tokio::test]
async fn create_book_posts_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/appBASE/Books"))
        .and(header("authorization", "Bearer pat_test"))
        .and(body_json(json!({
            "fields": {"Title": "Finn", "Topic": "foxes", "Status": "Ready for Art"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "recBOOK1",
            "createdTime": "2024-05-01T10:00:00.000Z",
            "fields": {"Title": "Finn"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let id = store_for(&server).create_book("Finn", "foxes").await.unwrap();
    assert_eq!(id, "recBOOK1");
}

#[tokio::test]
async fn add_scene_links_book() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/appBASE/Scenes"))
        .and(body_json(json!({
            "fields": {
                "Book": ["recBOOK1"],
                "Scene Number": 2,
                "Story Text": "Der Mond lachte.",
                "Image Prompt": "fox and moon",
                "Image Status": "Pending"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "recS2", "fields": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let id = store_for(&server)
        .add_scene(&NewScene::new("recBOOK1", 2, "Der Mond lachte.", "fox and moon"))
        .await
        .unwrap();
    assert_eq!(id, "recS2");
}

#[tokio::test]
async fn pending_scenes_follow_offsets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appBASE/Scenes"))
        .and(query_param("filterByFormula", "{Image Status} = 'Pending'"))
        .and(query_param_is_missing("offset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                {"id": "recS1", "fields": {"Book": ["recB"], "Scene Number": 1, "Image Prompt": "one", "Image Status": "Pending"}}
            ],
            "offset": "itrNEXT/recS1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appBASE/Scenes"))
        .and(query_param("offset", "itrNEXT/recS1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                {"id": "recS2", "fields": {"Scene Number": 2, "Image Prompt": "two", "Image Status": "Pending"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let scenes = store_for(&server).pending_scenes().await.unwrap();
    assert_eq!(scenes.len(), 2);
    assert_eq!(scenes[0].output_name(), "recB_scene_1");
    assert_eq!(scenes[1].output_name(), "unknown_book_scene_2");
}

#[tokio::test]
async fn mark_done_patches_record() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/appBASE/Scenes/recS1"))
        .and(body_json(json!({
            "fields": {"Local Image Path": "output/recB_scene_1.png", "Image Status": "Done"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "recS1", "fields": {}})))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server)
        .mark_scene_done("recS1", "output/recB_scene_1.png")
        .await
        .unwrap();
}

#[tokio::test]
async fn api_errors_surface_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(422).set_body_string(r#"{"error":{"type":"INVALID_FILTER_BY_FORMULA"}}"#))
        .mount(&server)
        .await;

    match store_for(&server).pending_scenes().await.unwrap_err() {
        StoreError::Airtable { status, body } => {
            assert_eq!(status, 422);
            assert!(body.contains("INVALID_FILTER_BY_FORMULA"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn config_opens_airtable_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appBASE/Scenes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .mount(&server)
        .await;

    let store = StoreConfig::Airtable {
        api_key: "pat_test".into(),
        base_id: "appBASE".into(),
        api_base: Some(server.uri()),
    }
    .open()
    .unwrap();
    assert!(store.pending_scenes().await.unwrap().is_empty());
}
