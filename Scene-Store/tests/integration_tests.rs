use scene_store::*;

async fn seed_book(store: &impl RecordStore, scenes: u32) -> String {
    let book = store.create_book("Finn und der Mond", "a fox and the moon").await.unwrap();
    for n in 1..=scenes {
        store
            .add_scene(&NewScene::new(&book, n, format!("Text {}", n), format!("fox, scene {}", n)))
            .await
            .unwrap();
    }
    book
}

#[tokio::test]
async fn story_then_art_lifecycle() {
    let store = SqliteStore::in_memory().unwrap();
    let book = seed_book(&store, 3).await;

    let pending = store.pending_scenes().await.unwrap();
    assert_eq!(pending.len(), 3);
    assert!(pending.iter().all(|s| s.image_status == ImageStatus::Pending));
    assert_eq!(pending[0].output_name(), format!("{}_scene_1", book));

    for scene in &pending {
        let path = format!("output/{}.png", scene.output_name());
        store.mark_scene_done(&scene.id, &path).await.unwrap();
    }

    assert!(store.pending_scenes().await.unwrap().is_empty());
    let done = store.scenes_for_book(&book).unwrap();
    assert!(done.iter().all(|s| s.image_status == ImageStatus::Done));
    assert_eq!(
        done[2].local_image_path.as_deref(),
        Some(format!("output/{}_scene_3.png", book).as_str())
    );
}

#[tokio::test]
async fn marking_unknown_scene_is_not_found() {
    let store = SqliteStore::in_memory().unwrap();
    let err = store.mark_scene_done("missing", "x.png").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn failed_scenes_stay_pending_across_runs() {
    let store = SqliteStore::in_memory().unwrap();
    seed_book(&store, 2).await;

    let first_run = store.pending_scenes().await.unwrap();
    // Only scene 1 succeeds.
    store.mark_scene_done(&first_run[0].id, "a.png").await.unwrap();

    let second_run = store.pending_scenes().await.unwrap();
    assert_eq!(second_run.len(), 1);
    assert_eq!(second_run[0].scene_number, 2);
}

#[tokio::test]
async fn records_persist_in_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kidsbook.db");

    {
        let store = StoreConfig::sqlite(&path).open().unwrap();
        seed_book(&store, 2).await;
    }

    let reopened = StoreConfig::sqlite(&path).open().unwrap();
    assert_eq!(reopened.pending_scenes().await.unwrap().len(), 2);
}

#[tokio::test]
async fn pending_scenes_grouped_by_book() {
    let store = SqliteStore::in_memory().unwrap();
    let a = seed_book(&store, 2).await;
    let b = seed_book(&store, 2).await;

    let pending = store.pending_scenes().await.unwrap();
    assert_eq!(pending.len(), 4);
    // Scenes of one book are contiguous and in order.
    let first_book = pending[0].book_id.clone().unwrap();
    assert!(first_book == a || first_book == b);
    assert_eq!(pending[1].book_id.as_deref(), Some(first_book.as_str()));
    assert_eq!(pending[0].scene_number, 1);
    assert_eq!(pending[1].scene_number, 2);
    assert_eq!(pending[2].scene_number, 1);
}
