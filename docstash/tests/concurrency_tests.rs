//! Concurrent operations on one database through cloned and separately opened handles.

use docstash::{memory::MemoryStore, prelude::*};
use futures::future::join_all;
use serde_json::json;

const TASKS: usize = 8;
const PER_TASK: usize = 25;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_lose_nothing() {
    let db = Database::open("testdb", MemoryStore::new()).unwrap();
    db.collection("events").await.unwrap();

    let handles = (0..TASKS)
        .map(|task| {
            let db = db.clone();
            tokio::spawn(async move {
                let events = db.collection("events").await?;
                for n in 0..PER_TASK {
                    events.create(json!({ "task": task, "n": n })).await?;
                }
                DocumentStoreResult::Ok(())
            })
        })
        .collect::<Vec<_>>();

    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    let events = db.collection("events").await.unwrap();
    assert_eq!(events.count(json!({})).await.unwrap(), TASKS * PER_TASK);

    for task in 0..TASKS {
        assert_eq!(events.count(json!({ "task": task })).await.unwrap(), PER_TASK);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_apply_every_patch() {
    let db = Database::open("testdb", MemoryStore::new()).unwrap();
    let counters = db.collection("counters").await.unwrap();
    let created = counters
        .create((0..TASKS).map(|slot| json!({ "slot": slot, "hits": 0 })).collect::<Vec<_>>())
        .await
        .unwrap();

    let handles = created
        .iter()
        .map(|document| {
            let db = db.clone();
            let id = document.id().unwrap_or_default().to_string();
            tokio::spawn(async move {
                let counters = db.collection("counters").await?;
                for hits in 1..=PER_TASK {
                    counters.update_by_id(&id, json!({ "hits": hits })).await?;
                }
                DocumentStoreResult::Ok(())
            })
        })
        .collect::<Vec<_>>();

    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    let done = counters
        .count(json!({ "hits": PER_TASK }))
        .await
        .unwrap();
    assert_eq!(done, TASKS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separately_opened_handles_lose_nothing() {
    let storage = MemoryStore::new();
    let handles = [
        Database::open("testdb", storage.clone()).unwrap(),
        Database::open("testdb", storage.clone()).unwrap(),
    ];
    handles[0].collection("events").await.unwrap();

    let tasks = (0..4)
        .map(|task| {
            let db = handles[task % 2].clone();
            tokio::spawn(async move {
                let events = db.collection("events").await?;
                for n in 0..100 {
                    events.create(json!({ "task": task, "n": n })).await?;
                }
                DocumentStoreResult::Ok(())
            })
        })
        .collect::<Vec<_>>();

    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let reopened = Database::open("testdb", storage).unwrap();
    let events = reopened.collection("events").await.unwrap();
    assert_eq!(events.count(json!({})).await.unwrap(), 400);
}
