//! Persistence through the file backend.

#![cfg(feature = "file")]

use docstash::{file::FileStore, prelude::*};
use serde_json::json;

#[tokio::test]
async fn data_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let storage = FileStore::builder(dir.path()).build().await.unwrap();
        let db = Database::open("company", storage).unwrap();
        let users = db.collection("users").await.unwrap();

        let created = users.create(json!({ "name": "Alice" })).await.unwrap();
        created[0].id().unwrap().to_string()
    };

    assert!(dir.path().join("company.json").is_file());

    let db = Database::open("company", FileStore::open(dir.path()).unwrap()).unwrap();
    let users = db.collection("users").await.unwrap();
    let alice = users.find_by_id(&id).await.unwrap().unwrap();

    assert_eq!(alice.get("name"), Some(&json!("Alice")));
    assert_eq!(db.info().unwrap().collections, vec!["users".to_string()]);
}

#[tokio::test]
async fn typed_documents_round_trip() {
    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Item {
        sku: String,
        qty: u32,
    }

    let dir = tempfile::tempdir().unwrap();
    let storage = FileStore::builder(dir.path()).build().await.unwrap();
    let db = Database::open("inventory", storage).unwrap();
    let items = db.collection("items").await.unwrap();

    let item = Item { sku: "A-1".to_string(), qty: 4 };
    items
        .create(Document::from_typed(&item).unwrap())
        .await
        .unwrap();

    let stored = items.find_one(json!({ "sku": "A-1" })).await.unwrap().unwrap();
    assert_eq!(stored.to_typed::<Item>().unwrap(), item);
}
