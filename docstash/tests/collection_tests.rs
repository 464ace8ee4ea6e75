//! End-to-end tests for collections over the in-memory backend.

use docstash::{identifier, memory::MemoryStore, prelude::*};
use serde_json::{Value, json};

async fn open(collection: &str) -> (Database<MemoryStore>, Collection<MemoryStore>) {
    let db = Database::open("testdb", MemoryStore::new()).unwrap();
    let collection = db.collection(collection).await.unwrap();
    (db, collection)
}

fn values(documents: &[Document], field: &str) -> Vec<Value> {
    documents
        .iter()
        .map(|document| document.get(field).cloned().unwrap_or(Value::Null))
        .collect()
}

// ========== IDENTITY ==========

#[tokio::test]
async fn created_ids_are_valid_and_distinct() {
    let (_, users) = open("users").await;

    let created = users
        .create((0..50).map(|n| json!({ "n": n })).collect::<Vec<_>>())
        .await
        .unwrap();

    let mut ids = created
        .iter()
        .map(|document| document.id().unwrap().to_string())
        .collect::<Vec<_>>();
    assert!(ids.iter().all(|id| identifier::validate(id)));

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 50);
}

#[tokio::test]
async fn created_documents_round_trip_through_find_by_id() {
    let (_, users) = open("users").await;

    let created = users
        .create(json!({
            "name": "Alice",
            "score": 12.5,
            "tags": ["a", "b"],
            "address": { "city": "Oslo" },
            "nickname": null,
        }))
        .await
        .unwrap();

    let found = users.find_by_id(created[0].id().unwrap()).await.unwrap();
    assert_eq!(found.as_ref(), Some(&created[0]));
}

// ========== QUERIES ==========

#[tokio::test]
async fn array_queries_are_a_disjunction() {
    let (_, users) = open("users").await;
    users
        .create(json!([
            { "name": "a", "role": "admin" },
            { "name": "b", "age": 70 },
            { "name": "c", "role": "user", "age": 30 },
        ]))
        .await
        .unwrap();

    let matched = users
        .find(json!([{ "role": "admin" }, { "age": { "$gte": 65 } }]))
        .await
        .unwrap()
        .sort_by("name")
        .order(SortDirection::Asc)
        .exec();

    assert_eq!(values(&matched, "name"), vec![json!("a"), json!("b")]);
}

#[tokio::test]
async fn typed_filters_match_like_json() {
    let (_, users) = open("users").await;
    users
        .create(json!([
            { "name": "a", "age": 17 },
            { "name": "b", "age": 30, "banned": true },
            { "name": "c", "age": 45 },
        ]))
        .await
        .unwrap();

    let query = Filter::and([
        Filter::gte("age", 18),
        Filter::not([Filter::eq("banned", true)]),
    ]);

    let typed = users.find(query).await.unwrap().exec();
    let literal = users
        .find(json!({ "$and": [{ "age": { "$gte": 18 } }, { "$not": { "banned": true } }] }))
        .await
        .unwrap()
        .exec();

    assert_eq!(values(&typed, "name"), vec![json!("c")]);
    assert_eq!(typed, literal);
}

#[tokio::test]
async fn membership_and_missing_fields() {
    let (_, items) = open("items").await;
    items
        .create(json!([
            { "sku": "a", "color": "red" },
            { "sku": "b", "color": "blue" },
            { "sku": "c" },
        ]))
        .await
        .unwrap();

    let count = async |query: Value| items.count(query).await.unwrap();

    assert_eq!(count(json!({ "color": { "$in": ["red", "green"] } })).await, 1);
    assert_eq!(count(json!({ "color": { "$nin": ["red"] } })).await, 2);
    assert_eq!(count(json!({ "color": { "$ne": "red" } })).await, 2);
    // A missing field is not null.
    assert_eq!(count(json!({ "color": null })).await, 0);
}

#[tokio::test]
async fn malformed_queries_are_rejected() {
    let (_, users) = open("users").await;

    for query in [
        json!("name"),
        json!({ "age": { "$between": [1, 2] } }),
        json!({ "tags": { "$in": "a" } }),
    ] {
        let err = users.find(query.clone()).await.unwrap_err();
        assert!(err.is_validation(), "{query}");
    }
}

#[tokio::test]
async fn logical_keys_ignore_sibling_fields() {
    let (_, items) = open("items").await;
    items
        .create(json!([{ "a": 1, "b": 5 }, { "a": 2, "b": 2 }]))
        .await
        .unwrap();

    let matched = items
        .find(json!({ "$or": [{ "a": 1 }], "b": 2 }))
        .await
        .unwrap()
        .exec();

    assert_eq!(values(&matched, "b"), vec![json!(5)]);
}

// ========== CURSORS ==========

#[tokio::test]
async fn cursor_sorts_skips_and_limits() {
    let (_, users) = open("users").await;
    users
        .create(json!([{ "age": 30 }, { "age": 10 }, { "age": 20 }, { "age": 40 }]))
        .await
        .unwrap();

    let page = users
        .find_all()
        .await
        .unwrap()
        .sort_by("age")
        .order_by("asc")
        .unwrap()
        .skip_by(1)
        .unwrap()
        .limit_by(2)
        .unwrap()
        .exec();

    assert_eq!(values(&page, "age"), vec![json!(20), json!(30)]);
}

#[tokio::test]
async fn database_options_set_cursor_defaults() {
    let db = Database::<MemoryStore>::builder("testdb")
        .default_sort_field("rank")
        .default_sort_direction(SortDirection::Asc)
        .default_limit(2)
        .open(MemoryStore::new())
        .unwrap();
    let users = db.collection("users").await.unwrap();
    users
        .create(json!([{ "rank": 3 }, { "rank": 1 }, { "rank": 2 }]))
        .await
        .unwrap();

    let page = users.find_all().await.unwrap().exec();

    assert_eq!(values(&page, "rank"), vec![json!(1), json!(2)]);
}

// ========== WRITES ==========

#[tokio::test]
async fn update_by_id_of_unknown_document_leaves_storage_unchanged() {
    let (db, users) = open("users").await;
    users.create(json!({ "name": "a" })).await.unwrap();
    let before = db.storage().get("testdb").unwrap();

    let err = users
        .update_by_id(&identifier::generate(), json!({ "name": "b" }))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(db.storage().get("testdb").unwrap(), before);
}

#[tokio::test]
async fn update_keeps_identity_and_refreshes_updated_at() {
    let (_, users) = open("users").await;
    let created = users.create(json!({ "name": "a", "age": 1 })).await.unwrap();
    let id = created[0].id().unwrap();

    std::thread::sleep(std::time::Duration::from_millis(5));
    let updated = users
        .update_by_id(id, json!({ "age": 2, "_id": "other" }))
        .await
        .unwrap();

    assert_eq!(updated.id(), Some(id));
    assert_eq!(updated.created_at(), created[0].created_at());
    assert!(updated.updated_at() > created[0].updated_at());
    assert_eq!(updated.get("age"), Some(&json!(2)));
    assert_eq!(users.find_by_id(id).await.unwrap(), Some(updated));
}

#[tokio::test]
async fn remove_with_empty_array_removes_everything() {
    let (_, users) = open("users").await;
    users
        .create(json!([{ "n": 1 }, { "n": 2 }, { "n": 3 }]))
        .await
        .unwrap();

    let removed = users.remove(json!([])).await.unwrap();

    assert_eq!(removed.len(), 3);
    assert_eq!(users.count(json!({})).await.unwrap(), 0);
}

#[tokio::test]
async fn collections_are_independent() {
    let (db, users) = open("users").await;
    let orders = db.collection("orders").await.unwrap();

    users.create(json!({ "name": "a" })).await.unwrap();

    assert_eq!(orders.count(json!({})).await.unwrap(), 0);

    let info = db.info().unwrap();
    assert_eq!(info.database_name, "testdb");
    assert_eq!(info.num_collections, 2);
    assert_eq!(info.collections, vec!["users".to_string(), "orders".to_string()]);
}

// ========== HOOKS ==========

#[tokio::test]
async fn failing_pre_create_appends_nothing() {
    let (_, mut users) = open("users").await;
    users.pre_fn(HookEvent::Create, |data| async move {
        match data.as_array() {
            Some(docs) if docs.len() > 1 => Err("one at a time".into()),
            _ => Ok(None),
        }
    });

    let err = users
        .create(json!([{ "n": 1 }, { "n": 2 }]))
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::Pipeline { ref phase, ref event, .. } if phase == "pre" && event == "create"));
    assert_eq!(users.count(json!({})).await.unwrap(), 0);

    users.create(json!({ "n": 1 })).await.unwrap();
    assert_eq!(users.count(json!({})).await.unwrap(), 1);
}

#[tokio::test]
async fn failing_post_remove_still_removes() {
    let (_, mut users) = open("users").await;
    users.post_fn(HookEvent::Remove, |_| async { Err("notify failed".into()) });
    users.create(json!([{ "n": 1 }, { "n": 2 }])).await.unwrap();

    let err = users.remove(json!({ "n": 1 })).await.unwrap_err();

    assert!(err.is_pipeline());
    assert_eq!(users.count(json!({})).await.unwrap(), 1);
}

#[tokio::test]
async fn pre_find_can_scope_queries() {
    let (_, mut posts) = open("posts").await;
    posts.pre_fn(HookEvent::Find, |query| async move {
        Ok(Some(json!({ "$and": [query, { "published": true }] })))
    });
    posts
        .create(json!([
            { "title": "a", "published": true },
            { "title": "b", "published": false },
        ]))
        .await
        .unwrap();

    let visible = posts.find(json!({})).await.unwrap().exec();

    assert_eq!(values(&visible, "title"), vec![json!("a")]);
}

#[tokio::test]
async fn hooks_belong_to_their_handle() {
    let (db, mut guarded) = open("users").await;
    guarded.pre_fn(HookEvent::Create, |_| async { Err("read only".into()) });

    let plain = db.collection("users").await.unwrap();
    plain.create(json!({ "n": 1 })).await.unwrap();

    assert!(guarded.create(json!({ "n": 2 })).await.unwrap_err().is_pipeline());
    assert_eq!(guarded.count(json!({})).await.unwrap(), 1);
}
