//! Main docstash crate: an embedded JSON document store.
//!
//! This crate is the primary entry point for users of docstash. It re-exports the core types
//! and functionality and provides access to the bundled storage backends.
//!
//! # Features
//!
//! - **Schemaless documents** - Store any JSON object; identity and timestamps are managed for you
//! - **MongoDB-style queries** - `$gt`, `$in`, `$or`, `$not` and friends, plus a fluent cursor
//! - **Hooks** - Sequential async handlers that can inspect or replace data around every operation
//! - **Pluggable storage** - Anything that can get and set bytes by key can hold a database
//!
//! # Quick Start
//!
//! ```ignore
//! use docstash::{prelude::*, memory::MemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let db = Database::open("company", MemoryStore::new())?;
//!     let mut users = db.collection("users").await?;
//!
//!     // Reject documents without a name before they are stored
//!     users.pre_fn(HookEvent::Create, |data| async move {
//!         let named = data
//!             .as_array()
//!             .is_some_and(|docs| docs.iter().all(|doc| doc.get("name").is_some()));
//!
//!         if named { Ok(None) } else { Err("every user needs a name".into()) }
//!     });
//!
//!     users
//!         .create(json!([
//!             { "name": "Alice", "age": 30 },
//!             { "name": "Bob", "age": 17 },
//!         ]))
//!         .await?;
//!
//!     let adults = users
//!         .find(json!({ "age": { "$gte": 18 } }))
//!         .await?
//!         .sort_by("name")
//!         .order(SortDirection::Asc)
//!         .exec();
//!
//!     println!("Adults: {adults:?}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Typed Queries
//!
//! Queries can also be built without JSON literals:
//!
//! ```ignore
//! use docstash::prelude::*;
//!
//! let query = Filter::or([
//!     Filter::eq("role", "admin"),
//!     Filter::gte("age", 65),
//! ]);
//!
//! let matched = users.find(query).await?.exec();
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `file` - One JSON file per database in a directory (requires the `file` feature)

pub mod prelude;

pub use docstash_core::{
    backend, collection, cursor, document, error, evaluator, hooks, identifier, query, store,
};

// Re-exported so callers can build documents and queries without a direct dependency.
pub use serde_json;

/// In-memory storage backend.
pub mod memory {
    pub use docstash_memory::{MemoryStore, MemoryStoreBuilder};
}

/// File storage backend.
///
/// This module is only available when the `file` feature is enabled.
#[cfg(feature = "file")]
pub mod file {
    pub use docstash_file::{FileStore, FileStoreBuilder};
}
