//! In-memory storage backend for docstash.
//!
//! This crate provides a thread-safe, in-memory implementation of the `KeyValueStore` trait.
//! Database snapshots live in a `HashMap` behind a read-write lock, which makes the backend a
//! good fit for development, tests and short-lived data.
//!
//! # Quick Start
//!
//! ```ignore
//! use docstash::{memory::MemoryStore, store::Database};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::open("inventory", MemoryStore::new())?;
//!     let items = db.collection("items").await?;
//!
//!     items.create(json!({ "sku": "A-1", "qty": 4 })).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstash_memory;

pub mod store;

pub use store::{MemoryStore, MemoryStoreBuilder};
