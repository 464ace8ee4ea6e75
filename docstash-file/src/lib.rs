//! File storage backend for docstash.
//!
//! Persists each database as a JSON file in a directory, so data survives process restarts.
//! Writes replace the file atomically via a temporary file and a rename.
//!
//! # Quick Start
//!
//! ```ignore
//! use docstash::{backend::KeyValueStoreBuilder, file::FileStore, store::Database};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = FileStore::builder("./data").build().await?;
//!     let db = Database::open("inventory", storage)?;
//!
//!     db.collection("items").await?.create(json!({ "sku": "A-1" })).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstash_file;

pub mod store;

pub use store::{FileStore, FileStoreBuilder};
