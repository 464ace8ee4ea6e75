//! An embedded JSON document store layered over a synchronous key/value backend.
//!
//! This crate is the core of the docstash project and provides:
//!
//! - **Documents** ([`document`]) - Schemaless JSON documents with reserved identity fields
//! - **Identifiers** ([`identifier`]) - Generation and validation of document identifiers
//! - **Queries** ([`query`], [`evaluator`]) - The MongoDB-style query language and its evaluator
//! - **Cursors** ([`cursor`]) - Sort, skip and limit over `find` results
//! - **Hooks** ([`hooks`]) - Sequential async pre/post handlers around collection operations
//! - **Storage** ([`backend`]) - The key/value abstraction a database is persisted in
//! - **Databases and collections** ([`store`], [`collection`]) - CRUD over named collections
//! - **Error handling** ([`error`]) - Error and result types shared by every crate
//!
//! # Example
//!
//! ```ignore
//! use docstash_core::{hooks::HookEvent, store::Database};
//! use serde_json::json;
//!
//! let db = Database::open("inventory", storage)?;
//! let mut items = db.collection("items").await?;
//!
//! items.pre_fn(HookEvent::Create, |data| async move { Ok(None) });
//! items.create(json!([{ "sku": "A-1", "qty": 4 }, { "sku": "B-2", "qty": 0 }])).await?;
//!
//! let in_stock = items.find(json!({ "qty": { "$gt": 0 } })).await?.exec();
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstash_core;

pub mod backend;
pub mod collection;
pub mod cursor;
pub mod document;
pub mod error;
pub mod evaluator;
pub mod hooks;
pub mod identifier;
pub mod query;
pub mod store;
