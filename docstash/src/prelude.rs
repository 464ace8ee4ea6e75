//! Convenient re-exports of commonly used types from docstash.
//!
//! ```ignore
//! use docstash::prelude::*;
//! ```
//!
//! This provides access to:
//! - Databases, collections and cursors
//! - Documents
//! - Queries and the `Filter` builder
//! - Hooks
//! - Storage traits and error types

pub use docstash_core::{
    backend::{DynKeyValueStore, KeyLocks, KeyValueStore, KeyValueStoreBuilder},
    collection::Collection,
    cursor::Cursor,
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    hooks::{Hook, HookEvent, HookPhase, HookResult},
    query::{Condition, Filter, Query, SortDirection},
    store::{Database, DatabaseBuilder, DatabaseInfo, DatabaseOptions},
};
