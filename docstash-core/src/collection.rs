//! Collection handles and CRUD operations.
//!
//! A [`Collection`] is obtained from [`Database::collection`]. Every operation follows the same
//! shape:
//!
//! 1. run the `pre` hooks for the operation's event over its input,
//! 2. validate the (possibly replaced) input,
//! 3. load the collection from storage, match and mutate it, and persist it (writes hold the
//!    database lock for this step only),
//! 4. run the `post` hooks over the result and return what they produce.
//!
//! A `pre` hook failure aborts before anything is written. A `post` hook failure is reported
//! after the write has been persisted; the write is not rolled back.
//!
//! # Example
//!
//! ```ignore
//! use serde_json::json;
//!
//! let mut users = db.collection("users").await?;
//! users.pre_fn(HookEvent::Create, |data| async move { Ok(None) });
//!
//! let created = users.create(json!({ "name": "Alice", "age": 30 })).await?;
//! let id = created[0].id().unwrap();
//!
//! users.update_by_id(id, json!({ "age": 31 })).await?;
//! let adults = users.find(json!({ "age": { "$gte": 18 } })).await?.exec();
//! ```

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::{
    backend::KeyValueStore,
    cursor::Cursor,
    document::{Document, json_type_name},
    error::{DocumentStoreError, DocumentStoreResult},
    evaluator::Comparable,
    hooks::{Hook, HookEvent, HookPhase, HookPipeline, HookResult},
    identifier,
    query::Query,
    store::Database,
};

/// A handle to one collection of a [`Database`], with its own hook registrations.
#[derive(Debug)]
pub struct Collection<S: KeyValueStore> {
    name: String,
    database: Database<S>,
    hooks: HookPipeline,
}

impl<S: KeyValueStore> Collection<S> {
    /// Creates a new collection handle (internal use).
    pub(crate) fn new(name: String, database: Database<S>) -> Self {
        Self {
            name,
            database,
            hooks: HookPipeline::new(),
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the database this collection belongs to.
    pub fn database(&self) -> &Database<S> {
        &self.database
    }

    /// Returns the hooks registered on this handle.
    pub fn hooks(&self) -> &HookPipeline {
        &self.hooks
    }

    /// Registers a hook for `(phase, event)`.
    pub fn register(&mut self, phase: HookPhase, event: HookEvent, hook: impl Hook + 'static) -> &mut Self {
        self.hooks.register(phase, event, hook);
        self
    }

    /// Registers a hook that runs before `event`.
    pub fn pre(&mut self, event: HookEvent, hook: impl Hook + 'static) -> &mut Self {
        self.register(HookPhase::Pre, event, hook)
    }

    /// Registers a hook that runs after `event`.
    pub fn post(&mut self, event: HookEvent, hook: impl Hook + 'static) -> &mut Self {
        self.register(HookPhase::Post, event, hook)
    }

    /// Registers an async closure that runs before `event`.
    pub fn pre_fn<F, Fut>(&mut self, event: HookEvent, f: F) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.hooks.register_fn(HookPhase::Pre, event, f);
        self
    }

    /// Registers an async closure that runs after `event`.
    pub fn post_fn<F, Fut>(&mut self, event: HookEvent, f: F) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.hooks.register_fn(HookPhase::Post, event, f);
        self
    }

    /// Inserts one document (an object) or several (an array of objects).
    ///
    /// Each document gets a fresh `_id` and `createdAt`/`updatedAt` timestamps; an `_id`
    /// supplied by the caller is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if, after the `pre:create` hooks, there is no
    /// document or any element is not a non-empty object.
    pub async fn create(&self, data: impl Into<Value>) -> DocumentStoreResult<Vec<Document>> {
        let data = self
            .hooks
            .run(HookPhase::Pre, HookEvent::Create, as_sequence(data.into()))
            .await?;
        let documents = new_documents(data)?;

        let created = self
            .database
            .modify_collection(&self.name, move |stored| {
                let created = documents
                    .into_iter()
                    .map(|mut document| {
                        document.stamp_created(identifier::generate());
                        document
                    })
                    .collect::<Vec<_>>();

                stored.extend(created.iter().cloned());
                Ok((created, true))
            })
            .await?;

        debug!(target: "docstash::collection", collection = %self.name, count = created.len(), "Created documents");

        self.run_post(HookEvent::Create, created).await
    }

    /// Finds the document with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if the identifier (after the `pre:findById`
    /// hooks) is not a well-formed, currently valid identifier.
    pub async fn find_by_id(&self, id: &str) -> DocumentStoreResult<Option<Document>> {
        let id = self
            .hooks
            .run(HookPhase::Pre, HookEvent::FindById, Value::String(id.to_string()))
            .await?;
        let id = expect_id(&id)?;

        let found = self
            .database
            .read_collection(&self.name)?
            .into_iter()
            .find(|document| document.id() == Some(id.as_str()));

        debug!(target: "docstash::collection", collection = %self.name, %id, found = found.is_some(), "Find by id");

        self.run_post(HookEvent::FindById, found).await
    }

    /// Finds the first document, in insertion order, matching the query.
    pub async fn find_one(&self, query: impl Into<Value>) -> DocumentStoreResult<Option<Document>> {
        let query = self
            .hooks
            .run(HookPhase::Pre, HookEvent::FindOne, query.into())
            .await?;
        let query = Query::parse(&query)?;

        let found = self
            .database
            .read_collection(&self.name)?
            .into_iter()
            .find(|document| query.matches(document));

        debug!(target: "docstash::collection", collection = %self.name, found = found.is_some(), "Find one");

        self.run_post(HookEvent::FindOne, found).await
    }

    /// Finds every document matching the query and returns a [`Cursor`] over them.
    ///
    /// The `post:find` hooks see the matching documents before any sort, skip or limit is
    /// applied.
    pub async fn find(&self, query: impl Into<Value>) -> DocumentStoreResult<Cursor> {
        let query = self
            .hooks
            .run(HookPhase::Pre, HookEvent::Find, query.into())
            .await?;
        let query = Query::parse(&query)?;

        let results = self.filter(&query)?;

        debug!(target: "docstash::collection", collection = %self.name, count = results.len(), "Find");

        let results = self.run_post(HookEvent::Find, results).await?;

        Ok(Cursor::with_options(results, self.database.options()))
    }

    /// Shorthand for `find({})`.
    pub async fn find_all(&self) -> DocumentStoreResult<Cursor> {
        self.find(Value::Object(Map::new())).await
    }

    /// Shallow-merges `patch` into every document matching the query.
    ///
    /// `_id` and `createdAt` are never changed; `updatedAt` is refreshed on every updated
    /// document. Returns the updated documents.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if the patch is not a non-empty object or the
    /// query is malformed.
    pub async fn update(&self, query: impl Into<Value>, patch: impl Into<Value>) -> DocumentStoreResult<Vec<Document>> {
        let mut args = self
            .hooks
            .run(
                HookPhase::Pre,
                HookEvent::Update,
                json!({ "query": query.into(), "patch": patch.into() }),
            )
            .await?;
        let patch = expect_patch(take_arg(&mut args, "patch")?)?;
        let query = Query::parse(&take_arg(&mut args, "query")?)?;

        let updated = self
            .database
            .modify_collection(&self.name, |stored| {
                let mut updated = Vec::new();

                for document in stored.iter_mut().filter(|document| query.matches(document)) {
                    document.apply_patch(&patch);
                    updated.push(document.clone());
                }

                let changed = !updated.is_empty();
                Ok((updated, changed))
            })
            .await?;

        debug!(target: "docstash::collection", collection = %self.name, count = updated.len(), "Updated documents");

        self.run_post(HookEvent::Update, updated).await
    }

    /// Shallow-merges `patch` into the document with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] for a malformed identifier or patch, and
    /// [`DocumentStoreError::DocumentNotFound`] if no document has the identifier. Nothing is
    /// written in either case.
    pub async fn update_by_id(&self, id: &str, patch: impl Into<Value>) -> DocumentStoreResult<Document> {
        let mut args = self
            .hooks
            .run(
                HookPhase::Pre,
                HookEvent::UpdateById,
                json!({ "id": id, "patch": patch.into() }),
            )
            .await?;
        let patch = expect_patch(take_arg(&mut args, "patch")?)?;
        let id = expect_id(&take_arg(&mut args, "id")?)?;

        let updated = self
            .database
            .modify_collection(&self.name, |stored| {
                let document = stored
                    .iter_mut()
                    .find(|document| document.id() == Some(id.as_str()))
                    .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.clone(), self.name.clone()))?;

                document.apply_patch(&patch);
                Ok((document.clone(), true))
            })
            .await?;

        debug!(target: "docstash::collection", collection = %self.name, %id, "Updated document");

        self.run_post(HookEvent::UpdateById, updated).await
    }

    /// Removes every document matching the query and returns them.
    ///
    /// An empty array (`[]`) removes every document in the collection.
    pub async fn remove(&self, query: impl Into<Value>) -> DocumentStoreResult<Vec<Document>> {
        let query = self
            .hooks
            .run(HookPhase::Pre, HookEvent::Remove, query.into())
            .await?;
        let query = Query::parse(&query)?;

        let removed = self
            .database
            .modify_collection(&self.name, |stored| {
                let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(stored)
                    .into_iter()
                    .partition(|document| query.is_empty() || query.matches(document));

                *stored = kept;
                let changed = !removed.is_empty();
                Ok((removed, changed))
            })
            .await?;

        debug!(target: "docstash::collection", collection = %self.name, count = removed.len(), "Removed documents");

        self.run_post(HookEvent::Remove, removed).await
    }

    /// Removes the document with the given identifier and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] for a malformed identifier and
    /// [`DocumentStoreError::DocumentNotFound`] if no document has it.
    pub async fn remove_by_id(&self, id: &str) -> DocumentStoreResult<Document> {
        let id = self
            .hooks
            .run(HookPhase::Pre, HookEvent::RemoveById, Value::String(id.to_string()))
            .await?;
        let id = expect_id(&id)?;

        let removed = self
            .database
            .modify_collection(&self.name, |stored| {
                let position = stored
                    .iter()
                    .position(|document| document.id() == Some(id.as_str()))
                    .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.clone(), self.name.clone()))?;

                Ok((stored.remove(position), true))
            })
            .await?;

        debug!(target: "docstash::collection", collection = %self.name, %id, "Removed document");

        self.run_post(HookEvent::RemoveById, removed).await
    }

    /// Counts the documents matching the query. Does not run hooks.
    pub async fn count(&self, query: impl Into<Value>) -> DocumentStoreResult<usize> {
        let query = Query::parse(&query.into())?;
        Ok(self.filter(&query)?.len())
    }

    /// Returns `true` if any document matches the query. Does not run hooks.
    pub async fn exists(&self, query: impl Into<Value>) -> DocumentStoreResult<bool> {
        let query = Query::parse(&query.into())?;

        Ok(self
            .database
            .read_collection(&self.name)?
            .iter()
            .any(|document| query.matches(document)))
    }

    /// Returns the distinct values of `field`, in the order they are first seen.
    ///
    /// Documents without the field are skipped. Numbers are compared by value, so `1` and
    /// `1.0` count once. Does not run hooks.
    pub async fn distinct(&self, field: &str) -> DocumentStoreResult<Vec<Value>> {
        let documents = self.database.read_collection(&self.name)?;
        let mut values: Vec<Value> = Vec::new();

        for value in documents.iter().filter_map(|document| document.get(field)) {
            let candidate = Comparable::from(value);
            if !values.iter().any(|seen| Comparable::from(seen) == candidate) {
                values.push(value.clone());
            }
        }

        Ok(values)
    }

    fn filter(&self, query: &Query) -> DocumentStoreResult<Vec<Document>> {
        Ok(self
            .database
            .read_collection(&self.name)?
            .into_iter()
            .filter(|document| query.matches(document))
            .collect())
    }

    /// Runs the `post` hooks for `event` and converts their output back to the result type.
    async fn run_post<T>(&self, event: HookEvent, output: T) -> DocumentStoreResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        if self.hooks.handler_count(HookPhase::Post, event) == 0 {
            return Ok(output);
        }

        let value = self
            .hooks
            .run(HookPhase::Post, event, serde_json::to_value(&output)?)
            .await?;

        serde_json::from_value(value).map_err(|err| DocumentStoreError::Pipeline {
            phase: HookPhase::Post.to_string(),
            event: event.to_string(),
            source: format!("post hooks returned a value of the wrong shape: {err}").into(),
        })
    }
}

fn as_sequence(data: Value) -> Value {
    match data {
        Value::Array(items) => Value::Array(items),
        other => Value::Array(vec![other]),
    }
}

fn new_documents(data: Value) -> DocumentStoreResult<Vec<Document>> {
    let items = match data {
        Value::Array(items) => items,
        other => vec![other],
    };

    if items.is_empty() {
        return Err(DocumentStoreError::Validation(
            "Data must contain at least one document".to_string(),
        ));
    }

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) if !map.is_empty() => Ok(Document::from(map)),
            other => Err(DocumentStoreError::Validation(format!(
                "Data must be a non-empty object, found {}",
                describe(&other)
            ))),
        })
        .collect()
}

fn expect_id(value: &Value) -> DocumentStoreResult<String> {
    match value.as_str() {
        Some(id) if identifier::validate(id) => Ok(id.to_string()),
        Some(id) => Err(DocumentStoreError::Validation(format!("Invalid id {id:?}"))),
        None => Err(DocumentStoreError::Validation(format!(
            "Invalid id: expected a string, found {}",
            json_type_name(value)
        ))),
    }
}

fn expect_patch(value: Value) -> DocumentStoreResult<Map<String, Value>> {
    match value {
        Value::Object(map) if !map.is_empty() => Ok(map),
        other => Err(DocumentStoreError::Validation(format!(
            "Update data must be a non-empty object, found {}",
            describe(&other)
        ))),
    }
}

fn take_arg(args: &mut Value, key: &str) -> DocumentStoreResult<Value> {
    args.as_object_mut()
        .and_then(|map| map.remove(key))
        .ok_or_else(|| DocumentStoreError::Validation(format!("Missing {key:?} in operation arguments")))
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Object(map) if map.is_empty() => "an empty object",
        other => json_type_name(other),
    }
}
