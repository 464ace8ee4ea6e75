//! Pre/post hook pipeline around collection operations.
//!
//! Each collection handle owns a [`HookPipeline`]: for every [`HookPhase`] and [`HookEvent`]
//! an ordered list of [`Hook`]s. Before an operation the `pre` handlers for its event can
//! inspect or replace the operation's input; afterwards the `post` handlers can inspect or
//! replace its result.
//!
//! Handlers run one at a time, in registration order. Each one receives the current data and
//! returns:
//!
//! - `Ok(Some(value))` to replace the data passed to the next handler,
//! - `Ok(None)` to pass the data on unchanged,
//! - `Err(error)` to abort the chain; the operation fails with
//!   [`DocumentStoreError::Pipeline`].
//!
//! There is no timeout. A handler whose future never completes stalls the operation that
//! triggered it; keeping handlers well-behaved is the caller's responsibility.
//!
//! # Example
//!
//! ```ignore
//! use docstash::hooks::HookEvent;
//!
//! users.pre_fn(HookEvent::Create, |data| async move {
//!     if data.as_array().is_some_and(|docs| docs.len() > 100) {
//!         return Err("batch too large".into());
//!     }
//!     Ok(None)
//! });
//! ```

use std::{collections::HashMap, fmt, future::Future, str::FromStr, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{BoxError, DocumentStoreError, DocumentStoreResult};

/// Result returned by a hook handler.
pub type HookResult = Result<Option<Value>, BoxError>;

/// When a handler runs relative to its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    /// Before the operation validates its input.
    Pre,
    /// After the operation has completed (and persisted, for writes).
    Post,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::Pre => "pre",
            HookPhase::Post => "post",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookPhase {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> DocumentStoreResult<Self> {
        match s {
            "pre" => Ok(HookPhase::Pre),
            "post" => Ok(HookPhase::Post),
            other => Err(DocumentStoreError::Validation(format!("Unknown hook phase {other:?}"))),
        }
    }
}

/// The collection operations hooks can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    Create,
    FindById,
    FindOne,
    Find,
    Update,
    UpdateById,
    Remove,
    RemoveById,
}

impl HookEvent {
    /// Every event, in a fixed order.
    pub const ALL: [HookEvent; 8] = [
        HookEvent::Create,
        HookEvent::FindById,
        HookEvent::FindOne,
        HookEvent::Find,
        HookEvent::Update,
        HookEvent::UpdateById,
        HookEvent::Remove,
        HookEvent::RemoveById,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::Create => "create",
            HookEvent::FindById => "findById",
            HookEvent::FindOne => "findOne",
            HookEvent::Find => "find",
            HookEvent::Update => "update",
            HookEvent::UpdateById => "updateById",
            HookEvent::Remove => "remove",
            HookEvent::RemoveById => "removeById",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookEvent {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> DocumentStoreResult<Self> {
        HookEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| DocumentStoreError::Validation(format!("Unknown hook event {s:?}")))
    }
}

/// A single step in a hook chain.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Handles the current data, returning a replacement, nothing, or an error.
    async fn handle(&self, data: Value) -> HookResult;
}

/// Adapter turning an async closure into a [`Hook`].
struct FnHook<F>(F);

#[async_trait]
impl<F, Fut> Hook for FnHook<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    async fn handle(&self, data: Value) -> HookResult {
        (self.0)(data).await
    }
}

type HookChain = Vec<Arc<dyn Hook>>;

/// Registered handlers for one collection handle.
#[derive(Default, Clone)]
pub struct HookPipeline {
    chains: HashMap<(HookPhase, HookEvent), HookChain>,
}

impl HookPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler to the chain for `(phase, event)`.
    pub fn register(&mut self, phase: HookPhase, event: HookEvent, hook: impl Hook + 'static) {
        self.chains
            .entry((phase, event))
            .or_default()
            .push(Arc::new(hook));
    }

    /// Appends an async closure to the chain for `(phase, event)`.
    pub fn register_fn<F, Fut>(&mut self, phase: HookPhase, event: HookEvent, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.register(phase, event, FnHook(f));
    }

    /// Number of handlers registered for `(phase, event)`.
    pub fn handler_count(&self, phase: HookPhase, event: HookEvent) -> usize {
        self.chains
            .get(&(phase, event))
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Runs the chain for `(phase, event)` over `data`.
    ///
    /// Handlers are awaited strictly one after another. The first error aborts the remaining
    /// handlers. With no handlers registered, `data` is returned as is.
    pub async fn run(&self, phase: HookPhase, event: HookEvent, data: Value) -> DocumentStoreResult<Value> {
        let Some(chain) = self.chains.get(&(phase, event)) else {
            return Ok(data);
        };

        debug!(target: "docstash::hooks", %phase, %event, handlers = chain.len(), "Running hook chain");

        let mut current = data;

        for (index, hook) in chain.iter().enumerate() {
            match hook.handle(current.clone()).await {
                Ok(Some(replacement)) => current = replacement,
                Ok(None) => {}
                Err(source) => {
                    warn!(target: "docstash::hooks", %phase, %event, index, error = %source, "Hook aborted the chain");
                    return Err(DocumentStoreError::Pipeline {
                        phase: phase.to_string(),
                        event: event.to_string(),
                        source,
                    });
                }
            }
        }

        Ok(current)
    }
}

impl fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for ((phase, event), chain) in &self.chains {
            map.entry(&format_args!("{phase}:{event}"), &chain.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Append(&'static str);

    #[async_trait]
    impl Hook for Append {
        async fn handle(&self, data: Value) -> HookResult {
            let mut items = data.as_array().cloned().unwrap_or_default();
            items.push(json!(self.0));
            Ok(Some(Value::Array(items)))
        }
    }

    #[tokio::test]
    async fn empty_chain_returns_input() {
        let pipeline = HookPipeline::new();

        let out = pipeline.run(HookPhase::Pre, HookEvent::Find, json!({ "a": 1 })).await.unwrap();
        assert_eq!(out, json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn handlers_run_in_registration_order() {
        let mut pipeline = HookPipeline::new();
        pipeline.register(HookPhase::Post, HookEvent::Create, Append("first"));
        pipeline.register(HookPhase::Post, HookEvent::Create, Append("second"));

        let out = pipeline.run(HookPhase::Post, HookEvent::Create, json!([])).await.unwrap();
        assert_eq!(out, json!(["first", "second"]));

        // Other phases and events are untouched.
        let out = pipeline.run(HookPhase::Pre, HookEvent::Create, json!([])).await.unwrap();
        assert_eq!(out, json!([]));
    }

    #[tokio::test]
    async fn none_passes_previous_value() {
        let mut pipeline = HookPipeline::new();
        pipeline.register(HookPhase::Pre, HookEvent::Update, Append("x"));
        pipeline.register_fn(HookPhase::Pre, HookEvent::Update, |_| async { Ok(None) });

        let out = pipeline.run(HookPhase::Pre, HookEvent::Update, json!([])).await.unwrap();
        assert_eq!(out, json!(["x"]));
    }

    #[tokio::test]
    async fn errors_abort_the_remaining_chain() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = HookPipeline::new();

        let log = seen.clone();
        pipeline.register_fn(HookPhase::Pre, HookEvent::Remove, move |_| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(1);
                Err("denied".into())
            }
        });
        let log = seen.clone();
        pipeline.register_fn(HookPhase::Pre, HookEvent::Remove, move |_| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(2);
                Ok(None)
            }
        });

        let err = pipeline
            .run(HookPhase::Pre, HookEvent::Remove, json!({}))
            .await
            .unwrap_err();

        match err {
            DocumentStoreError::Pipeline { phase, event, source } => {
                assert_eq!(phase, "pre");
                assert_eq!(event, "remove");
                assert_eq!(source.to_string(), "denied");
            }
            other => panic!("expected a pipeline error, got {other:?}"),
        }
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn handlers_never_overlap() {
        let active = Arc::new(Mutex::new((0usize, 0usize)));
        let mut pipeline = HookPipeline::new();

        for _ in 0..3 {
            let active = active.clone();
            pipeline.register_fn(HookPhase::Pre, HookEvent::Find, move |_| {
                let active = active.clone();
                async move {
                    {
                        let mut guard = active.lock().unwrap();
                        guard.0 += 1;
                        guard.1 = guard.1.max(guard.0);
                    }
                    tokio::task::yield_now().await;
                    active.lock().unwrap().0 -= 1;
                    Ok(None)
                }
            });
        }

        pipeline.run(HookPhase::Pre, HookEvent::Find, json!({})).await.unwrap();
        assert_eq!(active.lock().unwrap().1, 1);
    }

    #[test]
    fn event_names_round_trip() {
        for event in HookEvent::ALL {
            assert_eq!(event.as_str().parse::<HookEvent>().unwrap(), event);
        }
        assert_eq!("findById".parse::<HookEvent>().unwrap(), HookEvent::FindById);
        assert!("insert".parse::<HookEvent>().is_err());
        assert_eq!("post".parse::<HookPhase>().unwrap(), HookPhase::Post);
    }
}
