//! Refresh Pipeline
//!
//! A context refreshes derived data by running a [`Generator`], mapping its
//! model over the result and handing the outcome to a continuation. Failures
//! are logged and swallowed; the continuation only fires on success.

use crate::error::RefreshError;
use crate::source::DataSource;
use crate::types::{Continuation, ModelFn};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{error, warn};

pub type RefreshFuture = BoxFuture<'static, Result<Value, RefreshError>>;

/// Data-generating capability supplied by a context.
#[derive(Clone)]
pub struct Generator {
    produce: Arc<dyn Fn() -> RefreshFuture + Send + Sync>,
}

impl Generator {
    /// Wrap an async producer.
    pub fn new<F, Fut>(produce: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RefreshError>> + Send + 'static,
    {
        Self {
            produce: Arc::new(move || produce().boxed()),
        }
    }

    /// Wrap a synchronous producer; its result is delivered on the caller's stack.
    pub fn ready<F>(produce: F) -> Self
    where
        F: Fn() -> Result<Value, RefreshError> + Send + Sync + 'static,
    {
        Self::new(move || futures::future::ready(produce()))
    }

    /// Always yields a copy of `value`.
    pub fn value(value: Value) -> Self {
        Self::ready(move || Ok(value.clone()))
    }

    /// Bulk listing from a data source, as an array.
    pub fn all<S>(source: Arc<S>) -> Self
    where
        S: DataSource + ?Sized + 'static,
    {
        Self::new(move || {
            let source = source.clone();
            async move { source.all().await.map(Value::Array) }
        })
    }

    /// Single entity lookup from a data source.
    pub fn by_id<S>(source: Arc<S>, id: Value) -> Self
    where
        S: DataSource + ?Sized + 'static,
    {
        Self::new(move || {
            let source = source.clone();
            let id = id.clone();
            async move { source.by_id(&id).await }
        })
    }

    pub fn generate(&self) -> RefreshFuture {
        (self.produce)()
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Generator")
    }
}

/// Map `model` over sequences, apply it once to anything else.
pub fn apply_model(model: &ModelFn, data: Value) -> Value {
    match data {
        Value::Array(items) => Value::Array(items.into_iter().map(|item| model(item)).collect()),
        other => model(other),
    }
}

/// Run one refresh for `context`.
///
/// The generator's future is polled once in place; if it is already settled
/// the continuation runs synchronously. A pending future is handed to the
/// current tokio runtime. Without a runtime, a generator that stays pending
/// or needs runtime resources (timers, I/O) is logged as a failed refresh and
/// dropped. When `alive` is given and has been cleared by the time the future
/// settles, the result is discarded.
pub(crate) fn run_refresh(
    context: &str,
    generator: &Generator,
    model: ModelFn,
    and_then: Continuation,
    alive: Option<Arc<AtomicBool>>,
) {
    let mut pending = generator.generate();
    let mut cx = Context::from_waker(futures::task::noop_waker_ref());
    let runtime = tokio::runtime::Handle::try_current().ok();

    let polled = match &runtime {
        Some(handle) => {
            let _guard = handle.enter();
            pending.as_mut().poll(&mut cx)
        }
        None => match panic::catch_unwind(AssertUnwindSafe(|| pending.as_mut().poll(&mut cx))) {
            Ok(polled) => polled,
            Err(_) => {
                error!(
                    context = %context,
                    "Failed to refresh context integration point: generator requires a tokio runtime"
                );
                return;
            }
        },
    };

    match (polled, runtime) {
        (Poll::Ready(result), _) => settle(context, result, &model, &and_then, alive.as_deref()),
        (Poll::Pending, Some(handle)) => {
            let name = context.to_string();
            handle.spawn(async move {
                let result = pending.await;
                settle(&name, result, &model, &and_then, alive.as_deref());
            });
        }
        (Poll::Pending, None) => {
            error!(
                context = %context,
                "Refresh is pending but no tokio runtime is available; result dropped"
            );
        }
    }
}

fn settle(
    context: &str,
    result: Result<Value, RefreshError>,
    model: &ModelFn,
    and_then: &Continuation,
    alive: Option<&AtomicBool>,
) {
    match result {
        Ok(data) => {
            if alive.is_some_and(|alive| !alive.load(Ordering::SeqCst)) {
                warn!(context = %context, "Discarding refresh result for stopped subscription");
                return;
            }
            and_then(apply_model(model, data));
        }
        Err(err) => {
            error!(
                context = %context,
                error = %err,
                "Failed to refresh context integration point"
            );
        }
    }
}
