//! Worker and lifecycle hook types.
//!
//! All callbacks are stored type-erased behind `Arc<dyn Fn ...>` returning a
//! boxed future, so a queue can clone them into every spawned unit of work.
//! Every hook is optional; an absent `on_error` means failures are surfaced
//! as unhandled instead of being reported to a hook.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt as _;
use futures_util::future::BoxFuture;

/// The per-item processing function.
pub type Worker<T, U> = Arc<dyn Fn(T) -> BoxFuture<'static, anyhow::Result<U>> + Send + Sync>;

/// Hook without arguments (`on_start`, `on_end`).
pub type LifecycleHook = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Hook receiving a worker's output.
pub type ProcessedHook<U> = Arc<dyn Fn(U) -> BoxFuture<'static, ()> + Send + Sync>;

/// Hook receiving the failed input and the worker's error.
pub type ErrorHook<T> = Arc<dyn Fn(T, anyhow::Error) -> BoxFuture<'static, ()> + Send + Sync>;

/// Erase an async closure into a [`Worker`].
pub fn worker<T, U, F, Fut>(f: F) -> Worker<T, U>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<U>> + Send + 'static,
{
    Arc::new(move |item| f(item).boxed())
}

/// The optional lifecycle callbacks of a queue.
pub struct QueueHooks<T, U> {
    pub on_start: Option<LifecycleHook>,
    pub on_item_processed: Option<ProcessedHook<U>>,
    pub on_end: Option<LifecycleHook>,
    pub on_error: Option<ErrorHook<T>>,
}

impl<T, U> QueueHooks<T, U> {
    pub fn new() -> Self {
        Self {
            on_start: None,
            on_item_processed: None,
            on_end: None,
            on_error: None,
        }
    }

    /// Called once per successful `start()`, after the initial admission pass.
    pub fn on_start<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_start = Some(Arc::new(move || f().boxed()));
        self
    }

    /// Called with every successful worker output.
    pub fn on_item_processed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(U) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_item_processed = Some(Arc::new(move |output| f(output).boxed()));
        self
    }

    /// Called each time the in-flight set drains to empty.
    pub fn on_end<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_end = Some(Arc::new(move || f().boxed()));
        self
    }

    /// Called with the input of every failed unit of work.
    pub fn on_error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(T, anyhow::Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_error = Some(Arc::new(move |item, error| f(item, error).boxed()));
        self
    }
}

impl<T, U> Default for QueueHooks<T, U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, U> Clone for QueueHooks<T, U> {
    fn clone(&self) -> Self {
        Self {
            on_start: self.on_start.clone(),
            on_item_processed: self.on_item_processed.clone(),
            on_end: self.on_end.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<T, U> fmt::Debug for QueueHooks<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueHooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_item_processed", &self.on_item_processed.is_some())
            .field("on_end", &self.on_end.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
