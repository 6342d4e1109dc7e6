//! The bounded-concurrency task queue runtime.
//!
//! A [`TaskQueue`] keeps two [`ObservedList`](super::list::ObservedList)s:
//! entities waiting for a slot and entities being processed. Every mutation
//! goes through [`QueueState::step`], and the effects it yields (spawn a
//! worker, close, fire `on_end`) run on the tokio runtime captured by
//! `start()`.

use std::any::Any;
use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use futures_util::FutureExt as _;
use futures_util::future::join_all;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

use super::entity::{Entity, EntityId};
use super::hooks::{self, QueueHooks, Worker};
use super::machine::{Effect, QueueState};
use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::sleep;
use crate::telemetry::metrics;
use crate::telemetry::queue::{record_lifecycle, record_outcome, start_item_span};

/// A unit of work that failed while no `on_error` hook was installed.
#[derive(Debug)]
pub struct WorkerFailure {
    pub entity: EntityId,
    pub error: anyhow::Error,
}

/// Bounded-concurrency queue feeding items through an async worker.
///
/// Cloning is cheap; clones share the same queue.
pub struct TaskQueue<T, U> {
    shared: Arc<Shared<T, U>>,
}

impl<T, U> Clone for TaskQueue<T, U> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<T, U> {
    state: Mutex<QueueState<T>>,
    config: QueueConfig,
    worker: Worker<T, U>,
    hooks: QueueHooks<T, U>,
    unhandled: Mutex<Vec<WorkerFailure>>,
    runtime: Mutex<Option<Handle>>,
}

/// What a close attempt found when it looked at the queue.
enum CloseCheck {
    /// Nothing in flight for the expected run.
    Drained,
    Busy,
    /// The run this check belongs to is already over.
    Stale,
}

impl<T, U> TaskQueue<T, U>
where
    T: Clone + Send + 'static,
    U: Send + 'static,
{
    /// Start building a queue around `worker`.
    pub fn builder<F, Fut>(worker: F) -> TaskQueueBuilder<T, U>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<U>> + Send + 'static,
    {
        TaskQueueBuilder::new(hooks::worker(worker))
    }

    /// Create a queue from already-assembled parts.
    pub fn new(worker: Worker<T, U>, config: QueueConfig, hooks: QueueHooks<T, U>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::new()),
                config,
                worker,
                hooks,
                unhandled: Mutex::new(Vec::new()),
                runtime: Mutex::new(None),
            }),
        }
    }

    /// Queue items for processing. Allowed in any state.
    ///
    /// Each item gets its own id. While running, items are admitted as soon
    /// as a slot is free; before `start()` they wait.
    pub fn submit(&self, items: impl IntoIterator<Item = T>) {
        let (count, effects) = self.shared.step(|state| {
            let mut count = 0u64;
            for item in items {
                state.queued.append(Entity::new(item));
                count += 1;
            }
            count
        });
        debug!(count, "items submitted");
        metrics::items_submitted().add(count, &[]);
        self.shared.spawn_effects(effects);
    }

    /// Start processing.
    ///
    /// Dispatches everything admitted while the queue was idle and waits for
    /// those units of work to settle, then fires `on_start`. Without
    /// keep-alive, a background idle check closes the queue once nothing is
    /// in flight.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRunning`] if the queue is running; nothing changes.
    pub async fn start(&self) -> Result<()> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Other(format!("start() needs a tokio runtime: {e}")))?;

        let (epoch, initial) = {
            let mut state = self.shared.lock_state();
            if state.running {
                return Err(Error::AlreadyRunning);
            }
            *self.shared.lock_runtime() = Some(runtime);
            state.running = true;
            state.epoch += 1;
            (state.epoch, state.in_flight.snapshot())
        };
        record_lifecycle("idle", "running", epoch);

        let pending: Vec<JoinHandle<()>> = initial
            .into_iter()
            .filter_map(|entity| self.shared.spawn_dispatch(entity))
            .collect();
        info!(epoch, initial = pending.len(), "queue started");
        for joined in join_all(pending).await {
            if let Err(e) = joined {
                warn!(error = %e, "initial unit of work did not complete");
            }
        }

        if let Some(hook) = &self.shared.hooks.on_start {
            guarded("on_start", hook()).await;
        }

        if !self.shared.config.keep_alive {
            self.spawn_idle_check(epoch);
        }
        Ok(())
    }

    /// Close the queue once in-flight work has finished.
    ///
    /// Waits without a timeout: a worker that never settles keeps this
    /// pending forever.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyClosed`] if the queue is not running, or
    /// [`Error::Unhandled`] with the failures recorded while no `on_error`
    /// hook was installed. The queue is closed in the latter case.
    pub async fn close(&self) -> Result<()> {
        let epoch = {
            let state = self.shared.lock_state();
            if !state.running {
                return Err(Error::AlreadyClosed);
            }
            state.epoch
        };
        self.shared.close_run(epoch).await;
        self.shared.surface_unhandled()
    }

    /// Wait until the queue is no longer running, however it gets closed.
    ///
    /// Returns immediately for an idle queue. Surfaces unhandled failures
    /// like [`close`](Self::close).
    pub async fn closed(&self) -> Result<()> {
        sleep::until(|| !self.is_running(), self.shared.config.drain_poll_interval).await;
        self.shared.surface_unhandled()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock_state().running
    }

    /// Drain the recorded unhandled failures.
    pub fn take_unhandled(&self) -> Vec<WorkerFailure> {
        std::mem::take(&mut *self.shared.lock_unhandled())
    }

    /// Entities waiting for a slot, oldest first.
    pub fn queued(&self) -> Vec<Entity<T>> {
        self.shared.lock_state().queued.snapshot()
    }

    /// Entities currently admitted, in admission order.
    pub fn in_flight(&self) -> Vec<Entity<T>> {
        self.shared.lock_state().in_flight.snapshot()
    }

    pub fn queued_len(&self) -> usize {
        self.shared.lock_state().queued.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.shared.lock_state().in_flight.len()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    fn spawn_idle_check(&self, epoch: u64) {
        let weak: Weak<Shared<T, U>> = Arc::downgrade(&self.shared);
        let interval = self.shared.config.idle_check_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                match shared.idle_status(epoch) {
                    CloseCheck::Stale => return,
                    CloseCheck::Busy => continue,
                    CloseCheck::Drained => {
                        debug!(epoch, "idle check found nothing in flight");
                        shared.close_run(epoch).await;
                        return;
                    }
                }
            }
        });
    }
}

impl<T, U> Shared<T, U>
where
    T: Clone + Send + 'static,
    U: Send + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_unhandled(&self) -> MutexGuard<'_, Vec<WorkerFailure>> {
        self.unhandled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_runtime(&self) -> MutexGuard<'_, Option<Handle>> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn step<R>(&self, mutation: impl FnOnce(&mut QueueState<T>) -> R) -> (R, Vec<Effect<T>>) {
        self.lock_state().step(&self.config, mutation)
    }

    fn spawn_effects(self: &Arc<Self>, effects: Vec<Effect<T>>) {
        if effects.is_empty() {
            return;
        }
        match self.lock_runtime().clone() {
            Some(runtime) => {
                runtime.spawn(Arc::clone(self).apply(effects));
            }
            None => warn!(count = effects.len(), "no runtime captured, dropping effects"),
        }
    }

    fn spawn_dispatch(self: &Arc<Self>, entity: Entity<T>) -> Option<JoinHandle<()>> {
        let Some(runtime) = self.lock_runtime().clone() else {
            error!(id = %entity.id(), "no runtime captured, entity stays in flight");
            return None;
        };
        Some(runtime.spawn(Arc::clone(self).process(entity)))
    }

    async fn apply(self: Arc<Self>, effects: Vec<Effect<T>>) {
        for effect in effects {
            match effect {
                Effect::Dispatch(entity) => {
                    self.spawn_dispatch(entity);
                }
                Effect::Close { epoch } => {
                    self.close_run(epoch).await;
                }
                Effect::End => {
                    info!("queue drained");
                    if let Some(hook) = &self.hooks.on_end {
                        guarded("on_end", hook()).await;
                    }
                }
            }
        }
    }

    /// Run one unit of work and release its slot.
    async fn process(self: Arc<Self>, entity: Entity<T>) {
        let span = start_item_span(entity.id());
        let item_span = span.clone();
        async move {
            let started = Instant::now();
            let worker = Arc::clone(&self.worker);
            let input = entity.data().clone();
            let outcome = AssertUnwindSafe(async move { worker(input).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(anyhow::anyhow!("worker panicked: {}", panic_message(&*panic)))
                });
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Ok(output) => {
                    record_outcome(&item_span, "processed", duration_ms);
                    if let Some(hook) = &self.hooks.on_item_processed {
                        guarded("on_item_processed", hook(output)).await;
                    }
                }
                Err(error) => {
                    record_outcome(&item_span, "failed", duration_ms);
                    match &self.hooks.on_error {
                        Some(hook) => {
                            warn!(error = %error, "unit of work failed");
                            let input = entity.data().clone();
                            guarded("on_error", hook(input, error)).await;
                        }
                        None => {
                            error!(error = %error, "unit of work failed with no error hook");
                            self.lock_unhandled().push(WorkerFailure {
                                entity: entity.id().clone(),
                                error,
                            });
                        }
                    }
                }
            }
            metrics::item_duration_ms().record(duration_ms, &[]);

            let (released, effects) = self.step(|state| state.release(entity.id()));
            if released.is_none() {
                warn!("settled entity was no longer in flight");
            }
            self.apply(effects).await;
        }
        .instrument(span)
        .await
    }

    fn idle_status(&self, epoch: u64) -> CloseCheck {
        let state = self.lock_state();
        if !state.running || state.epoch != epoch {
            CloseCheck::Stale
        } else if state.in_flight.is_empty() {
            CloseCheck::Drained
        } else {
            CloseCheck::Busy
        }
    }

    /// Flip `running` off if in-flight is empty, in one critical section.
    fn try_finish_close(&self, epoch: u64) -> CloseCheck {
        let mut state = self.lock_state();
        if !state.running || state.epoch != epoch {
            return CloseCheck::Stale;
        }
        if !state.in_flight.is_empty() {
            return CloseCheck::Busy;
        }
        state.running = false;
        CloseCheck::Drained
    }

    /// Close protocol for run `epoch`. A no-op once that run is over.
    async fn close_run(&self, epoch: u64) {
        loop {
            sleep::until(
                || self.lock_state().in_flight.is_empty(),
                self.config.drain_poll_interval,
            )
            .await;
            match self.try_finish_close(epoch) {
                CloseCheck::Drained => {
                    info!(epoch, "queue closed");
                    record_lifecycle("running", "idle", epoch);
                    return;
                }
                CloseCheck::Stale => return,
                CloseCheck::Busy => continue,
            }
        }
    }

    fn surface_unhandled(&self) -> Result<()> {
        let failures = std::mem::take(&mut *self.lock_unhandled());
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Unhandled(failures))
        }
    }
}

/// Await a hook, logging instead of unwinding if it panics.
async fn guarded(name: &'static str, hook: impl Future<Output = ()>) {
    if let Err(panic) = AssertUnwindSafe(hook).catch_unwind().await {
        error!(hook = name, panic = %panic_message(&*panic), "hook panicked");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Builder for [`TaskQueue`].
pub struct TaskQueueBuilder<T, U> {
    worker: Worker<T, U>,
    config: QueueConfig,
    concurrency_limit: usize,
    hooks: QueueHooks<T, U>,
}

impl<T, U> TaskQueueBuilder<T, U>
where
    T: Clone + Send + 'static,
    U: Send + 'static,
{
    pub fn new(worker: Worker<T, U>) -> Self {
        let config = QueueConfig::default();
        Self {
            worker,
            concurrency_limit: config.concurrency_limit.get(),
            config,
            hooks: QueueHooks::new(),
        }
    }

    /// Replace every tuning value with `config`.
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.concurrency_limit = config.concurrency_limit.get();
        self.config = config;
        self
    }

    /// Maximum simultaneous units of work. Must be at least 1.
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    pub fn idle_check_interval(mut self, interval: Duration) -> Self {
        self.config.idle_check_interval = interval;
        self
    }

    pub fn drain_poll_interval(mut self, interval: Duration) -> Self {
        self.config.drain_poll_interval = interval;
        self
    }

    /// Replace every hook with `hooks`.
    pub fn hooks(mut self, hooks: QueueHooks<T, U>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn on_start<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks = self.hooks.on_start(f);
        self
    }

    pub fn on_item_processed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(U) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks = self.hooks.on_item_processed(f);
        self
    }

    pub fn on_end<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks = self.hooks.on_end(f);
        self
    }

    pub fn on_error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(T, anyhow::Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks = self.hooks.on_error(f);
        self
    }

    /// # Errors
    ///
    /// [`Error::Config`] if the concurrency limit is 0.
    pub fn build(self) -> Result<TaskQueue<T, U>> {
        let concurrency_limit = NonZeroUsize::new(self.concurrency_limit)
            .ok_or_else(|| Error::Config("concurrency limit must be at least 1".to_string()))?;
        let config = QueueConfig {
            concurrency_limit,
            ..self.config
        };
        Ok(TaskQueue::new(self.worker, config, self.hooks))
    }
}
