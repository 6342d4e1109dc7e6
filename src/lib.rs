//! # asyncq
//!
//! Async helpers built around a bounded-concurrency task queue.
//!
//! [`queue::TaskQueue`] processes submitted items through an async worker
//! with at most N in flight, lifecycle hooks, and explicit start/close
//! semantics. The smaller modules ([`sleep`], [`async_iter`], [`unique`],
//! [`strings`]) are thin helpers over tokio and futures.

pub mod async_iter;
pub mod config;
pub mod error;
pub mod queue;
pub mod sleep;
pub mod strings;
pub mod telemetry;
pub mod unique;

pub use error::{Error, Result};
pub use queue::{QueueHooks, TaskQueue};
