//! Bounded-concurrency task queue.
//!
//! Items are submitted to a [`TaskQueue`], wrapped into [`Entity`]s and moved
//! through two [`ObservedList`]s (queued, then in-flight) by the admission
//! and drain rules. At most `concurrency_limit` entities are in flight at
//! once.

pub mod entity;
pub mod hooks;
pub mod list;
mod machine;
pub mod task_queue;

pub use entity::{Entity, EntityId};
pub use hooks::{QueueHooks, Worker};
pub use list::ObservedList;
pub use task_queue::{TaskQueue, TaskQueueBuilder, WorkerFailure};
