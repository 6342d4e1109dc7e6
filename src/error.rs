//! Error types for asyncq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("queue is already running")]
    AlreadyRunning,

    #[error("queue is already closed")]
    AlreadyClosed,

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("cannot reduce an empty sequence without an initial value")]
    ReduceWithoutInitialValue,

    /// Worker failures that happened while no `on_error` hook was installed.
    #[error("{} unit(s) of work failed with no error hook installed", .0.len())]
    Unhandled(Vec<crate::queue::WorkerFailure>),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
