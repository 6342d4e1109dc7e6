//! Iteration helpers that accept asynchronous callbacks.
//!
//! Each helper takes an owned sequence plus a callback returning a future,
//! and runs the callbacks either all at once ([`Mode::Parallel`]) or one
//! after another ([`Mode::Sequential`]).

use std::future::Future;

use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::error::{Error, Result};

/// How callbacks are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Start every callback immediately and wait for all of them.
    #[default]
    Parallel,
    /// Await each callback before starting the next.
    Sequential,
}

/// Call `f(item, index)` for every item.
pub async fn for_each<T, F, Fut>(items: impl IntoIterator<Item = T>, mut f: F, mode: Mode)
where
    F: FnMut(T, usize) -> Fut,
    Fut: Future<Output = ()>,
{
    match mode {
        Mode::Parallel => {
            let pending: Vec<Fut> = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| f(item, index))
                .collect();
            join_all(pending).await;
        }
        Mode::Sequential => {
            for (index, item) in items.into_iter().enumerate() {
                f(item, index).await;
            }
        }
    }
}

/// Map every item through `f(item, index)`.
///
/// Sequential mapping preserves input order. Parallel mapping collects
/// results as they complete, so faster callbacks come first.
pub async fn map<T, U, F, Fut>(items: impl IntoIterator<Item = T>, mut f: F, mode: Mode) -> Vec<U>
where
    F: FnMut(T, usize) -> Fut,
    Fut: Future<Output = U>,
{
    match mode {
        Mode::Parallel => {
            let pending: FuturesUnordered<Fut> = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| f(item, index))
                .collect();
            pending.collect().await
        }
        Mode::Sequential => {
            let mut out = Vec::new();
            for (index, item) in items.into_iter().enumerate() {
                out.push(f(item, index).await);
            }
            out
        }
    }
}

/// Left fold with an optional seed.
///
/// Without a seed the first item becomes the accumulator. An empty sequence
/// with no seed fails with [`Error::ReduceWithoutInitialValue`].
pub async fn reduce<T, F, Fut>(
    items: impl IntoIterator<Item = T>,
    f: F,
    seed: Option<T>,
) -> Result<T>
where
    F: FnMut(T, T) -> Fut,
    Fut: Future<Output = T>,
{
    let mut iter = items.into_iter();
    let acc = match seed {
        Some(seed) => seed,
        None => iter.next().ok_or(Error::ReduceWithoutInitialValue)?,
    };
    Ok(fold(iter, acc, f).await)
}

/// Left fold where the accumulator may differ in type from the items.
pub async fn fold<T, A, F, Fut>(items: impl IntoIterator<Item = T>, seed: A, mut f: F) -> A
where
    F: FnMut(A, T) -> Fut,
    Fut: Future<Output = A>,
{
    let mut acc = seed;
    for item in items {
        acc = f(acc, item).await;
    }
    acc
}
