//! Integration tests for the sleep, iteration, id and string helpers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use asyncq::async_iter::{self, Mode};
use asyncq::{Error, sleep, strings, unique};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// ---------------------------------------------------------------------------
// sleep
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sleep_waits_for_the_duration() {
    let started = Instant::now();
    sleep::sleep(ms(200)).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= ms(200));
    assert!(elapsed <= ms(300), "slept too long: {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn until_returns_once_condition_holds() {
    let polls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&polls);

    sleep::until(move || counter.fetch_add(1, Ordering::SeqCst) >= 3, ms(50)).await;

    assert_eq!(polls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn until_checks_immediately() {
    let started = tokio::time::Instant::now();
    sleep::until(|| true, ms(500)).await;
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn forever_never_completes() {
    let result = tokio::time::timeout(ms(10_000), sleep::forever()).await;
    assert!(result.is_err());
}

// ---------------------------------------------------------------------------
// async_iter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn parallel_for_each_runs_callbacks_together() {
    let started = Instant::now();
    async_iter::for_each(
        [300, 300, 300],
        |delay, _| sleep::sleep(ms(delay)),
        Mode::Parallel,
    )
    .await;

    assert!(started.elapsed() < ms(600));
}

#[tokio::test]
async fn sequential_for_each_runs_callbacks_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let started = Instant::now();
    async_iter::for_each(
        [100, 50, 10],
        |delay, index| {
            let seen = Arc::clone(&seen);
            async move {
                sleep::sleep(ms(delay)).await;
                seen.lock().unwrap().push(index);
            }
        },
        Mode::Sequential,
    )
    .await;

    assert!(started.elapsed() >= ms(160));
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn parallel_map_collects_in_completion_order() {
    let result = async_iter::map(
        [(500, 1), (300, 2), (100, 3)],
        |(delay, value), _| async move {
            sleep::sleep(ms(delay)).await;
            value
        },
        Mode::Parallel,
    )
    .await;

    assert_eq!(result, vec![3, 2, 1]);
}

#[tokio::test]
async fn sequential_map_preserves_input_order() {
    let result = async_iter::map(
        [(100, 1), (150, 2), (200, 3)],
        |(delay, value), _| async move {
            sleep::sleep(ms(delay)).await;
            value
        },
        Mode::Sequential,
    )
    .await;

    assert_eq!(result, vec![1, 2, 3]);
}

#[tokio::test]
async fn reduce_without_seed_starts_from_first_item() {
    let sum = async_iter::reduce([1, 2, 3, 4], |acc, n| async move { acc + n }, None).await;
    assert_eq!(sum.unwrap(), 10);
}

#[tokio::test]
async fn reduce_with_seed_includes_it() {
    let sum = async_iter::reduce([1, 2, 3], |acc, n| async move { acc + n }, Some(100)).await;
    assert_eq!(sum.unwrap(), 106);
}

#[tokio::test]
async fn reduce_empty_without_seed_fails() {
    let result = async_iter::reduce(Vec::<u32>::new(), |acc, n| async move { acc + n }, None).await;
    assert!(matches!(result, Err(Error::ReduceWithoutInitialValue)));
}

#[tokio::test]
async fn reduce_empty_with_seed_returns_seed() {
    let result = async_iter::reduce(Vec::<u32>::new(), |acc, n| async move { acc + n }, Some(5)).await;
    assert_eq!(result.unwrap(), 5);
}

#[tokio::test]
async fn fold_can_change_accumulator_type() {
    let joined = async_iter::fold(["a", "b", "c"], String::new(), |mut acc, s| async move {
        acc.push_str(s);
        acc
    })
    .await;
    assert_eq!(joined, "abc");
}

// ---------------------------------------------------------------------------
// unique / strings
// ---------------------------------------------------------------------------

#[test]
fn unique_ids_do_not_collide() {
    let ids: std::collections::HashSet<String> = (0..1000).map(|_| unique::id()).collect();
    assert_eq!(ids.len(), 1000);
    assert!(ids.iter().all(|id| id.len() == 36));
}

#[test]
fn whitespace_only_strings_are_empty() {
    assert!(strings::is_empty(""));
    assert!(strings::is_empty("  \t\n"));
    assert!(!strings::is_empty(" x "));
    assert!(strings::is_not_empty("x"));
    assert!(!strings::is_not_empty("   "));
}
