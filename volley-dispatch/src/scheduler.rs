//! Bounded-concurrency execution of independent async units.

use std::future::Future;

use tokio::task::JoinSet;
use tracing::error;

/// Run `task` over every item with at most `limit` units in flight.
///
/// Slots refill as units finish: the moment any unit completes, the next
/// pending item is spawned rather than waiting for the whole wave to drain.
/// Results are collected in completion order - callers needing an
/// association carry identity inside `R`.
///
/// Every unit runs to completion regardless of its neighbors' outcomes.
/// Units are expected to be infallible (dispatch units classify their own
/// failures into their result); a panicked unit is logged and its slot
/// refilled.
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, task: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let limit = limit.max(1);
    let mut results = Vec::with_capacity(items.len());
    let mut pending = items.into_iter();
    let mut units: JoinSet<R> = JoinSet::new();

    for item in pending.by_ref().take(limit) {
        units.spawn(task(item));
    }

    while let Some(joined) = units.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(join_error) => error!(error = %join_error, "Unit panicked"),
        }

        if let Some(item) = pending.next() {
            units.spawn(task(item));
        }
    }

    results
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;

    /// Tracks the high-water mark of concurrently running units.
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn all_items_complete() {
        let results = run_bounded((0..100).collect(), 7, |item: usize| async move { item * 2 }).await;

        assert_eq!(results.len(), 100);
        let mut sorted = results;
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).map(|item| item * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_limit() {
        let gauge = Arc::new(Gauge::default());

        let observer = Arc::clone(&gauge);
        run_bounded((0..40).collect(), 5, move |_: usize| {
            let gauge = Arc::clone(&observer);
            async move {
                gauge.enter();
                tokio::time::sleep(Duration::from_millis(10)).await;
                gauge.exit();
            }
        })
        .await;

        assert!(gauge.peak.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn zero_limit_is_clamped_to_one() {
        let results = run_bounded(vec![1, 2, 3], 0, |item: i32| async move { item }).await;
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let results = run_bounded(Vec::<u8>::new(), 4, |item: u8| async move { item }).await;
        assert!(results.is_empty());
    }
}
