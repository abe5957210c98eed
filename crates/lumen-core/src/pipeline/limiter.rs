//! Bounded-concurrency scheduling for batch work.
//!
//! Pull-based: runners share a next-index counter and each claims the next
//! unclaimed item as soon as it finishes its current one. Completion order
//! is unconstrained; the returned results are always in submission order.

use futures_util::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Run `worker` over `items` with at most `limit` operations in flight.
///
/// Returns one result per item, in input order, regardless of completion
/// order. `limit == 0` or an empty input yields an empty result list with
/// no runners started.
///
/// The limiter does not catch worker failures; workers that can fail must
/// return their failure as a value (the encoding pipeline always does).
pub async fn run_limited<T, R, F, Fut>(items: &[T], limit: usize, worker: F) -> Vec<R>
where
    F: Fn(&T, usize) -> Fut,
    Fut: Future<Output = R>,
{
    if limit == 0 || items.is_empty() {
        return Vec::new();
    }

    let next_index = AtomicUsize::new(0);
    let worker = &worker;
    let next = &next_index;

    let runners = (0..limit.min(items.len())).map(|_| async move {
        let mut completed = Vec::new();
        loop {
            let index = next.fetch_add(1, Ordering::Relaxed);
            if index >= items.len() {
                break;
            }
            let result = worker(&items[index], index).await;
            completed.push((index, result));
        }
        completed
    });

    // Scatter results back into submission-order slots.
    let mut indexed: Vec<(usize, R)> = join_all(runners).await.into_iter().flatten().collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, result)| result).collect()
}
