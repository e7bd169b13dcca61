//! Wave-based batch fetching: many independent requests under a hard cap on
//! concurrent outbound load.
//!
//! Items are partitioned into sequential waves of at most `batch_size`
//! requests. A wave's requests run concurrently and the next wave starts
//! only after every request in the current one has settled. Failures are
//! dropped; only fulfilled results are aggregated, so a single bad request
//! never aborts the rest of the batch.

use std::future::Future;

use futures_util::future::join_all;
use tracing::debug;

use crate::api::FetchError;

#[derive(Debug, Clone)]
pub struct BatchFetcher {
    batch_size: usize,
}

impl BatchFetcher {
    pub fn new(batch_size: usize) -> Self {
        BatchFetcher {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Fetch all items in ⌈N / batch_size⌉ sequential waves and aggregate
    /// the fulfilled results in completion order.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, fetch: F) -> Vec<T>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut fetched = Vec::new();
        let mut remaining = items.into_iter();
        loop {
            let wave: Vec<I> = remaining.by_ref().take(self.batch_size).collect();
            if wave.is_empty() {
                break;
            }
            let settled = join_all(wave.into_iter().map(|item| fetch(item))).await;
            for result in settled {
                match result {
                    Ok(value) => fetched.push(value),
                    Err(e) => debug!("batch request dropped: {}", e),
                }
            }
        }
        fetched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_batch_size() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let fetcher = BatchFetcher::new(2);

        let results = fetcher
            .run((0..5).collect::<Vec<u32>>(), |n| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(n * 10)
                }
            })
            .await;

        assert_eq!(results, vec![0, 10, 20, 30, 40]);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_waves() {
        // With a 10ms request and batch size 2, five items start at
        // 0ms/0ms, 10ms/10ms and 20ms — exactly ⌈5/2⌉ waves.
        let starts = Arc::new(Mutex::new(Vec::new()));
        let origin = Instant::now();
        let fetcher = BatchFetcher::new(2);

        fetcher
            .run((0..5).collect::<Vec<u32>>(), |n| {
                let starts = Arc::clone(&starts);
                async move {
                    starts.lock().unwrap().push(origin.elapsed().as_millis() as u64);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(n)
                }
            })
            .await;

        let starts = starts.lock().unwrap().clone();
        assert_eq!(starts, vec![0, 0, 10, 10, 20]);
    }

    #[tokio::test]
    async fn test_failures_are_dropped_without_aborting_the_batch() {
        let fetcher = BatchFetcher::new(2);
        let results = fetcher
            .run(vec!["a", "b", "c", "d"], |id| async move {
                if id == "b" {
                    Err(FetchError::Network("connection reset".into()))
                } else {
                    Ok(id.to_uppercase())
                }
            })
            .await;
        assert_eq!(results, vec!["A", "C", "D"]);
    }

    #[tokio::test]
    async fn test_results_carry_their_group() {
        let fetcher = BatchFetcher::new(3);
        let results = fetcher
            .run(vec!["epl", "laliga"], |league| async move {
                Ok((league, vec![format!("{}-match", league)]))
            })
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "epl");
        assert_eq!(results[1].1, vec!["laliga-match".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_input_is_a_no_op() {
        let fetcher = BatchFetcher::new(4);
        let results: Vec<u32> = fetcher.run(Vec::<u32>::new(), |n| async move { Ok(n) }).await;
        assert!(results.is_empty());
    }
}
