use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};

/// Run `fetch` for every item with at most `limit` requests in flight.
///
/// Results come back in the order of `items`, whatever order the requests
/// complete in. The first error cancels the remaining requests.
pub async fn fan_out<T, R, E, F, Fut>(items: Vec<T>, limit: usize, fetch: F) -> Result<Vec<R>, E>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let fetch = &fetch;
    let mut results: Vec<(usize, R)> = stream::iter(items.into_iter().enumerate())
        .map(|(i, item)| async move { fetch(item).await.map(|r| (i, r)) })
        .buffer_unordered(limit.max(1))
        .try_collect()
        .await?;

    // buffer_unordered yields in completion order
    results.sort_by_key(|(i, _)| *i);
    Ok(results.into_iter().map(|(_, r)| r).collect())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn preserves_input_order() {
        let delays = vec![30u64, 5, 20, 1];
        let results: Result<Vec<u64>, ()> = fan_out(delays, 4, |ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(ms)
        })
        .await;

        assert_eq!(results.unwrap(), vec![30, 5, 20, 1]);
    }

    #[tokio::test]
    async fn respects_concurrency_limit() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let results: Result<Vec<usize>, ()> = fan_out((0..10).collect(), 3, |i| {
            let active = &active;
            let peak = &peak;
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(i)
            }
        })
        .await;

        assert_eq!(results.unwrap().len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn first_error_wins() {
        let results: Result<Vec<u32>, String> = fan_out(vec![1, 2, 3], 1, |i| async move {
            if i == 2 {
                Err(format!("week {i} failed"))
            } else {
                Ok(i)
            }
        })
        .await;

        assert_eq!(results.unwrap_err(), "week 2 failed");
    }

    #[tokio::test]
    async fn zero_limit_still_makes_progress() {
        let results: Result<Vec<u8>, ()> =
            fan_out(vec![1, 2], 0, |i| async move { Ok(i) }).await;
        assert_eq!(results.unwrap(), vec![1, 2]);
    }
}
