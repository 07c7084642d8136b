//! Polling idle backend: queries idle time on a fixed cadence.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::flag::FlagWriter;
use super::query::IdleQuery;
use crate::error::IdleError;

/// Derives a flag from periodic idle time queries.
pub struct PollingBackend<Q> {
    query: Q,
    check_interval: Duration,
    retry_backoff: Duration,
}

impl<Q: IdleQuery> PollingBackend<Q> {
    pub fn new(query: Q, check_interval: Duration, retry_backoff: Duration) -> Self {
        Self {
            query,
            check_interval,
            retry_backoff,
        }
    }

    /// Query once and update the flag. On error the flag is left untouched.
    ///
    /// Idle time is compared in whole seconds.
    pub async fn poll_once(&self, threshold: Duration, flag: &FlagWriter) -> Result<bool, IdleError> {
        let idle_time = self.query.idle_time().await?;
        let idle = idle_time.as_secs() >= threshold.as_secs();
        flag.store(idle);
        Ok(idle)
    }

    /// Poll forever. Query failures are retried after the backoff.
    pub async fn run(self, threshold: Duration, flag: FlagWriter) -> Result<(), IdleError> {
        info!(
            "Polling idle time for {} flag every {:?} (threshold {:?})",
            flag.name(),
            self.check_interval,
            threshold
        );

        let mut consecutive_failures: u32 = 0;

        loop {
            match self.poll_once(threshold, &flag).await {
                Ok(_) => {
                    if consecutive_failures > 0 {
                        info!(
                            "Idle query for {} flag recovered after {} failures",
                            flag.name(),
                            consecutive_failures
                        );
                        consecutive_failures = 0;
                    }
                    tokio::time::sleep(self.check_interval).await;
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    if consecutive_failures == 1 {
                        warn!("Idle query for {} flag failed: {}", flag.name(), e);
                    } else {
                        debug!(
                            "Idle query for {} flag failed ({} in a row): {}",
                            flag.name(),
                            consecutive_failures,
                            e
                        );
                    }
                    tokio::time::sleep(self.retry_backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idle::flag::shared_flag;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Replays scripted readings; `None` is a failed query. The last
    /// reading repeats once the script runs out.
    struct ScriptedQuery {
        readings: Mutex<VecDeque<Option<u64>>>,
        last: Mutex<Option<u64>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedQuery {
        fn new(readings: Vec<Option<u64>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let query = Self {
                readings: Mutex::new(readings.into()),
                last: Mutex::new(None),
                calls: calls.clone(),
            };
            (query, calls)
        }

        fn next(&self) -> Option<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut last = self.last.lock().unwrap();
            if let Some(reading) = self.readings.lock().unwrap().pop_front() {
                *last = reading;
            }
            *last
        }
    }

    impl IdleQuery for ScriptedQuery {
        fn idle_time(&self) -> impl Future<Output = Result<Duration, IdleError>> + Send {
            let reading = self.next();
            async move {
                reading.map(Duration::from_millis).ok_or(IdleError::Parse {
                    output: "garbage".to_string(),
                })
            }
        }
    }

    fn backend(readings: Vec<Option<u64>>) -> (PollingBackend<ScriptedQuery>, Arc<AtomicUsize>) {
        let (query, calls) = ScriptedQuery::new(readings);
        let backend = PollingBackend::new(query, Duration::from_secs(1), Duration::from_secs(1));
        (backend, calls)
    }

    #[tokio::test]
    async fn threshold_compares_whole_seconds() {
        let threshold = Duration::from_secs(30);
        let (backend, _) = backend(vec![Some(29_999), Some(30_000), Some(1_000)]);
        let (writer, reader) = shared_flag("pre-idle", None);

        assert!(!backend.poll_once(threshold, &writer).await.unwrap());
        assert!(!reader.is_set());

        assert!(backend.poll_once(threshold, &writer).await.unwrap());
        assert!(reader.is_set());

        assert!(!backend.poll_once(threshold, &writer).await.unwrap());
        assert!(!reader.is_set());
    }

    #[tokio::test]
    async fn failed_query_leaves_flag_unchanged() {
        let threshold = Duration::from_secs(210);
        let (backend, _) = backend(vec![Some(300_000), None]);
        let (writer, reader) = shared_flag("idle", None);

        backend.poll_once(threshold, &writer).await.unwrap();
        assert!(reader.is_set());

        assert!(backend.poll_once(threshold, &writer).await.is_err());
        assert!(reader.is_set());
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_with_fresh_reading_after_failures() {
        let threshold = Duration::from_secs(210);
        let mut readings = vec![None; 5];
        readings.push(Some(250_000));
        let (backend, calls) = backend(readings);
        let (writer, reader) = shared_flag("idle", None);

        tokio::spawn(backend.run(threshold, writer));

        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(!reader.is_set());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(calls.load(Ordering::SeqCst) >= 6);
        assert!(reader.is_set());
    }
}
