//! Overall action deadline
//!
//! Two layers enforce ACTION_TIMEOUT:
//! - [`Watchdog`] counts down on its own OS thread, so blocking work on the
//!   runtime cannot hold it back. When it fires the caller's expiry action runs
//!   (the binary exits the process).
//! - [`guard`] races the work future against a timer and also refuses any output
//!   that arrives after the deadline has passed.
//!
//! Neither layer closes sessions gracefully. Work that loses the race is dropped
//! wherever it is suspended.

use std::future::Future;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Action timed out after {0:?}")]
pub struct DeadlineExceeded(pub Duration);

/// Run `work`, giving up once `limit` has elapsed
pub async fn guard<F, T>(limit: Duration, work: F) -> Result<T, DeadlineExceeded>
where
    F: Future<Output = T>,
{
    debug!("Action deadline set to {:?}", limit);
    let started = Instant::now();

    match tokio::time::timeout(limit, work).await {
        // Blocking work can overrun the timer and still complete first
        Ok(output) if started.elapsed() < limit => Ok(output),
        _ => {
            error!("Action deadline of {:?} exceeded, aborting", limit);
            Err(DeadlineExceeded(limit))
        }
    }
}

/// Countdown on a dedicated thread, disarmed when dropped
pub struct Watchdog {
    _disarm: mpsc::Sender<()>,
}

impl Watchdog {
    /// Start counting down; `on_expiry` runs on the watchdog thread if the
    /// watchdog is still armed after `limit`.
    pub fn arm<F>(limit: Duration, on_expiry: F) -> io::Result<Self>
    where
        F: FnOnce(DeadlineExceeded) + Send + 'static,
    {
        let (disarm, armed) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("action-deadline".to_string())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = armed.recv_timeout(limit) {
                    error!("Action deadline of {:?} exceeded, aborting", limit);
                    on_expiry(DeadlineExceeded(limit));
                }
            })?;

        debug!("Watchdog armed for {:?}", limit);
        Ok(Self { _disarm: disarm })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_work_within_deadline() {
        let result = guard(Duration::from_secs(5), async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_slow_work_never_reports_success() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let result = guard(Duration::from_millis(20), async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            flag.store(true, Ordering::SeqCst);
            "done"
        })
        .await;

        assert_eq!(result, Err(DeadlineExceeded(Duration::from_millis(20))));
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_blocking_work_past_deadline_is_not_a_success() {
        let result = guard(Duration::from_millis(50), async {
            std::thread::sleep(Duration::from_millis(300));
            "success"
        })
        .await;

        assert_eq!(result, Err(DeadlineExceeded(Duration::from_millis(50))));
    }

    #[tokio::test]
    async fn test_expired_work_is_dropped() {
        struct DropFlag(Arc<AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let held = DropFlag(dropped.clone());

        let result = guard(Duration::from_millis(10), async move {
            let _held = held;
            std::future::pending::<()>().await;
        })
        .await;

        assert!(result.is_err());
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_watchdog_fires_while_caller_blocks() {
        let (fired_tx, fired_rx) = mpsc::channel();

        let _watchdog = Watchdog::arm(Duration::from_millis(50), move |expired| {
            let _ = fired_tx.send(expired);
        })
        .unwrap();

        // The caller thread is stuck in synchronous work the whole time
        std::thread::sleep(Duration::from_millis(300));

        assert_eq!(
            fired_rx.try_recv(),
            Ok(DeadlineExceeded(Duration::from_millis(50)))
        );
    }

    #[test]
    fn test_dropped_watchdog_never_fires() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let watchdog = Watchdog::arm(Duration::from_millis(100), move |_| {
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();
        drop(watchdog);

        std::thread::sleep(Duration::from_millis(300));
        assert!(!fired.load(Ordering::SeqCst));
    }
}
