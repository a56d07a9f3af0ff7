use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Error)]
#[error("{what} did not converge after {attempts} attempts ({elapsed:?} elapsed)")]
/// Returned when a probe never succeeded within the attempt budget.
pub struct ConvergeTimeout {
    pub what: String,
    pub attempts: usize,
    pub elapsed: Duration,
}

/// Polls `probe` once per `interval`, up to `max_attempts` times, returning
/// on the first success. After the last failed attempt the timeout error
/// names the elapsed wall-clock duration.
///
/// This one primitive backs both "wait for a freshly applied configuration's
/// services to come up" and "wait for a background service to answer its
/// health check"; only the probe and the interval differ.
pub async fn await_convergence<F, Fut>(
    what: &str,
    interval: Duration,
    max_attempts: usize,
    mut probe: F,
) -> Result<(), ConvergeTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let attempts = max_attempts.max(1);
    let started = Instant::now();
    for attempt in 1..=attempts {
        if probe().await {
            return Ok(());
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Err(ConvergeTimeout {
        what: what.to_string(),
        attempts,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn unit_await_convergence_returns_on_first_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe_calls = calls.clone();

        await_convergence("test target", Duration::from_millis(1), 30, move || {
            let probe_calls = probe_calls.clone();
            async move {
                probe_calls.fetch_add(1, Ordering::Relaxed);
                true
            }
        })
        .await
        .expect("first attempt succeeds");

        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn functional_await_convergence_succeeds_before_attempt_budget() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe_calls = calls.clone();

        await_convergence("test target", Duration::from_millis(1), 5, move || {
            let probe_calls = probe_calls.clone();
            async move { probe_calls.fetch_add(1, Ordering::Relaxed) + 1 >= 3 }
        })
        .await
        .expect("third attempt succeeds");

        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn functional_await_convergence_times_out_after_exactly_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe_calls = calls.clone();

        let error = await_convergence("stub service", Duration::from_millis(1), 3, move || {
            let probe_calls = probe_calls.clone();
            async move {
                probe_calls.fetch_add(1, Ordering::Relaxed);
                false
            }
        })
        .await
        .expect_err("exhaustion must time out");

        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert_eq!(error.attempts, 3);
        let rendered = error.to_string();
        assert!(rendered.contains("stub service"));
        assert!(rendered.contains("3 attempts"));
    }

    #[tokio::test]
    async fn regression_zero_attempt_budget_still_probes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe_calls = calls.clone();

        let error = await_convergence("stub service", Duration::from_millis(1), 0, move || {
            let probe_calls = probe_calls.clone();
            async move {
                probe_calls.fetch_add(1, Ordering::Relaxed);
                false
            }
        })
        .await
        .expect_err("still bounded");

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(error.attempts, 1);
    }
}
