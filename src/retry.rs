use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::types::Result;

/// Bounded retry with linear backoff, applied around any fallible async
/// operation against the accounting service.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first try.
    pub attempts: u32,
    /// Backoff unit; the delay before attempt n+1 is n * backoff.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    /// Run `op` up to the attempt budget. The last failure is returned
    /// as-is rather than wrapped, so callers see the terminal cause.
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.max(1);
        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt == attempts => {
                    debug!("{op_name}: attempt {attempt}/{attempts} failed: {e}");
                    return Err(e);
                }
                Err(e) => {
                    debug!("{op_name}: attempt {attempt}/{attempts} failed, retrying: {e}");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
            }
        }
        unreachable!("attempt budget is at least one")
    }
}
