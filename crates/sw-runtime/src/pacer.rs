use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Enforces a minimum gap between one store call returning and the next
/// one going out.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last_returned: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_returned: None,
        }
    }

    /// Run `call` once `interval` has passed since the previous call
    /// returned. The gap is measured from completion, so a slow call still
    /// leaves a full interval before the next.
    pub async fn call<F: Future>(&mut self, call: F) -> F::Output {
        if let Some(last) = self.last_returned {
            tokio::time::sleep_until(last + self.interval).await;
        }
        let out = call.await;
        self.last_returned = Some(Instant::now());
        out
    }
}
