use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Instant, Sleep};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// A restartable quiet-period timer
///
/// Every [`reset`](Debouncer::reset) pushes the deadline `delay` into the
/// future; [`expired`](Debouncer::expired) completes once the deadline passes
/// with no further reset, and disarms the timer.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            deadline: None,
        }
    }

    pub fn reset(&mut self) {
        let deadline = Instant::now() + self.delay;
        match &mut self.deadline {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.deadline = Some(Box::pin(tokio::time::sleep_until(deadline))),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait for the quiet period to end
    ///
    /// Never completes while the timer is disarmed, so it can sit in a
    /// `select!` branch unconditionally.
    pub async fn expired(&mut self) {
        match &mut self.deadline {
            Some(sleep) => {
                sleep.as_mut().await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Debouncer::new(DEFAULT_DEBOUNCE)
    }
}
