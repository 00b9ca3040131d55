use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, FixedOffset, Local, TimeZone};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::state::{FeedEvent, FeedState};

pub type Clock = Arc<dyn Fn() -> DateTime<FixedOffset> + Send + Sync>;

pub fn local_clock() -> Clock {
    Arc::new(|| {
        let now = Local::now();
        now.with_timezone(now.offset())
    })
}

/// Time left until the next midnight in `now`'s offset.
pub fn until_next_midnight(now: DateTime<FixedOffset>) -> Duration {
    let next = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| now.offset().from_local_datetime(&midnight).single());
    match next {
        Some(next) => (next - now).to_std().unwrap_or(Duration::ZERO),
        None => Duration::from_secs(60),
    }
}

/// Sends a `Tick` to the shared feed state at every local midnight. The tick
/// runs under the state lock, so it never overlaps a classification pass.
pub struct MidnightScheduler {
    state: Arc<Mutex<FeedState>>,
    clock: Clock,
    cancel: CancellationToken,
}

impl MidnightScheduler {
    pub fn new(state: Arc<Mutex<FeedState>>) -> Self {
        Self::with_clock(state, local_clock())
    }

    pub fn with_clock(state: Arc<Mutex<FeedState>>, clock: Clock) -> Self {
        Self {
            state,
            clock,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling the token stops the scheduler before its next tick.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        loop {
            let wait = until_next_midnight((self.clock)());
            debug!("Next rollover check in {:?}", wait);

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("🛑 Midnight scheduler stopped");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    let now = (self.clock)();
                    let mut state = self.state.lock().await;
                    state.update(FeedEvent::Tick(now));
                    info!("🕛 Timeline checked at {}", now);
                }
            }
        }
    }
}
