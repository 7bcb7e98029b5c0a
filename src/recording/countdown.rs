//! Countdown timer task.
//!
//! A running countdown is an owned tokio task that posts one
//! [`ControllerEvent::Tick`] per period to the recorder's event channel. The
//! recorder applies ticks itself, so the task never touches session state.
//! Dropping the handle aborts the task.

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Events posted to the recorder controller by its background tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    /// One countdown period elapsed for the countdown with this generation.
    Tick { generation: u64 },
}

/// Handle to a running countdown.
#[derive(Debug)]
pub struct Countdown {
    generation: u64,
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Spawns a countdown whose first tick fires one full period from now.
    pub fn spawn(
        generation: u64,
        period: Duration,
        events: UnboundedSender<ControllerEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if events.send(ControllerEvent::Tick { generation }).is_err() {
                    break;
                }
            }
        });
        tracing::debug!("Countdown {} started", generation);
        Self { generation, handle }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!("Countdown {} cancelled", self.generation);
    }
}
