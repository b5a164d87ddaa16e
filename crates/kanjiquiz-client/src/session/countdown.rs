//! Round countdown.
//!
//! A ticker task publishes the remaining time on a watch channel until it
//! reaches zero. Display only: the host decides when a round ends. Dropping
//! the countdown aborts the ticker.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug)]
pub struct Countdown {
    total: Duration,
    started: Instant,
    remaining: watch::Receiver<Duration>,
    ticker: JoinHandle<()>,
}

impl Countdown {
    /// Tick is at least 1ms.
    pub fn start(total: Duration, tick: Duration) -> Self {
        let tick = tick.max(Duration::from_millis(1));
        let started = Instant::now();
        let (tx, rx) = watch::channel(total);

        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                let left = total.saturating_sub(started.elapsed());
                tx.send_replace(left);
                if left.is_zero() {
                    break;
                }
            }
        });

        Self {
            total,
            started,
            remaining: rx,
            ticker,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed().min(self.total)
    }

    pub fn remaining(&self) -> Duration {
        self.total.saturating_sub(self.started.elapsed())
    }

    /// Tick-granular remaining time for display.
    pub fn watch(&self) -> watch::Receiver<Duration> {
        self.remaining.clone()
    }

    pub fn stop(self) {}
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_down_to_zero_and_finishes() {
        let c = Countdown::start(Duration::from_millis(100), Duration::from_millis(10));
        let mut w = c.watch();

        tokio::time::sleep(Duration::from_millis(45)).await;
        let mid = *w.borrow_and_update();
        assert!(mid <= Duration::from_millis(60) && mid >= Duration::from_millis(50), "{mid:?}");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(c.remaining().is_zero());
        assert_eq!(*w.borrow_and_update(), Duration::ZERO);
        // ticker is done and dropped its sender
        assert!(w.changed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_tick_still_counts_down() {
        let c = Countdown::start(Duration::from_millis(20), Duration::ZERO);
        let mut w = c.watch();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(*w.borrow_and_update(), Duration::ZERO);
        assert!(c.remaining().is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_the_ticker() {
        let c = Countdown::start(Duration::from_secs(10), Duration::from_millis(10));
        let w = c.watch();
        drop(c);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*w.borrow(), Duration::from_secs(10));
    }
}
