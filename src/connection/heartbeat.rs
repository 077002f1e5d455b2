//! Ping/pong liveness
//!
//! A connection whose network path vanished without a close (a laptop lid
//! shut, a dropped Wi-Fi link) never produces an error on read. The writer
//! task pings on a fixed interval and the read side marks the connection
//! alive on any inbound frame or pong. Too many silent intervals in a row
//! end the connection through the normal disconnect path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Shared "heard from the peer" flag
///
/// Starts out alive, so a fresh connection is not penalized for the first
/// interval.
#[derive(Debug, Clone)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Record a sign of life from the peer
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Relaxed);
    }

    /// Whether the peer was heard from since the last call; resets the flag
    pub fn take(&self) -> bool {
        self.alive.swap(false, Ordering::Relaxed)
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one heartbeat tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// Peer was heard from during the last interval
    Alive,
    /// Peer was silent; carries the consecutive miss count
    Missed(u32),
    /// Peer was silent for too many intervals in a row
    TimedOut,
}

/// Heartbeat schedule for one connection
#[derive(Debug)]
pub struct Heartbeat {
    ticker: Interval,
    liveness: Liveness,
    missed: u32,
    max_missed: u32,
}

impl Heartbeat {
    /// Tick every `interval`; give up after `timeout` of silence
    ///
    /// The allowed number of misses is `timeout / interval`, at least 1.
    pub fn new(interval: Duration, timeout: Duration, liveness: Liveness) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let max_missed =
            (timeout.as_millis() / interval.as_millis()).clamp(1, u32::MAX as u128) as u32;

        Self {
            ticker,
            liveness,
            missed: 0,
            max_missed,
        }
    }

    pub fn max_missed(&self) -> u32 {
        self.max_missed
    }

    /// Wait for the next tick and judge the interval that just ended
    pub async fn tick(&mut self) -> HeartbeatResult {
        self.ticker.tick().await;

        if self.liveness.take() {
            self.missed = 0;
            return HeartbeatResult::Alive;
        }

        self.missed += 1;
        if self.missed >= self.max_missed {
            HeartbeatResult::TimedOut
        } else {
            HeartbeatResult::Missed(self.missed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness_take_resets() {
        let liveness = Liveness::new();

        assert!(liveness.take());
        assert!(!liveness.take());

        liveness.clone().mark_alive();
        assert!(liveness.take());
    }

    #[tokio::test]
    async fn test_max_missed_floor() {
        let hb = Heartbeat::new(
            Duration::from_secs(30),
            Duration::from_secs(10),
            Liveness::new(),
        );
        assert_eq!(hb.max_missed(), 1);

        let hb = Heartbeat::new(
            Duration::from_secs(30),
            Duration::from_secs(90),
            Liveness::new(),
        );
        assert_eq!(hb.max_missed(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out() {
        let mut hb = Heartbeat::new(
            Duration::from_secs(10),
            Duration::from_secs(30),
            Liveness::new(),
        );

        // First interval is covered by the initial alive flag
        assert_eq!(hb.tick().await, HeartbeatResult::Alive);
        assert_eq!(hb.tick().await, HeartbeatResult::Missed(1));
        assert_eq!(hb.tick().await, HeartbeatResult::Missed(2));
        assert_eq!(hb.tick().await, HeartbeatResult::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_resets_misses() {
        let liveness = Liveness::new();
        let mut hb = Heartbeat::new(
            Duration::from_secs(10),
            Duration::from_secs(20),
            liveness.clone(),
        );

        assert_eq!(hb.tick().await, HeartbeatResult::Alive);
        assert_eq!(hb.tick().await, HeartbeatResult::Missed(1));

        liveness.mark_alive();
        assert_eq!(hb.tick().await, HeartbeatResult::Alive);
        assert_eq!(hb.tick().await, HeartbeatResult::Missed(1));
        assert_eq!(hb.tick().await, HeartbeatResult::TimedOut);
    }
}
