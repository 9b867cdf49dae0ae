// Per-room countdown tickers.
//
// Each room owns at most one ticker task at a time; arming always aborts the
// previous handle first (cancel-then-arm, single slot). Tickers only emit
// one event per second into the central loop. All countdown state lives in
// the room itself, so a replaced or aborted ticker can never double-count.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};
use tracing::debug;

/// One second elapsed for the named room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub code: String,
}

/// The single-slot ticker table. Ticker tasks run independently of any
/// client connection: an empty room keeps counting down.
#[derive(Debug, Default)]
pub struct TimerBank {
    handles: HashMap<String, JoinHandle<()>>,
}

impl TimerBank {
    pub fn new() -> Self {
        TimerBank::default()
    }

    /// Start (or restart) the ticker for a room. Any prior ticker for the
    /// same room is aborted first.
    pub fn arm(&mut self, code: &str, tx: mpsc::Sender<Tick>) {
        self.cancel(code);
        debug!(room = code, "arming ticker");
        let tick_code = code.to_string();
        // First tick after a full second, then every second. Anchor to the
        // moment of arming, not the ticker task's first poll.
        let start = Instant::now() + Duration::from_secs(1);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(start, Duration::from_secs(1));
            loop {
                ticker.tick().await;
                let tick = Tick {
                    code: tick_code.clone(),
                };
                if tx.send(tick).await.is_err() {
                    // Event loop gone; nothing left to notify.
                    return;
                }
            }
        });
        self.handles.insert(code.to_string(), handle);
    }

    /// Stop the ticker for a room, if one is running.
    pub fn cancel(&mut self, code: &str) {
        if let Some(handle) = self.handles.remove(code) {
            debug!(room = code, "cancelling ticker");
            handle.abort();
        }
    }

    pub fn is_armed(&self, code: &str) -> bool {
        self.handles.contains_key(code)
    }

    /// Abort every ticker (shutdown path).
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

impl Drop for TimerBank {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    async fn drain(rx: &mut mpsc::Receiver<Tick>) -> Vec<Tick> {
        let mut out = Vec::new();
        while let Ok(tick) = rx.try_recv() {
            out.push(tick);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut bank = TimerBank::new();
        bank.arm("ROOM01", tx);

        advance(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;

        let ticks = drain(&mut rx).await;
        assert_eq!(ticks.len(), 3);
        assert!(ticks.iter().all(|t| t.code == "ROOM01"));
    }

    #[tokio::test(start_paused = true)]
    async fn no_tick_before_the_first_second() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut bank = TimerBank::new();
        bank.arm("ROOM01", tx);

        advance(Duration::from_millis(900)).await;
        tokio::task::yield_now().await;
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_previous_ticker() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut bank = TimerBank::new();
        bank.arm("ROOM01", tx.clone());
        advance(Duration::from_millis(500)).await;

        // Re-arm half way through: the one-second clock starts over and
        // only a single ticker survives.
        bank.arm("ROOM01", tx);
        advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;

        assert_eq!(drain(&mut rx).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticking() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut bank = TimerBank::new();
        bank.arm("ROOM01", tx);
        advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(drain(&mut rx).await.len(), 1);

        bank.cancel("ROOM01");
        assert!(!bank.is_armed("ROOM01"));
        advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn independent_rooms_tick_independently() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut bank = TimerBank::new();
        bank.arm("ROOM01", tx.clone());
        bank.arm("ROOM02", tx);

        advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;

        let ticks = drain(&mut rx).await;
        assert_eq!(ticks.iter().filter(|t| t.code == "ROOM01").count(), 2);
        assert_eq!(ticks.iter().filter(|t| t.code == "ROOM02").count(), 2);
    }
}
