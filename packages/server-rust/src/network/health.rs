//! Server health state and in-flight call tracking.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HealthState {
    /// Custom operations are still loading.
    Starting = 0,
    Ready = 1,
    /// Shutdown signalled; waiting for in-flight calls.
    Draining = 2,
    Stopped = 3,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Starting,
            1 => Self::Ready,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Shared by the readiness probe, the JSON-RPC handler and shutdown.
#[derive(Debug)]
pub struct ServerHealth {
    state: AtomicU8,
    in_flight: Arc<AtomicU64>,
}

impl ServerHealth {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(HealthState::Starting as u8),
            in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn state(&self) -> HealthState {
        HealthState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_ready(&self) {
        self.state.store(HealthState::Ready as u8, Ordering::Release);
    }

    pub fn begin_drain(&self) {
        self.state.store(HealthState::Draining as u8, Ordering::Release);
    }

    /// Tracks one call until the guard is dropped.
    #[must_use]
    pub fn call_guard(&self) -> CallGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        CallGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Waits until no call is in flight or `timeout` expires. Moves to
    /// `Stopped` and returns `true` on a clean drain.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.in_flight() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.state.store(HealthState::Stopped as u8, Ordering::Release);
        true
    }
}

impl Default for ServerHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter on drop, including during unwinding.
#[derive(Debug)]
pub struct CallGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        let health = ServerHealth::new();
        assert_eq!(health.state(), HealthState::Starting);
        health.set_ready();
        assert_eq!(health.state(), HealthState::Ready);
        health.begin_drain();
        assert_eq!(health.state().as_str(), "draining");
    }

    #[test]
    fn guards_track_in_flight_calls() {
        let health = ServerHealth::new();
        let a = health.call_guard();
        let b = health.call_guard();
        assert_eq!(health.in_flight(), 2);
        drop(a);
        drop(b);
        assert_eq!(health.in_flight(), 0);
    }

    #[tokio::test]
    async fn drain_waits_for_guards() {
        let health = Arc::new(ServerHealth::new());
        let guard = health.call_guard();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            drop(guard);
        });
        assert!(health.wait_for_drain(Duration::from_secs(2)).await);
        assert_eq!(health.state(), HealthState::Stopped);
    }

    #[tokio::test]
    async fn drain_times_out() {
        let health = ServerHealth::new();
        let _guard = health.call_guard();
        assert!(!health.wait_for_drain(Duration::from_millis(20)).await);
        assert_ne!(health.state(), HealthState::Stopped);
    }
}
