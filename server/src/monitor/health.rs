use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Last heartbeat per username.
#[derive(Clone)]
pub struct LivenessMonitor {
    last_seen: Arc<DashMap<String, Instant>>,
    timeout: Duration,
}

impl LivenessMonitor {
    pub fn new() -> Self {
        Self::with_timeout(LIVENESS_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            last_seen: Arc::new(DashMap::new()),
            timeout,
        }
    }

    pub fn record(&self, username: &str) {
        let previous = self.last_seen.insert(username.to_string(), Instant::now());
        if previous.is_none() {
            log::info!("First heartbeat received from {}", username);
        } else {
            log::debug!("Heartbeat received from {}", username);
        }
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.last_seen
            .get(username)
            .map(|seen| seen.elapsed() < self.timeout)
            .unwrap_or(false)
    }

    pub fn online_count(&self) -> usize {
        self.last_seen
            .iter()
            .filter(|entry| entry.value().elapsed() < self.timeout)
            .count()
    }

    /// Drops every entry older than the timeout and returns how many went.
    pub fn cleanup_stale(&self) -> usize {
        let mut removed = 0;

        self.last_seen.retain(|username, seen| {
            if seen.elapsed() >= self.timeout {
                log::info!("Peer {} marked as offline (no heartbeat)", username);
                removed += 1;
                false
            } else {
                true
            }
        });

        removed
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new()
    }
}
