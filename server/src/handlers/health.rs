use std::sync::Arc;

use protocol::{Handler, HandlerError, HandlerResult, Outcome, Request};
use serde::Serialize;
use serde_json::json;

use crate::directory::Directory;
use crate::monitor::LivenessMonitor;

/// `GET /heartbeat`: records that the caller is alive.
pub struct HeartbeatHandler {
    monitor: LivenessMonitor,
}

impl HeartbeatHandler {
    pub fn new(monitor: LivenessMonitor) -> Self {
        Self { monitor }
    }
}

impl Handler for HeartbeatHandler {
    fn call(&self, request: &Request) -> HandlerResult {
        if let Some(username) = request.authenticated_user.as_deref() {
            self.monitor.record(username);
        }
        Ok(Outcome::Json(json!({"status": "ok"})))
    }
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub active_sessions: usize,
    pub online_peers: usize,
}

pub struct HealthHandler {
    directory: Arc<Directory>,
    monitor: LivenessMonitor,
}

impl HealthHandler {
    pub fn new(directory: Arc<Directory>, monitor: LivenessMonitor) -> Self {
        Self { directory, monitor }
    }
}

impl Handler for HealthHandler {
    fn call(&self, _request: &Request) -> HandlerResult {
        let active_sessions = self
            .directory
            .sessions()
            .active_sessions()
            .map_err(|err| HandlerError::Internal(err.to_string()))?;

        let response = HealthCheckResponse {
            status: "healthy".to_string(),
            active_sessions,
            online_peers: self.monitor.online_count(),
        };

        serde_json::to_value(response)
            .map(Outcome::Json)
            .map_err(|err| HandlerError::Internal(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, User};

    #[test]
    fn test_heartbeat_then_health() {
        let store = MemoryStore::new(vec![User::new("alice", "p1")]);
        let directory = Arc::new(Directory::new(Arc::new(store)));
        directory.login("alice", "p1").unwrap();
        let monitor = LivenessMonitor::new();

        let mut request = Request::parse(b"GET /heartbeat HTTP/1.1\r\n\r\n").unwrap();
        request.authenticated_user = Some("alice".to_string());
        let beat = HeartbeatHandler::new(monitor.clone()).call(&request).unwrap();
        assert_eq!(beat, Outcome::Json(json!({"status": "ok"})));

        let health = HealthHandler::new(directory, monitor).call(&request).unwrap();
        assert_eq!(
            health,
            Outcome::Json(json!({"status": "healthy", "active_sessions": 1, "online_peers": 1}))
        );
    }
}
