//! Direct sends to other peers' listeners and channel fan-out.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::future::join_all;
use protocol::{PeerAddr, SendPeerRequest};
use serde_json::Value;
use tokio_util::task::TaskTracker;

use crate::error::{AgentError, Result};

/// Outcome of one broadcast, counted after every send finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// `[<username> @ <channel>]: <message>`
pub fn format_broadcast(username: &str, channel: &str, message: &str) -> String {
    format!("[{} @ {}]: {}", username, channel, message)
}

/// HTTP client for short-lived outbound connections to peers.
#[derive(Clone, Debug)]
pub struct Courier {
    http: reqwest::Client,
}

impl Courier {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self { http })
    }

    /// One attempt, never retried.
    pub async fn send_direct(&self, addr: PeerAddr, payload: &SendPeerRequest) -> Result<()> {
        let url = format!("http://{}/send-peer", SocketAddr::new(addr.ip, addr.port));
        let response = self.http.post(url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Rejected {
                route: "/send-peer",
                reason: status.to_string(),
            });
        }

        let body: Value = response.json().await?;
        match body.get("status").and_then(Value::as_str) {
            Some("ok") => Ok(()),
            _ => Err(AgentError::Rejected {
                route: "/send-peer",
                reason: body
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("peer refused the message")
                    .to_string(),
            }),
        }
    }

    /// Sends `payload` to every target concurrently. Each send runs as its own
    /// task on `tracker`; a failure only affects its own count. `on_failure`
    /// is called once per failed target.
    pub async fn broadcast<F>(
        &self,
        targets: Vec<(String, PeerAddr)>,
        payload: SendPeerRequest,
        tracker: &TaskTracker,
        on_failure: F,
    ) -> BroadcastReport
    where
        F: Fn(&str, PeerAddr, &AgentError),
    {
        let attempted = targets.len();
        let handles: Vec<_> = targets
            .into_iter()
            .map(|(username, addr)| {
                let courier = self.clone();
                let payload = payload.clone();
                tracker.spawn(async move {
                    let result = courier.send_direct(addr, &payload).await;
                    (username, addr, result)
                })
            })
            .collect();

        let mut report = BroadcastReport {
            attempted,
            ..BroadcastReport::default()
        };
        for joined in join_all(handles).await {
            match joined {
                Ok((_, _, Ok(()))) => report.delivered += 1,
                Ok((username, addr, Err(err))) => {
                    report.failed += 1;
                    on_failure(&username, addr, &err);
                }
                Err(err) => {
                    report.failed += 1;
                    log::error!("broadcast send task failed: {}", err);
                }
            }
        }
        report
    }
}
