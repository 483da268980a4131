//! Inbound `/send-peer` endpoint served by every agent.

use protocol::{
    Engine, EngineLimits, Handler, HandlerResult, Outcome, Request, Router, SendPeerRequest,
    ServerHandle,
};
use serde_json::json;

use crate::feed::MessageFeed;

/// Delivers each received payload to the feed. No session is required:
/// knowing the address is the only credential.
pub struct SendPeerHandler {
    feed: MessageFeed,
}

impl SendPeerHandler {
    pub fn new(feed: MessageFeed) -> Self {
        Self { feed }
    }
}

impl Handler for SendPeerHandler {
    fn call(&self, request: &Request) -> HandlerResult {
        let payload: SendPeerRequest = match request.json() {
            Ok(payload) => payload,
            Err(err) => {
                log::debug!("rejected /send-peer body from {:?}: {}", request.remote_addr, err);
                return Ok(Outcome::Json(
                    json!({"status": "error", "reason": format!("invalid body: {}", err)}),
                ));
            }
        };

        log::info!(
            "received message from {} ({:?})",
            payload.sender.as_deref().unwrap_or("unknown"),
            request.remote_addr
        );
        self.feed.message(payload.sender, payload.message);
        Ok(Outcome::Json(json!({"status": "ok", "delivered": true})))
    }
}

pub fn router(feed: MessageFeed) -> Router {
    Router::new().post("/send-peer", SendPeerHandler::new(feed))
}

/// Binds `host:port` and serves `/send-peer` until the handle is shut down.
pub async fn start(
    host: &str,
    port: u16,
    feed: MessageFeed,
    limits: EngineLimits,
) -> std::io::Result<ServerHandle> {
    let handle = Engine::new(router(feed))
        .with_limits(limits)
        .bind((host, port))
        .await?;
    log::info!("peer listener bound on {}", handle.local_addr());
    Ok(handle)
}
