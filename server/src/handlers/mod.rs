pub mod auth;
pub mod channels;
pub mod health;
pub mod peers;

use std::sync::Arc;

use protocol::{HandlerError, HandlerResult, Outcome, Request, Router};
use serde_json::{json, Value};

use crate::directory::Directory;
use crate::error::DirectoryError;
use crate::monitor::LivenessMonitor;

pub use auth::LoginHandler;
pub use channels::{
    ChannelListHandler, ChannelPeersHandler, CreateChannelHandler, JoinChannelHandler, MeHandler,
    QuitChannelHandler,
};
pub use health::{HealthHandler, HeartbeatHandler};
pub use peers::{GetPeersHandler, RegisterHandler};

/// Route table of the directory server.
pub fn routes(directory: Arc<Directory>, monitor: LivenessMonitor) -> Router {
    Router::new()
        .post("/login", LoginHandler::new(directory.clone()))
        .post("/register", RegisterHandler::new(directory.clone()))
        .get("/get-peers", GetPeersHandler::new(directory.clone()))
        .post("/channels/create", CreateChannelHandler::new(directory.clone()))
        .post("/channels/join", JoinChannelHandler::new(directory.clone()))
        .get("/channels/quit", QuitChannelHandler::new(directory.clone()))
        .post("/channels/peers", ChannelPeersHandler::new(directory.clone()))
        .get("/channels/list", ChannelListHandler::new(directory.clone()))
        .get("/me", MeHandler::new(directory.clone()))
        .get("/heartbeat", HeartbeatHandler::new(monitor.clone()))
        .get("/health", HealthHandler::new(directory, monitor))
}

pub(crate) fn failed(reason: impl std::fmt::Display) -> Outcome {
    Outcome::Json(json!({"status": "failed", "reason": reason.to_string()}))
}

/// Turns a directory result into an outcome: faults become a 500, every
/// other error a `failed` body.
pub(crate) fn respond<T>(
    result: crate::error::Result<T>,
    ok: impl FnOnce(T) -> Value,
) -> HandlerResult {
    match result {
        Ok(value) => Ok(Outcome::Json(ok(value))),
        Err(err) if err.is_fault() => Err(HandlerError::Internal(err.to_string())),
        Err(err) => Ok(failed(err)),
    }
}

/// The user the auth gate resolved for this request.
pub(crate) fn caller(request: &Request) -> crate::error::Result<&str> {
    request
        .authenticated_user
        .as_deref()
        .ok_or(DirectoryError::Unauthorized)
}
