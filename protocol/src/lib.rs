//! Byte-stream HTTP-like protocol engine shared by the directory server and
//! every peer's inbound listener.
//!
//! One request is parsed per accepted connection, gated on a session cookie,
//! dispatched to a registered [`Handler`], and answered with exactly one
//! response before the connection is closed.

pub mod engine;
pub mod error;
pub mod handler;
pub mod headers;
pub mod message;
pub mod request;
pub mod response;
pub mod router;
pub mod statics;

pub use engine::{DEFAULT_MAX_REQUEST_BYTES, Engine, EngineLimits, ServerHandle, SessionResolver};
pub use error::ProtocolError;
pub use handler::{FnHandler, Handler, HandlerError, HandlerResult, Outcome, SessionOutcome, from_fn};
pub use headers::HeaderMap;
pub use message::{
    ChannelRequest, DEFAULT_CHANNEL, PeerAddr, RegisterRequest, SESSION_COOKIE, SendPeerRequest,
};
pub use request::{Method, Request, parse_cookies};
pub use response::{Response, StatusCode, UNAUTHORIZED_BODY};
pub use router::{Fallback, Router, Target};
pub use statics::StaticFiles;

/// Returns the protocol crate version string.
pub fn protocol_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
