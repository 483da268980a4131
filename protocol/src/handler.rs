//! Fixed handler contract: a request in, a structured outcome out.

use serde_json::Value;

use crate::request::Request;

/// What a handler produced.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Encoded as a JSON body with status 200.
    Json(Value),
    /// Result of a credential check; the engine turns it into a cookie
    /// (200) or a rejection (401).
    Session(SessionOutcome),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Issued { session_id: String },
    Rejected { reason: String },
}

/// A handler fault that must surface as a 500.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("internal error: {0}")]
    Internal(String),
}

pub type HandlerResult = Result<Outcome, HandlerError>;

/// Logic bound to a `(method, path)` pair.
///
/// Handlers read headers, body and the authenticated user off the request;
/// they do not see the socket.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: &Request) -> HandlerResult;
}

impl<H: Handler + ?Sized> Handler for std::sync::Arc<H> {
    fn call(&self, request: &Request) -> HandlerResult {
        (**self).call(request)
    }
}

/// Adapter turning a closure into a [`Handler`].
pub struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, request: &Request) -> HandlerResult {
        (self.0)(request)
    }
}

#[must_use]
pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
{
    FnHandler(f)
}
