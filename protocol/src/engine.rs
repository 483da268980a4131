//! Connection handling: read one request, gate, dispatch, answer, close.

use std::io;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::ProtocolError;
use crate::handler::{Handler, Outcome, SessionOutcome};
use crate::message::SESSION_COOKIE;
use crate::request::{HEAD_BOUNDARY, Request, find_boundary};
use crate::response::{Response, StatusCode};
use crate::router::{Router, Target};

/// Upper bound on bytes read for one request. Anything past it is dropped.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024;

const READ_CHUNK: usize = 1024;
const LINGER_TIMEOUT: Duration = Duration::from_millis(50);
const LINGER_MAX_BYTES: usize = 64 * 1024;

/// Maps a session id to the username that owns it.
pub trait SessionResolver: Send + Sync + 'static {
    fn resolve(&self, session_id: &str) -> Option<String>;
}

impl<F> SessionResolver for F
where
    F: Fn(&str) -> Option<String> + Send + Sync + 'static,
{
    fn resolve(&self, session_id: &str) -> Option<String> {
        self(session_id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineLimits {
    pub max_request_bytes: usize,
    /// Applied to each individual read, not to the whole request.
    pub read_timeout: Duration,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// Route table plus auth gate.
///
/// Without a [`SessionResolver`] every path is open; with one, every path
/// not marked public on the router requires a resolvable `session_id` cookie.
pub struct Engine {
    router: Router,
    sessions: Option<Arc<dyn SessionResolver>>,
    limits: EngineLimits,
}

impl Engine {
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self {
            router,
            sessions: None,
            limits: EngineLimits::default(),
        }
    }

    #[must_use]
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionResolver>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Handles one raw request. `None` means close without answering
    /// (empty read or unparseable request).
    pub fn handle(&self, raw: &[u8], remote: Option<SocketAddr>) -> Option<Response> {
        let request = match Request::parse(raw) {
            Ok(request) => request,
            Err(ProtocolError::Empty) => return None,
            Err(err) => {
                log::debug!("dropping unparseable request from {:?}: {}", remote, err);
                return None;
            }
        };

        let request = match remote {
            Some(addr) => request.with_remote_addr(addr),
            None => request,
        };
        Some(self.dispatch(request))
    }

    pub fn dispatch(&self, mut request: Request) -> Response {
        request.authenticated_user = self.authenticate(&request);

        if self.sessions.is_some()
            && request.authenticated_user.is_none()
            && !self.router.is_public(&request.path)
        {
            log::info!(
                "access denied for {} {}: no valid session",
                request.method,
                request.path
            );
            return Response::unauthorized();
        }

        match self.router.resolve(&request.method, &request.path) {
            Target::Handler(handler) => invoke(handler, &request),
            Target::Fallback(fallback) => {
                match panic::catch_unwind(AssertUnwindSafe(|| fallback.serve(&request))) {
                    Ok(response) => response,
                    Err(_) => {
                        log::error!("fallback panicked serving {}", request.path);
                        Response::internal_error()
                    }
                }
            }
            Target::NotFound => Response::not_found(),
        }
    }

    fn authenticate(&self, request: &Request) -> Option<String> {
        let sessions = self.sessions.as_ref()?;
        let session_id = request.cookie(SESSION_COOKIE)?;
        sessions.resolve(session_id)
    }

    /// Serves a single accepted connection. The stream is closed on every
    /// exit path when it is dropped.
    pub async fn serve_connection(&self, mut stream: TcpStream, remote: SocketAddr) {
        log::debug!("accepted connection from {}", remote);

        let raw = match read_request(&mut stream, &self.limits).await {
            Ok(raw) => raw,
            Err(err) => {
                log::debug!("read from {} failed: {}", remote, err);
                return;
            }
        };

        if raw.is_empty() {
            log::debug!("empty request from {}; closing connection", remote);
            return;
        }

        let Some(response) = self.handle(&raw, Some(remote)) else {
            return;
        };

        if let Err(err) = stream.write_all(&response.to_bytes()).await {
            log::debug!("write to {} failed: {}", remote, err);
            return;
        }
        let _ = stream.shutdown().await;
        discard_unread(&mut stream).await;
    }

    pub async fn bind<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener)
    }

    /// Starts the accept loop on an already bound listener.
    pub fn serve(self, listener: TcpListener) -> io::Result<ServerHandle> {
        let local_addr = listener.local_addr()?;
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        tracker.spawn(accept_loop(
            listener,
            Arc::new(self),
            token.clone(),
            tracker.clone(),
        ));

        Ok(ServerHandle {
            local_addr,
            token,
            tracker,
        })
    }
}

/// Handle to a running listener and every connection task it spawned.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl ServerHandle {
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stops accepting, drops in-flight connections and waits for every task
    /// to finish. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn accept_loop(
    listener: TcpListener,
    engine: Arc<Engine>,
    token: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    let engine = engine.clone();
                    let token = token.clone();
                    tracker.spawn(async move {
                        tokio::select! {
                            _ = token.cancelled() => {}
                            _ = engine.serve_connection(stream, remote) => {}
                        }
                    });
                }
                Err(err) => {
                    log::warn!("accept failed: {}", err);
                }
            },
        }
    }
    log::debug!("listener closed");
}

fn invoke(handler: &dyn Handler, request: &Request) -> Response {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.call(request))) {
        Ok(Ok(Outcome::Json(value))) => Response::json(StatusCode::OK, &value),
        Ok(Ok(Outcome::Session(outcome))) => session_response(outcome),
        Ok(Err(err)) => {
            log::error!("handler for {} {} failed: {}", request.method, request.path, err);
            Response::internal_error()
        }
        Err(_) => {
            log::error!("handler for {} {} panicked", request.method, request.path);
            Response::internal_error()
        }
    }
}

fn session_response(outcome: SessionOutcome) -> Response {
    match outcome {
        SessionOutcome::Issued { session_id } => Response::json(
            StatusCode::OK,
            &json!({"login": "success", "status": "Login successful, cookie set"}),
        )
        .with_header(
            "Set-Cookie",
            format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly"),
        ),
        SessionOutcome::Rejected { reason } => Response::json(
            StatusCode::UNAUTHORIZED,
            &json!({"login": "failed", "reason": reason}),
        ),
    }
}

/// Reads until the head and the announced body have arrived, the peer stops
/// sending, or the byte limit is hit.
async fn read_request(stream: &mut TcpStream, limits: &EngineLimits) -> io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    while raw.len() < limits.max_request_bytes {
        let want = (limits.max_request_bytes - raw.len()).min(READ_CHUNK);
        let read = match timeout(limits.read_timeout, stream.read(&mut chunk[..want])).await {
            Ok(read) => read?,
            Err(_) => {
                log::debug!("read timed out after {} bytes", raw.len());
                break;
            }
        };
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..read]);
        if is_complete(&raw) {
            break;
        }
    }

    Ok(raw)
}

/// Consumes input the peer sent past the read limit so closing the socket
/// ends with FIN rather than RST, which could discard the response.
async fn discard_unread(stream: &mut TcpStream) {
    let mut sink = [0u8; READ_CHUNK];
    let mut discarded = 0usize;
    while discarded < LINGER_MAX_BYTES {
        match timeout(LINGER_TIMEOUT, stream.read(&mut sink)).await {
            Ok(Ok(read)) if read > 0 => discarded += read,
            _ => break,
        }
    }
}

fn is_complete(raw: &[u8]) -> bool {
    let Some(boundary) = find_boundary(raw) else {
        return false;
    };

    let expected = std::str::from_utf8(&raw[..boundary])
        .ok()
        .and_then(|head| {
            head.split("\r\n").skip(1).find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.trim().eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
        })
        .unwrap_or(0);

    raw.len() - (boundary + HEAD_BOUNDARY.len()) >= expected
}
