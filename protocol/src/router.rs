//! Exact-path route table with an optional non-handler fallback.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::handler::Handler;
use crate::request::{Method, Request};
use crate::response::Response;

/// Paths that never require a session cookie.
pub const PUBLIC_PATHS: [&str; 2] = ["/login", "/login.html"];

/// Serves requests no handler claimed, e.g. static content.
pub trait Fallback: Send + Sync + 'static {
    fn serve(&self, request: &Request) -> Response;
}

/// What a request resolved to.
pub enum Target<'a> {
    Handler(&'a dyn Handler),
    Fallback(&'a dyn Fallback),
    NotFound,
}

pub struct Router {
    routes: HashMap<(Method, String), Arc<dyn Handler>>,
    fallback: Option<Arc<dyn Fallback>>,
    public_paths: HashSet<String>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            fallback: None,
            public_paths: PUBLIC_PATHS.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    /// Registers `handler` for `method` + `path`, replacing any previous one.
    #[must_use]
    pub fn route(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .insert((method, path.to_string()), Arc::new(handler));
        self
    }

    #[must_use]
    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::Get, path, handler)
    }

    #[must_use]
    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::Post, path, handler)
    }

    #[must_use]
    pub fn fallback(mut self, fallback: impl Fallback) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Exempts `path` from the auth gate.
    #[must_use]
    pub fn public(mut self, path: &str) -> Self {
        self.public_paths.insert(path.to_string());
        self
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.contains(path)
    }

    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Target<'_> {
        if let Some(handler) = self.routes.get(&(method.clone(), path.to_string())) {
            return Target::Handler(handler.as_ref());
        }
        match &self.fallback {
            Some(fallback) => Target::Fallback(fallback.as_ref()),
            None => Target::NotFound,
        }
    }
}
