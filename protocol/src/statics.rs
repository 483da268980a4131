//! Trivial static-file fallback.

use std::path::{Component, Path, PathBuf};

use crate::request::{Method, Request};
use crate::response::{Response, StatusCode};
use crate::router::Fallback;

const INDEX_FILE: &str = "index.html";

/// Serves files below `root` for GET/HEAD requests.
#[derive(Clone, Debug)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a request path to a file under the root. Paths that try to
    /// leave the root resolve to nothing.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = path.trim_start_matches('/');
        let relative = if relative.is_empty() {
            INDEX_FILE
        } else {
            relative
        };

        let candidate = Path::new(relative);
        if candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(candidate))
    }
}

impl Fallback for StaticFiles {
    fn serve(&self, request: &Request) -> Response {
        if !matches!(request.method, Method::Get | Method::Head) {
            return Response::not_found();
        }

        let Some(path) = self.resolve(&request.path) else {
            log::debug!("rejected static path {}", request.path);
            return Response::not_found();
        };

        match std::fs::read(&path) {
            Ok(bytes) => {
                let mut response = Response::new(StatusCode::OK).with_body(content_type(&path), bytes);
                if request.method == Method::Head {
                    response.body.clear();
                }
                response
            }
            Err(err) => {
                log::debug!("static file {} not served: {}", path.display(), err);
                Response::not_found()
            }
        }
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
