use std::sync::Arc;

use protocol::{Handler, HandlerResult, RegisterRequest, Request};
use serde_json::json;

use super::{caller, failed, respond};
use crate::directory::Directory;
use crate::error::DirectoryError;

pub struct RegisterHandler {
    directory: Arc<Directory>,
}

impl RegisterHandler {
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory }
    }
}

impl Handler for RegisterHandler {
    fn call(&self, request: &Request) -> HandlerResult {
        let username = match caller(request) {
            Ok(username) => username,
            Err(err) => return Ok(failed(err)),
        };

        // The advertised ip is whatever the connection came from.
        let Some(remote) = request.remote_addr else {
            return Ok(failed(DirectoryError::Unauthorized));
        };

        let body: RegisterRequest = match request.json() {
            Ok(body) => body,
            Err(err) => return Ok(failed(DirectoryError::InvalidBody(err.to_string()))),
        };

        respond(
            self.directory.register(username, remote.ip(), body.port),
            |record| json!({"status": "registered", "peer": record.username}),
        )
    }
}

pub struct GetPeersHandler {
    directory: Arc<Directory>,
}

impl GetPeersHandler {
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory }
    }
}

impl Handler for GetPeersHandler {
    fn call(&self, _request: &Request) -> HandlerResult {
        respond(self.directory.peers(), |peers| json!(peers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use protocol::Outcome;
    use serde_json::Value;

    fn directory() -> Arc<Directory> {
        Arc::new(Directory::new(Arc::new(MemoryStore::default())))
    }

    fn register(directory: &Arc<Directory>, user: Option<&str>, body: &str) -> Value {
        let raw = format!(
            "POST /register HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let mut request = Request::parse(raw.as_bytes())
            .unwrap()
            .with_remote_addr("127.0.0.1:40000".parse().unwrap());
        request.authenticated_user = user.map(str::to_string);

        match RegisterHandler::new(directory.clone()).call(&request).unwrap() {
            Outcome::Json(value) => value,
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_register_uses_connection_ip() {
        let directory = directory();
        let body = register(&directory, Some("alice"), r#"{"port": "50001"}"#);
        assert_eq!(body, json!({"status": "registered", "peer": "alice"}));

        let request = Request::parse(b"GET /get-peers HTTP/1.1\r\n\r\n").unwrap();
        let peers = GetPeersHandler::new(directory).call(&request).unwrap();
        assert_eq!(
            peers,
            Outcome::Json(json!({"alice": {"ip": "127.0.0.1", "port": 50001}}))
        );
    }

    #[test]
    fn test_register_rejects_bad_body_and_missing_user() {
        let directory = directory();

        let body = register(&directory, Some("alice"), r#"{"port": "lots"}"#);
        assert_eq!(body["status"], "failed");

        let body = register(&directory, None, r#"{"port": 50001}"#);
        assert_eq!(body, json!({"status": "failed", "reason": "unauthorized"}));
        assert!(directory.peers().unwrap().is_empty());
    }
}
