use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};
use server::app::{self, DirectoryServer};
use server::config::ServerConfig;
use server::db::{MemoryStore, User};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

struct TestServer {
    server: DirectoryServer,
    base: String,
    client: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    async fn start_with(config: ServerConfig) -> Self {
        let store = MemoryStore::new(vec![User::new("alice", "p1"), User::new("bob", "p2")]);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = app::serve_on(listener, &config, Arc::new(store)).unwrap();
        let base = format!("http://{}", server.local_addr());

        Self {
            server,
            base,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .unwrap()
    }

    /// Logs in and returns the `session_id=...` cookie pair.
    async fn session(&self, username: &str, password: &str) -> String {
        let resp = self.login(username, password).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let set_cookie = resp
            .headers()
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn get(&self, path: &str, cookie: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .header("Cookie", cookie)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, cookie: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .header("Cookie", cookie)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let ts = TestServer::start().await;

    let resp = ts.login("alice", "p1").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = resp
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session_id="));
    assert!(cookie.ends_with("; Path=/; HttpOnly"));

    let id = cookie
        .trim_start_matches("session_id=")
        .split(';')
        .next()
        .unwrap();
    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["login"], "success");

    ts.server.shutdown().await;
}

#[tokio::test]
async fn test_login_failure_is_401() {
    let ts = TestServer::start().await;

    let resp = ts.login("alice", "wrong").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get("set-cookie").is_none());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"login": "failed", "reason": "invalid credentials"}));

    let resp = ts.login("nobody", "p1").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], "unknown user");

    assert_eq!(ts.server.directory().sessions().active_sessions().unwrap(), 0);
    ts.server.shutdown().await;
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let ts = TestServer::start().await;

    for path in ["/get-peers", "/me", "/channels/list", "/heartbeat"] {
        let resp = ts.client.get(ts.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", path);
        let body = resp.text().await.unwrap();
        assert_eq!(body, protocol::UNAUTHORIZED_BODY);
    }

    let resp = ts
        .client
        .post(ts.url("/register"))
        .header("Cookie", "session_id=forged")
        .json(&json!({"port": 50001}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(ts.server.directory().peers().unwrap().is_empty());

    ts.server.shutdown().await;
}

#[tokio::test]
async fn test_register_and_discover_peers() {
    let ts = TestServer::start().await;
    let alice = ts.session("alice", "p1").await;
    let bob = ts.session("bob", "p2").await;

    let (status, body) = ts.post("/register", &alice, json!({"port": 50001})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "registered", "peer": "alice"}));
    ts.post("/register", &bob, json!({"port": "50002"})).await;

    let (_, peers) = ts.get("/get-peers", &alice).await;
    assert_eq!(
        peers,
        json!({
            "alice": {"ip": "127.0.0.1", "port": 50001},
            "bob": {"ip": "127.0.0.1", "port": 50002},
        })
    );

    let (_, members) = ts
        .post("/channels/peers", &alice, json!({"channel_name": "global"}))
        .await;
    assert_eq!(members, peers);

    ts.server.shutdown().await;
}

#[tokio::test]
async fn test_channel_lifecycle() {
    let ts = TestServer::start().await;
    let alice = ts.session("alice", "p1").await;
    let bob = ts.session("bob", "p2").await;

    let (_, body) = ts
        .post("/channels/create", &alice, json!({"channel_name": "team"}))
        .await;
    assert_eq!(
        body,
        json!({"status": "failed", "reason": "haven't register to the system"})
    );

    ts.post("/register", &alice, json!({"port": 50001})).await;
    ts.post("/register", &bob, json!({"port": 50002})).await;

    let (_, body) = ts
        .post("/channels/create", &alice, json!({"channel_name": "team"}))
        .await;
    assert_eq!(body, json!({"status": "created", "channel": "team"}));

    let (status, body) = ts
        .post("/channels/create", &bob, json!({"channel_name": "team"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "failed", "reason": "Channel already exists"}));

    let (_, body) = ts
        .post("/channels/join", &bob, json!({"channel_name": "team"}))
        .await;
    assert_eq!(body, json!({"status": "joined", "channel": "team"}));

    let (_, members) = ts
        .post("/channels/peers", &bob, json!({"channel_name": "team"}))
        .await;
    assert_eq!(members.as_object().unwrap().len(), 2);

    let (_, me) = ts.get("/me", &bob).await;
    assert_eq!(me["current_channel"], "team");

    let (_, body) = ts.get("/channels/quit", &bob).await;
    assert_eq!(body, json!({"status": "quit", "channel": "global"}));

    let (_, list) = ts.get("/channels/list", &bob).await;
    assert_eq!(list, json!({"status": "ok", "channels": ["global", "team"]}));

    ts.server.shutdown().await;
}

#[tokio::test]
async fn test_heartbeat_feeds_health() {
    let ts = TestServer::start().await;
    let alice = ts.session("alice", "p1").await;

    let (status, body) = ts.get("/heartbeat", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
    assert!(ts.server.monitor().is_online("alice"));

    let (_, health) = ts.get("/health", &alice).await;
    assert_eq!(
        health,
        json!({"status": "healthy", "active_sessions": 1, "online_peers": 1})
    );

    ts.server.shutdown().await;
}

#[tokio::test]
async fn test_static_login_page_is_public() {
    let mut config = ServerConfig::default();
    config.static_dir = Some(concat!(env!("CARGO_MANIFEST_DIR"), "/static").into());
    let ts = TestServer::start_with(config).await;

    let resp = ts.client.get(ts.url("/login.html")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap().to_str().unwrap(),
        "text/html"
    );
    assert!(resp.text().await.unwrap().contains("action=\"/login\""));

    let resp = ts.client.get(ts.url("/index.html")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    ts.server.shutdown().await;
}

#[tokio::test]
async fn test_malformed_request_gets_no_response() {
    let ts = TestServer::start().await;

    let mut stream = TcpStream::connect(ts.server.local_addr()).await.unwrap();
    stream.write_all(b"this is not a request\r\n\r\n").await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    assert!(buf.is_empty());

    // The listener survives the bad request.
    let resp = ts.login("alice", "p1").await;
    assert_eq!(resp.status(), StatusCode::OK);

    ts.server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let ts = TestServer::start().await;
    let addr = ts.server.local_addr();

    ts.server.shutdown().await;
    ts.server.shutdown().await;

    assert!(TcpStream::connect(addr).await.is_err());
}
