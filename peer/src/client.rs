//! Typed calls against the directory server's routes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use protocol::{ChannelRequest, PeerAddr, RegisterRequest};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{AgentError, Result};

/// Members of a channel, `None` for those without a registered address.
pub type ChannelPeers = BTreeMap<String, Option<PeerAddr>>;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MeResponse {
    pub status: String,
    pub username: Option<String>,
    #[serde(default)]
    pub is_registered: bool,
    pub current_channel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    login: String,
    reason: Option<String>,
}

/// HTTP client bound to one directory server. The session id taken from
/// `/login`'s `Set-Cookie` is sent back as a `Cookie` header on every call.
#[derive(Clone, Debug)]
pub struct DirectoryClient {
    http: reqwest::Client,
    base: String,
    session_id: Arc<RwLock<Option<String>>>,
}

impl DirectoryClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            session_id: Arc::new(RwLock::new(None)),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url("/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        let issued = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(session_from_set_cookie);

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Login(format!("unreadable reply ({}): {}", status, e)))?;

        match issued {
            Some(session_id) if status == StatusCode::OK && body.login == "success" => {
                *self.session_id.write().await = Some(session_id);
                Ok(())
            }
            _ => Err(AgentError::Login(
                body.reason.unwrap_or_else(|| status.to_string()),
            )),
        }
    }

    pub async fn register(&self, port: u16) -> Result<()> {
        self.post("/register", &RegisterRequest { port })
            .await
            .map(|_| ())
            .map_err(|err| match err {
                AgentError::Rejected { reason, .. } => AgentError::Register(reason),
                other => other,
            })
    }

    pub async fn heartbeat(&self) -> Result<()> {
        self.get("/heartbeat").await.map(|_| ())
    }

    pub async fn create_channel(&self, name: &str) -> Result<String> {
        let value = self
            .post("/channels/create", &ChannelRequest::named(name))
            .await?;
        Ok(channel_field(&value, name))
    }

    pub async fn join_channel(&self, name: &str) -> Result<String> {
        let value = self
            .post("/channels/join", &ChannelRequest::named(name))
            .await?;
        Ok(channel_field(&value, name))
    }

    pub async fn quit_channel(&self) -> Result<String> {
        let value = self.get("/channels/quit").await?;
        Ok(channel_field(&value, protocol::DEFAULT_CHANNEL))
    }

    pub async fn channel_peers(&self, name: &str) -> Result<ChannelPeers> {
        let value = self
            .post("/channels/peers", &ChannelRequest::named(name))
            .await?;
        decode("/channels/peers", value)
    }

    pub async fn me(&self) -> Result<MeResponse> {
        let value = self.get("/me").await?;
        decode("/me", value)
    }

    pub async fn channel_list(&self) -> Result<Vec<String>> {
        let value = self.get("/channels/list").await?;
        match value.get("channels") {
            Some(channels) => decode("/channels/list", channels.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn get(&self, route: &'static str) -> Result<Value> {
        let request = self.with_session(self.http.get(self.url(route))).await;
        read_reply(route, request.send().await?).await
    }

    async fn post<B: serde::Serialize>(&self, route: &'static str, body: &B) -> Result<Value> {
        let request = self.with_session(self.http.post(self.url(route))).await;
        read_reply(route, request.json(body).send().await?).await
    }

    async fn with_session(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session_id.read().await.as_deref() {
            Some(id) => request.header(
                reqwest::header::COOKIE,
                format!("{}={}", protocol::SESSION_COOKIE, id),
            ),
            None => request,
        }
    }
}

/// Turns a non-200 reply or a `{"status": "failed"}` body into
/// [`AgentError::Rejected`].
async fn read_reply(route: &'static str, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if status != StatusCode::OK {
        return Err(AgentError::Rejected {
            route,
            reason: status.to_string(),
        });
    }

    let value: Value = response.json().await?;
    if value.get("status").and_then(Value::as_str) == Some("failed") {
        let reason = value
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("unknown reason")
            .to_string();
        return Err(AgentError::Rejected { route, reason });
    }
    Ok(value)
}

fn session_from_set_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    (name.trim() == protocol::SESSION_COOKIE).then(|| value.trim().to_string())
}

fn decode<T: serde::de::DeserializeOwned>(route: &'static str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| AgentError::Rejected {
        route,
        reason: format!("unexpected reply: {}", e),
    })
}

fn channel_field(value: &Value, fallback: &str) -> String {
    value
        .get("channel")
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}
