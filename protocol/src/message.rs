//! Wire bodies shared by the directory server and peer agents.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Deserializer, Serialize};

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session_id";

/// Channel every newly registered peer lands in.
pub const DEFAULT_CHANNEL: &str = "global";

/// Address a peer advertises for direct delivery.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PeerAddr {
    pub ip: IpAddr,
    pub port: u16,
}

impl PeerAddr {
    #[must_use]
    pub const fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// `POST /register` body. The port may arrive as a number or a numeric string.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub port: u16,
}

/// Body of the `/channels/*` routes that name a channel.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelRequest {
    #[serde(default)]
    pub channel_name: Option<String>,
}

impl ChannelRequest {
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            channel_name: Some(name.to_string()),
        }
    }
}

/// `POST /send-peer` body delivered to a peer's own listener.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendPeerRequest {
    pub message: String,
    #[serde(default)]
    pub sender: Option<String>,
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u16),
        Text(String),
    }

    match RawPort::deserialize(deserializer)? {
        RawPort::Number(port) => Ok(port),
        RawPort::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port {text:?}"))),
    }
}
