//! Identity, discovery and channel membership on top of a [`DirectoryStore`].

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use protocol::DEFAULT_CHANNEL;
use serde::Serialize;

use crate::db::{DirectoryStore, PeerAddr, PeerRecord, Session};
use crate::error::{DirectoryError, Result};
use crate::session::SessionManager;

/// Projection returned by `GET /me`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MeView {
    pub username: String,
    pub is_registered: bool,
    pub current_channel: Option<String>,
}

pub struct Directory {
    store: Arc<dyn DirectoryStore>,
    sessions: SessionManager,
}

impl Directory {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self {
            sessions: SessionManager::new(store.clone()),
            store,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Session> {
        let user = self
            .store
            .get_user(username)?
            .ok_or(DirectoryError::UnknownUser)?;

        if !user.verify_password(password) {
            log::warn!("Failed login attempt for user: {}", username);
            return Err(DirectoryError::InvalidCredentials);
        }

        let session = self.sessions.create_session(username)?;
        log::info!("Successful login for user: {}", username);
        Ok(session)
    }

    /// Upserts the caller's address and puts it (back) in the default channel.
    ///
    /// The two writes are separate store calls; an interruption between them
    /// leaves a registered peer without a channel.
    pub fn register(&self, username: &str, ip: IpAddr, port: u16) -> Result<PeerRecord> {
        let addr = PeerAddr::new(ip, port);
        self.store.register_peer(username, addr)?;
        self.store.join_channel(username, DEFAULT_CHANNEL)?;

        log::info!("Registered peer {} at {}", username, addr);
        Ok(PeerRecord {
            username: username.to_string(),
            addr,
        })
    }

    pub fn peers(&self) -> Result<BTreeMap<String, PeerAddr>> {
        Ok(self.store.get_peers()?)
    }

    pub fn create_channel(&self, username: &str, channel: Option<&str>) -> Result<String> {
        self.require_registered(username)?;
        let channel = channel_name(channel)?;

        self.store.register_channel(username, channel)?;
        log::info!("User {} created channel {}", username, channel);
        Ok(channel.to_string())
    }

    pub fn join_channel(&self, username: &str, channel: Option<&str>) -> Result<String> {
        self.require_registered(username)?;
        let channel = channel_name(channel)?;

        self.store.join_channel(username, channel)?;
        log::info!("User {} joined channel {}", username, channel);
        Ok(channel.to_string())
    }

    pub fn quit_channel(&self, username: &str) -> Result<String> {
        self.require_registered(username)?;

        self.store.join_channel(username, DEFAULT_CHANNEL)?;
        log::info!("User {} quit to {}", username, DEFAULT_CHANNEL);
        Ok(DEFAULT_CHANNEL.to_string())
    }

    /// Members of `channel` with their last advertised address, `None` for
    /// members that never registered one.
    pub fn channel_peers(
        &self,
        username: &str,
        channel: Option<&str>,
    ) -> Result<BTreeMap<String, Option<PeerAddr>>> {
        self.require_registered(username)?;
        let channel = channel_name(channel)?;

        let members = self
            .store
            .get_channel(channel)?
            .ok_or(DirectoryError::ChannelNotFound)?;
        let peers = self.store.get_peers()?;

        Ok(members
            .into_iter()
            .map(|member| {
                let addr = peers.get(&member).copied();
                (member, addr)
            })
            .collect())
    }

    pub fn me(&self, username: &str) -> Result<MeView> {
        let is_registered = self.is_registered(username)?;
        let current_channel = if is_registered {
            self.store.channel_of(username)?
        } else {
            None
        };

        Ok(MeView {
            username: username.to_string(),
            is_registered,
            current_channel,
        })
    }

    pub fn channel_list(&self) -> Result<Vec<String>> {
        Ok(self.store.get_channels()?)
    }

    fn is_registered(&self, username: &str) -> Result<bool> {
        Ok(self.store.get_peer(username)?.is_some())
    }

    fn require_registered(&self, username: &str) -> Result<()> {
        if self.is_registered(username)? {
            Ok(())
        } else {
            Err(DirectoryError::NotRegistered)
        }
    }
}

fn channel_name(channel: Option<&str>) -> Result<&str> {
    match channel.map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(DirectoryError::MissingField("channel_name")),
    }
}
