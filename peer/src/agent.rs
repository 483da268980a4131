//! Client-side peer: logs in, serves its own listener, keeps a heartbeat and
//! fans messages out to the rest of its channel.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use protocol::{PeerAddr, SendPeerRequest, ServerHandle, DEFAULT_CHANNEL};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::client::{ChannelPeers, DirectoryClient, MeResponse};
use crate::config::PeerConfig;
use crate::delivery::{format_broadcast, BroadcastReport, Courier};
use crate::error::{AgentError, Result};
use crate::feed::MessageFeed;
use crate::{heartbeat, listener};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Unauthenticated,
    Authenticated,
    Active,
    Shutdown,
}

struct Session {
    state: AgentState,
    username: Option<String>,
    channel: String,
    listener: Option<ServerHandle>,
    /// Last fetched members of `channel`; never authoritative.
    peers: ChannelPeers,
}

struct Inner {
    config: PeerConfig,
    directory: DirectoryClient,
    courier: Courier,
    feed: MessageFeed,
    session: Mutex<Session>,
    token: CancellationToken,
    tracker: TaskTracker,
}

/// Handle to one peer agent. Clones share the same agent.
#[derive(Clone)]
pub struct PeerAgent {
    inner: Arc<Inner>,
}

impl PeerAgent {
    pub fn new(config: PeerConfig, feed: MessageFeed) -> Result<Self> {
        let directory = DirectoryClient::new(&config.api_url, config.request_timeout())?;
        let courier = Courier::new(config.send_timeout())?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                directory,
                courier,
                feed,
                session: Mutex::new(Session {
                    state: AgentState::Unauthenticated,
                    username: None,
                    channel: DEFAULT_CHANNEL.to_string(),
                    listener: None,
                    peers: ChannelPeers::new(),
                }),
                token: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        })
    }

    pub async fn state(&self) -> AgentState {
        self.inner.session.lock().await.state
    }

    pub async fn username(&self) -> Option<String> {
        self.inner.session.lock().await.username.clone()
    }

    pub async fn current_channel(&self) -> String {
        self.inner.session.lock().await.channel.clone()
    }

    pub async fn listener_addr(&self) -> Option<SocketAddr> {
        let session = self.inner.session.lock().await;
        session.listener.as_ref().map(ServerHandle::local_addr)
    }

    pub async fn cached_peers(&self) -> ChannelPeers {
        self.inner.session.lock().await.peers.clone()
    }

    /// Logs in, binds the inbound listener on `port`, then advertises it.
    ///
    /// The listener is up before `/register` so the advertised address never
    /// refuses connections. If registration fails the listener is closed
    /// again; the login itself is kept.
    pub async fn login_and_register(
        &self,
        username: &str,
        password: &str,
        port: u16,
    ) -> Result<SocketAddr> {
        let result = self.start(username, password, port).await;
        self.reported(result)
    }

    async fn start(&self, username: &str, password: &str, port: u16) -> Result<SocketAddr> {
        let state = self.state().await;
        if !matches!(state, AgentState::Unauthenticated | AgentState::Authenticated) {
            return Err(AgentError::InvalidState(state));
        }

        let inner = &self.inner;
        inner.directory.login(username, password).await?;
        {
            let mut session = inner.session.lock().await;
            if session.state == AgentState::Shutdown {
                return Err(AgentError::InvalidState(AgentState::Shutdown));
            }
            session.state = AgentState::Authenticated;
            session.username = Some(username.to_string());
        }
        inner.feed.system(format!("Logged in as {}", username));

        let handle = listener::start(
            &inner.config.listen_host,
            port,
            inner.feed.clone(),
            inner.config.listener_limits(),
        )
        .await?;
        let local_addr = handle.local_addr();

        if let Err(err) = inner.directory.register(local_addr.port()).await {
            handle.shutdown().await;
            return Err(err);
        }

        {
            let mut session = inner.session.lock().await;
            if session.state == AgentState::Shutdown {
                drop(session);
                handle.shutdown().await;
                return Err(AgentError::InvalidState(AgentState::Shutdown));
            }
            session.state = AgentState::Active;
            session.channel = DEFAULT_CHANNEL.to_string();
            session.listener = Some(handle);
        }

        inner.tracker.spawn(heartbeat::run(
            inner.directory.clone(),
            inner.config.heartbeat_interval(),
            inner.token.child_token(),
        ));

        inner.feed.system(format!(
            "Registered on port {}, joined {}",
            local_addr.port(),
            DEFAULT_CHANNEL
        ));
        Ok(local_addr)
    }

    pub async fn create_channel(&self, name: &str) -> Result<()> {
        let result = async {
            self.require_active().await?;
            let channel = self.inner.directory.create_channel(name).await?;
            self.switched_to(channel).await
        }
        .await;
        self.reported(result)
    }

    pub async fn join_channel(&self, name: &str) -> Result<()> {
        let result = async {
            self.require_active().await?;
            let channel = self.inner.directory.join_channel(name).await?;
            self.switched_to(channel).await
        }
        .await;
        self.reported(result)
    }

    pub async fn quit_channel(&self) -> Result<()> {
        let result = async {
            self.require_active().await?;
            let channel = self.inner.directory.quit_channel().await?;
            self.switched_to(channel).await
        }
        .await;
        self.reported(result)
    }

    async fn switched_to(&self, channel: String) -> Result<()> {
        self.inner.session.lock().await.channel = channel.clone();
        self.inner.feed.system(format!("Now in channel {}", channel));
        self.fetch_peers().await.map(|_| ())
    }

    /// Replaces the cached member list of the current channel. Returns how
    /// many members it holds.
    pub async fn refresh_peers(&self) -> Result<usize> {
        let result = async {
            self.require_active().await?;
            self.fetch_peers().await
        }
        .await;
        self.reported(result)
    }

    async fn fetch_peers(&self) -> Result<usize> {
        let channel = self.current_channel().await;
        let peers = self.inner.directory.channel_peers(&channel).await?;
        let count = peers.len();

        let mut session = self.inner.session.lock().await;
        if session.channel == channel {
            session.peers = peers;
        }
        Ok(count)
    }

    pub async fn me(&self) -> Result<MeResponse> {
        let result = async {
            self.require_authenticated().await?;
            self.inner.directory.me().await
        }
        .await;
        self.reported(result)
    }

    pub async fn channel_list(&self) -> Result<Vec<String>> {
        let result = async {
            self.require_authenticated().await?;
            self.inner.directory.channel_list().await
        }
        .await;
        self.reported(result)
    }

    /// Sends `text` to the peer listening at `ip:port`.
    pub async fn send_direct(&self, ip: IpAddr, port: u16, text: &str) -> Result<()> {
        let addr = PeerAddr::new(ip, port);
        let result = async {
            self.require_active().await?;
            let payload = SendPeerRequest {
                message: text.to_string(),
                sender: self.username().await,
            };
            self.inner.courier.send_direct(addr, &payload).await
        }
        .await;

        if result.is_ok() {
            self.inner.feed.system(format!("Delivered to {}", addr));
        }
        self.reported(result)
    }

    /// Sends `message` to every other member of the current channel.
    ///
    /// With `refresh_first` the member list is fetched before sending. With
    /// nobody to send to nothing is sent and [`AgentError::NoPeers`] is
    /// returned. Per-peer failures are counted in the report and fed, not
    /// returned.
    pub async fn broadcast(&self, message: &str, refresh_first: bool) -> Result<BroadcastReport> {
        let result = self.fan_out(message, refresh_first).await;
        self.reported(result)
    }

    async fn fan_out(&self, message: &str, refresh_first: bool) -> Result<BroadcastReport> {
        self.require_active().await?;
        if refresh_first {
            self.fetch_peers().await?;
        }

        let (username, channel, targets) = {
            let session = self.inner.session.lock().await;
            let username = session.username.clone().unwrap_or_default();
            let targets: Vec<(String, PeerAddr)> = session
                .peers
                .iter()
                .filter(|(member, _)| **member != username)
                .filter_map(|(member, addr)| addr.map(|addr| (member.clone(), addr)))
                .collect();
            (username, session.channel.clone(), targets)
        };

        if targets.is_empty() {
            return Err(AgentError::NoPeers(channel));
        }

        let payload = SendPeerRequest {
            message: format_broadcast(&username, &channel, message),
            sender: Some(username),
        };

        let feed = self.inner.feed.clone();
        let report = self
            .inner
            .courier
            .broadcast(targets, payload, &self.inner.tracker, |member, addr, err| {
                feed.error(format!("Send to {} ({}) failed: {}", member, addr, err))
            })
            .await;

        self.inner.feed.system(format!(
            "Broadcast to {}: {}/{} delivered",
            channel, report.delivered, report.attempted
        ));
        Ok(report)
    }

    /// Stops the heartbeat, closes the listener and waits for outstanding
    /// sends. Safe to call in any state, any number of times.
    pub async fn shutdown(&self) {
        let listener = {
            let mut session = self.inner.session.lock().await;
            if session.state == AgentState::Shutdown {
                return;
            }
            session.state = AgentState::Shutdown;
            session.peers.clear();
            session.listener.take()
        };

        self.inner.token.cancel();
        if let Some(listener) = listener {
            listener.shutdown().await;
        }
        self.inner.tracker.close();
        self.inner.tracker.wait().await;

        log::info!("peer agent stopped");
        self.inner.feed.system("Shut down");
    }

    fn reported<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.inner.feed.error(err.to_string());
        }
        result
    }

    async fn require_active(&self) -> Result<()> {
        match self.state().await {
            AgentState::Active => Ok(()),
            other => Err(AgentError::InvalidState(other)),
        }
    }

    async fn require_authenticated(&self) -> Result<()> {
        match self.state().await {
            AgentState::Authenticated | AgentState::Active => Ok(()),
            other => Err(AgentError::InvalidState(other)),
        }
    }
}
