//! Peer agent: directory client, inbound listener, heartbeat and broadcast.

pub mod agent;
pub mod client;
pub mod config;
pub mod delivery;
pub mod error;
pub mod feed;
pub mod heartbeat;
pub mod listener;

pub use agent::{AgentState, PeerAgent};
pub use client::{ChannelPeers, DirectoryClient, MeResponse};
pub use config::{Identity, PeerConfig};
pub use delivery::{format_broadcast, BroadcastReport, Courier};
pub use error::{AgentError, Result};
pub use feed::{FeedLine, FeedReceiver, MessageFeed};
