use std::collections::BTreeMap;

use super::models::{PeerAddr, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("channel {0:?} already exists")]
    ChannelExists(String),

    #[error("channel {0:?} does not exist")]
    ChannelNotFound(String),

    #[error("{0} registry lock poisoned")]
    Poisoned(&'static str),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Key-value persistence for identities, sessions, peers and channels.
///
/// Each call is atomic on its own; nothing spans two calls. Lookups report
/// absence as `None` or an empty collection, never as an error.
pub trait DirectoryStore: Send + Sync + 'static {
    fn get_user(&self, username: &str) -> StoreResult<Option<User>>;

    fn create_session(&self, session_id: &str, username: &str) -> StoreResult<()>;
    fn get_username_by_session(&self, session_id: &str) -> StoreResult<Option<String>>;
    fn session_count(&self) -> StoreResult<usize>;

    /// Inserts or overwrites the user's address.
    fn register_peer(&self, username: &str, addr: PeerAddr) -> StoreResult<()>;
    fn get_peer(&self, username: &str) -> StoreResult<Option<PeerAddr>>;
    fn get_peers(&self) -> StoreResult<BTreeMap<String, PeerAddr>>;

    /// Creates `channel` with `owner` as its only member, removing the owner
    /// from any previous channel first.
    fn register_channel(&self, owner: &str, channel: &str) -> StoreResult<()>;
    fn get_channels(&self) -> StoreResult<Vec<String>>;
    /// Members of `channel`, or `None` when it does not exist.
    fn get_channel(&self, channel: &str) -> StoreResult<Option<Vec<String>>>;
    /// Moves `username` out of its current channel and into `channel`.
    fn join_channel(&self, username: &str, channel: &str) -> StoreResult<()>;
    /// Removes `username` from whichever channel holds it.
    fn quit_channel(&self, username: &str) -> StoreResult<()>;
    fn channel_of(&self, username: &str) -> StoreResult<Option<String>>;
}
