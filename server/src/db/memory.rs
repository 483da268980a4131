use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, RwLock};

use dashmap::DashMap;
use protocol::DEFAULT_CHANNEL;

use super::models::{Channel, PeerAddr, User};
use super::store::{DirectoryStore, StoreError, StoreResult};

/// In-process store. Each registry sits behind its own lock so unrelated
/// mutations never contend; users are fixed at construction.
pub struct MemoryStore {
    users: HashMap<String, User>,
    sessions: DashMap<String, String>,
    peers: RwLock<BTreeMap<String, PeerAddr>>,
    channels: Mutex<BTreeMap<String, Channel>>,
}

impl MemoryStore {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        let users = users
            .into_iter()
            .map(|user| (user.username.clone(), user))
            .collect();

        let mut channels = BTreeMap::new();
        channels.insert(DEFAULT_CHANNEL.to_string(), Channel::new(DEFAULT_CHANNEL));

        Self {
            users,
            sessions: DashMap::new(),
            peers: RwLock::new(BTreeMap::new()),
            channels: Mutex::new(channels),
        }
    }

    fn channels(&self) -> StoreResult<MutexGuard<'_, BTreeMap<String, Channel>>> {
        self.channels.lock().map_err(|_| StoreError::Poisoned("channels"))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn remove_member(channels: &mut BTreeMap<String, Channel>, username: &str) {
    for channel in channels.values_mut() {
        channel.remove(username);
    }
}

impl DirectoryStore for MemoryStore {
    fn get_user(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.users.get(username).cloned())
    }

    fn create_session(&self, session_id: &str, username: &str) -> StoreResult<()> {
        self.sessions
            .insert(session_id.to_string(), username.to_string());
        Ok(())
    }

    fn get_username_by_session(&self, session_id: &str) -> StoreResult<Option<String>> {
        Ok(self.sessions.get(session_id).map(|entry| entry.value().clone()))
    }

    fn session_count(&self) -> StoreResult<usize> {
        Ok(self.sessions.len())
    }

    fn register_peer(&self, username: &str, addr: PeerAddr) -> StoreResult<()> {
        let mut peers = self.peers.write().map_err(|_| StoreError::Poisoned("peers"))?;
        peers.insert(username.to_string(), addr);
        Ok(())
    }

    fn get_peer(&self, username: &str) -> StoreResult<Option<PeerAddr>> {
        let peers = self.peers.read().map_err(|_| StoreError::Poisoned("peers"))?;
        Ok(peers.get(username).copied())
    }

    fn get_peers(&self) -> StoreResult<BTreeMap<String, PeerAddr>> {
        let peers = self.peers.read().map_err(|_| StoreError::Poisoned("peers"))?;
        Ok(peers.clone())
    }

    fn register_channel(&self, owner: &str, channel: &str) -> StoreResult<()> {
        let mut channels = self.channels()?;
        if channels.contains_key(channel) {
            return Err(StoreError::ChannelExists(channel.to_string()));
        }
        remove_member(&mut channels, owner);

        let mut created = Channel::new(channel);
        created.add(owner);
        channels.insert(channel.to_string(), created);
        Ok(())
    }

    fn get_channels(&self) -> StoreResult<Vec<String>> {
        Ok(self.channels()?.keys().cloned().collect())
    }

    fn get_channel(&self, channel: &str) -> StoreResult<Option<Vec<String>>> {
        Ok(self.channels()?.get(channel).map(|c| c.members.clone()))
    }

    fn join_channel(&self, username: &str, channel: &str) -> StoreResult<()> {
        let mut channels = self.channels()?;
        if !channels.contains_key(channel) {
            return Err(StoreError::ChannelNotFound(channel.to_string()));
        }
        remove_member(&mut channels, username);
        if let Some(target) = channels.get_mut(channel) {
            target.add(username);
        }
        Ok(())
    }

    fn quit_channel(&self, username: &str) -> StoreResult<()> {
        remove_member(&mut *self.channels()?, username);
        Ok(())
    }

    fn channel_of(&self, username: &str) -> StoreResult<Option<String>> {
        Ok(self
            .channels()?
            .values()
            .find(|c| c.contains(username))
            .map(|c| c.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(last: u8, port: u16) -> PeerAddr {
        PeerAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)), port)
    }

    #[test]
    fn starts_with_empty_global_channel() {
        let store = MemoryStore::default();
        assert_eq!(store.get_channels().unwrap(), vec!["global".to_string()]);
        assert_eq!(store.get_channel("global").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn register_peer_overwrites_previous_address() {
        let store = MemoryStore::default();
        store.register_peer("alice", addr(1, 50001)).unwrap();
        store.register_peer("alice", addr(2, 50009)).unwrap();

        let peers = store.get_peers().unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers["alice"], addr(2, 50009));
    }

    #[test]
    fn join_moves_user_between_channels() {
        let store = MemoryStore::default();
        store.join_channel("alice", "global").unwrap();
        store.register_channel("bob", "A").unwrap();
        store.register_channel("bob", "B").unwrap();

        store.join_channel("alice", "A").unwrap();
        store.join_channel("alice", "B").unwrap();

        assert_eq!(store.channel_of("alice").unwrap().as_deref(), Some("B"));
        assert_eq!(store.get_channel("A").unwrap(), Some(Vec::new()));
        assert_eq!(
            store.get_channel("B").unwrap(),
            Some(vec!["bob".to_string(), "alice".to_string()])
        );
        assert_eq!(store.get_channel("global").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn joining_same_channel_twice_keeps_one_membership() {
        let store = MemoryStore::default();
        store.join_channel("alice", "global").unwrap();
        store.join_channel("alice", "global").unwrap();
        assert_eq!(
            store.get_channel("global").unwrap(),
            Some(vec!["alice".to_string()])
        );
    }

    #[test]
    fn register_channel_rejects_existing_name() {
        let store = MemoryStore::default();
        store.join_channel("alice", "global").unwrap();

        let err = store.register_channel("alice", "global").unwrap_err();
        assert!(matches!(err, StoreError::ChannelExists(_)));
        assert_eq!(store.channel_of("alice").unwrap().as_deref(), Some("global"));
    }

    #[test]
    fn join_unknown_channel_leaves_membership_untouched() {
        let store = MemoryStore::default();
        store.join_channel("alice", "global").unwrap();

        let err = store.join_channel("alice", "nowhere").unwrap_err();
        assert!(matches!(err, StoreError::ChannelNotFound(_)));
        assert_eq!(store.channel_of("alice").unwrap().as_deref(), Some("global"));
    }

    #[test]
    fn quit_removes_from_every_channel() {
        let store = MemoryStore::default();
        store.register_channel("alice", "team").unwrap();
        store.quit_channel("alice").unwrap();
        assert_eq!(store.channel_of("alice").unwrap(), None);
    }

    #[test]
    fn sessions_resolve_to_usernames() {
        let store = MemoryStore::default();
        store.create_session("abc", "alice").unwrap();
        assert_eq!(
            store.get_username_by_session("abc").unwrap().as_deref(),
            Some("alice")
        );
        assert_eq!(store.get_username_by_session("zzz").unwrap(), None);
        assert_eq!(store.session_count().unwrap(), 1);
    }
}
