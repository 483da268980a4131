use serde::{Deserialize, Serialize};

pub use protocol::PeerAddr;

/// A provisioned account. The password is compared as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub password: String,
}

impl User {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn verify_password(&self, password: &str) -> bool {
        self.password == password
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub username: String,
}

/// Last advertised address of a user; one per username.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerRecord {
    pub username: String,
    pub addr: PeerAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    /// Members in join order, without duplicates.
    pub members: Vec<String>,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: Vec::new(),
        }
    }

    pub fn contains(&self, username: &str) -> bool {
        self.members.iter().any(|m| m == username)
    }

    pub fn add(&mut self, username: &str) {
        if !self.contains(username) {
            self.members.push(username.to_string());
        }
    }

    pub fn remove(&mut self, username: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != username);
        self.members.len() != before
    }
}
