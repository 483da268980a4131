use crate::agent::AgentState;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Login failed: {0}")]
    Login(String),

    #[error("Registration failed: {0}")]
    Register(String),

    #[error("Failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{route} failed: {reason}")]
    Rejected { route: &'static str, reason: String },

    #[error("No peers in channel {0}")]
    NoPeers(String),

    #[error("Not allowed while {0:?}")]
    InvalidState(AgentState),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
