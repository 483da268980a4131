use crate::db::StoreError;

/// Every failure a directory operation can report.
///
/// Auth and validation failures are answered by handlers as
/// `{"status": "failed", "reason": ...}`; only [`DirectoryError::is_fault`]
/// variants escape as a 500.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("unknown user")]
    UnknownUser,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unauthorized")]
    Unauthorized,

    #[error("haven't register to the system")]
    NotRegistered,

    #[error("{0} required")]
    MissingField(&'static str),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("Channel already exists")]
    ChannelExists,

    #[error("Channel does not exist")]
    ChannelNotFound,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl DirectoryError {
    /// Whether this is a server fault rather than a caller mistake.
    pub fn is_fault(&self) -> bool {
        matches!(self, DirectoryError::Store(_) | DirectoryError::Config(_))
    }
}

impl From<StoreError> for DirectoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ChannelExists(_) => DirectoryError::ChannelExists,
            StoreError::ChannelNotFound(_) => DirectoryError::ChannelNotFound,
            other => DirectoryError::Store(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_map_to_validation_errors() {
        let err: DirectoryError = StoreError::ChannelExists("team".into()).into();
        assert!(matches!(err, DirectoryError::ChannelExists));
        assert!(!err.is_fault());

        let err: DirectoryError = StoreError::Poisoned("channels").into();
        assert!(err.is_fault());
    }
}
