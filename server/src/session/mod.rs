pub mod manager;

pub use manager::{generate_session_id, SessionManager, SESSION_ID_LEN};
