pub mod memory;
pub mod models;
pub mod store;

pub use memory::MemoryStore;
pub use models::{Channel, PeerAddr, PeerRecord, Session, User};
pub use store::{DirectoryStore, StoreError, StoreResult};
