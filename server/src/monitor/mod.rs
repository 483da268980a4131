pub mod health;

pub use health::{LivenessMonitor, LIVENESS_TIMEOUT};
