// Library exports for testing and reuse

pub mod app;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod monitor;
pub mod session;
