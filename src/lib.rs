// Public API for integration tests and potential library usage

pub mod api;
pub mod automation;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod sse;
pub mod state;
pub mod types;
