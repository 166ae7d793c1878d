//! tomo-server: Companion coordinator service
//!
//! Wires the crowd, the companions and the messaging layer together on a
//! single task, and connects them to the message relay over WebSocket.

pub mod animation;
pub mod answerer;
pub mod config;
pub mod coordinator;
pub mod logging;
pub mod scene;
pub mod speech;
pub mod ws;

pub use config::ServerConfig;
pub use coordinator::{Coordinator, CoordinatorEvent};
