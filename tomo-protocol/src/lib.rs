//! tomo-protocol: Messaging between companions and their decision process
//!
//! Provides:
//! - Typed wire envelopes for actions, queries, responses and chat
//! - A total router that classifies every inbound frame
//! - The action dispatcher that turns commands into state machine calls
//! - Outbound query correlation with per-call timeouts
//! - Answering inbound queries through a pluggable collaborator

pub mod action;
pub mod config;
pub mod message;
pub mod query;
pub mod responder;
pub mod router;
pub mod transport;

pub use action::ActionDispatcher;
pub use config::ProtocolConfig;
pub use message::{
    ActionCommand, ActionMessage, ChatMessage, OutboundQuery, QueryRequest, QueryResponse,
    QueryResult,
};
pub use query::QueryCorrelator;
pub use responder::{QueryAnswerer, QueryResponder};
pub use router::{ProtocolRouter, RouteDecision};
pub use transport::{ChannelTransport, Transport};
