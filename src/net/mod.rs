//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, one task per session)
//!     → raw route:  forwarder.rs (optional TLS accept) → connector.rs → splice.rs
//!     → HTTP port:  sniff.rs (peek first byte, optional TLS accept)
//!                   → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Each session tracked for graceful shutdown
//! - TLS is terminated with a single shared certificate
//! - Backend TLS is not verified

pub mod connection;
pub mod connector;
pub mod forwarder;
pub mod listener;
pub mod sniff;
pub mod splice;
pub mod tls;

pub use connection::ConnectionTracker;
pub use connector::BackendConnector;
pub use listener::{Listener, ListenerError, PortHandler};
