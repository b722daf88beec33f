//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Plaintext or TLS stream (from the multiplexer)
//!     → server.rs (HTTP/1.1 connection, route selection)
//!     → forward.rs (plain request to backend)
//!       or websocket.rs (upgrade handshake, byte relay)
//!     → response.rs (synthetic error when nothing matches)
//! ```

pub mod forward;
pub mod response;
pub mod server;
pub mod websocket;

pub use forward::ForwardError;
pub use server::{DispatchEngine, DispatchError};
