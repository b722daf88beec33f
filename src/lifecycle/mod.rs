//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Route table → Bind every listener → Spawn accept loops
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain sessions (bounded) → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - All listeners bind before any traffic is accepted
//! - A port that fails to bind aborts startup
//! - Draining has a deadline; sessions still open are dropped with the runtime

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{Proxy, StartupError};
