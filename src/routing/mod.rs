//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ProxyConfig
//!     → config::validation (fail fast, typed routes)
//!     → table.rs (raw routes + HTTP routes grouped per inbound port)
//!     → Freeze as immutable RouteTable
//!
//! Per request (HTTP-family ports):
//!     Host header
//!     → matcher.rs (subdomain labels)
//!     → router.rs (first matching route on the request's leg)
//!     → Return: matched HttpRoute or no match
//! ```
//!
//! # Design Decisions
//! - Routes grouped at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod router;
pub mod table;

pub use matcher::{resolve_subdomain, SubdomainFilter};
pub use router::{Leg, LogicalPort};
pub use table::{HttpRoute, Mode, RawRoute, Route, RouteTable, Target};
