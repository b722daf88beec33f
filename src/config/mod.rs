//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks, typed routes)
//!     → routing::RouteTable (validated, immutable)
//!     → shared via Arc to every listener
//! ```
//!
//! # Design Decisions
//! - Config is loaded once; there is no reload path
//! - Validation separates syntactic (serde) from semantic checks
//! - Any configuration error is fatal before a single port is bound

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{CertificateConfig, HostConfig, PortConfig, ProxyConfig};
pub use validation::{validate_config, ValidationError};
