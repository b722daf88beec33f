//! Multi-protocol reverse proxy library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use lifecycle::{Proxy, Shutdown};
pub use routing::RouteTable;
