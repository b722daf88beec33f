//! Route selection for a logical inbound port.
//!
//! # Responsibilities
//! - Hold the HTTP-family routes sharing one external port
//! - Pick the route for a request given its leg, subdomain and upgrade intent
//!
//! # Design Decisions
//! - Immutable after construction (shared across connections without locks)
//! - First match in registration order wins; overlapping filters are allowed
//! - Explicit `None` rather than a silent default route

use std::fmt;

use crate::routing::table::HttpRoute;

/// Which side of the multiplexer a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leg {
    Plaintext,
    Tls,
}

impl Leg {
    /// Whether the connection was TLS-terminated by the multiplexer.
    pub fn is_tls(&self) -> bool {
        matches!(self, Leg::Tls)
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Leg::Plaintext => "plaintext",
            Leg::Tls => "tls",
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All HTTP-family routes bound to one inbound port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalPort {
    port: u16,
    routes: Vec<HttpRoute>,
}

impl LogicalPort {
    /// An empty group for inbound `port`.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            routes: Vec::new(),
        }
    }

    /// Shared external port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Member routes in registration order.
    pub fn routes(&self) -> &[HttpRoute] {
        &self.routes
    }

    pub(crate) fn push(&mut self, route: HttpRoute) {
        debug_assert_eq!(route.inbound, self.port);
        self.routes.push(route);
    }

    /// Find the route for a request.
    ///
    /// Plaintext requests only see insecure routes and TLS requests only see
    /// secure ones; upgrades additionally require a websocket-capable route.
    pub fn select(&self, leg: Leg, subdomain: &[String], upgrade: bool) -> Option<&HttpRoute> {
        self.routes.iter().find(|route| {
            route.secure == leg.is_tls()
                && (!upgrade || route.websocket)
                && route.subdomain.matches(subdomain)
        })
    }
}
