//! Route table: the validated, immutable view of the configured ports.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::loader::ConfigError;
use crate::config::schema::ProxyConfig;
use crate::config::validation::validate_config;
use crate::routing::matcher::SubdomainFilter;
use crate::routing::router::LogicalPort;

/// Forwarding behavior of a port binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Http,
    Https,
    Ws,
    Wss,
    Raw,
    RawTls,
}

impl Mode {
    /// Parse the configuration spelling of a mode.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "http" => Some(Mode::Http),
            "https" => Some(Mode::Https),
            "ws" => Some(Mode::Ws),
            "wss" => Some(Mode::Wss),
            "raw" => Some(Mode::Raw),
            "raw-tls" => Some(Mode::RawTls),
            _ => None,
        }
    }

    /// Configuration spelling of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Http => "http",
            Mode::Https => "https",
            Mode::Ws => "ws",
            Mode::Wss => "wss",
            Mode::Raw => "raw",
            Mode::RawTls => "raw-tls",
        }
    }

    /// Modes served through the multiplexer and shared between routes.
    pub fn is_http_family(&self) -> bool {
        !matches!(self, Mode::Raw | Mode::RawTls)
    }

    /// HTTP-family modes served on the TLS leg.
    pub fn is_secure(&self) -> bool {
        matches!(self, Mode::Https | Mode::Wss)
    }

    /// HTTP-family modes that accept upgrade requests.
    pub fn is_websocket(&self) -> bool {
        matches!(self, Mode::Ws | Mode::Wss)
    }

    /// Whether inbound connections for this mode need a server certificate.
    pub fn terminates_tls(&self) -> bool {
        matches!(self, Mode::Https | Mode::Wss | Mode::RawTls)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend endpoint of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Hostname or IP of the backend host.
    pub address: String,
    pub port: u16,
    /// Connect to the backend over TLS.
    pub tls: bool,
}

impl Target {
    /// URI scheme used to reach the backend.
    pub fn scheme(&self) -> &'static str {
        if self.tls {
            "https"
        } else {
            "http"
        }
    }

    /// `host:port`, bracketing bare IPv6 literals.
    pub fn authority(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme(), self.authority())
    }
}

/// An HTTP-family route (`http`, `https`, `ws`, `wss`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRoute {
    /// Position of the entry in the `ports` list.
    pub index: usize,
    pub inbound: u16,
    pub mode: Mode,
    pub host_id: String,
    pub target: Target,
    pub subdomain: SubdomainFilter,
    /// Served on the TLS leg only.
    pub secure: bool,
    /// Accepts upgrade requests.
    pub websocket: bool,
}

impl HttpRoute {
    /// Build a route, deriving `secure`, `websocket` and the backend scheme from `mode`.
    pub fn new(
        index: usize,
        inbound: u16,
        outbound: u16,
        mode: Mode,
        host_id: impl Into<String>,
        address: impl Into<String>,
        subdomain: SubdomainFilter,
    ) -> Self {
        let secure = mode.is_secure();
        Self {
            index,
            inbound,
            mode,
            host_id: host_id.into(),
            target: Target {
                address: address.into(),
                port: outbound,
                tls: secure,
            },
            subdomain,
            secure,
            websocket: mode.is_websocket(),
        }
    }
}

/// A `raw` or `raw-tls` route, owning its inbound port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRoute {
    pub index: usize,
    pub inbound: u16,
    pub mode: Mode,
    pub host_id: String,
    pub target: Target,
}

impl RawRoute {
    /// Build a route; `raw-tls` also connects to the backend over TLS.
    pub fn new(
        index: usize,
        inbound: u16,
        outbound: u16,
        mode: Mode,
        host_id: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            index,
            inbound,
            mode,
            host_id: host_id.into(),
            target: Target {
                address: address.into(),
                port: outbound,
                tls: mode == Mode::RawTls,
            },
        }
    }

    /// Terminate TLS on the inbound side.
    pub fn terminates_tls(&self) -> bool {
        self.mode == Mode::RawTls
    }
}

/// A validated port binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Http(HttpRoute),
    Raw(RawRoute),
}

impl Route {
    /// Position of the entry in the `ports` list.
    pub fn index(&self) -> usize {
        match self {
            Route::Http(r) => r.index,
            Route::Raw(r) => r.index,
        }
    }

    /// Listening port of the route.
    pub fn inbound(&self) -> u16 {
        match self {
            Route::Http(r) => r.inbound,
            Route::Raw(r) => r.inbound,
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Route::Http(r) => r.mode,
            Route::Raw(r) => r.mode,
        }
    }

    /// Backend the route forwards to.
    pub fn target(&self) -> &Target {
        match self {
            Route::Http(r) => &r.target,
            Route::Raw(r) => &r.target,
        }
    }
}

/// Immutable routing state built once at startup.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    raw: Vec<RawRoute>,
    http: BTreeMap<u16, LogicalPort>,
}

impl RouteTable {
    /// Validate `config` and build the table. Fails on the first violation.
    pub fn load(config: &ProxyConfig) -> Result<Self, ConfigError> {
        let routes = validate_config(config)?;
        for route in &routes {
            tracing::info!(
                index = route.index(),
                mode = %route.mode(),
                "Registering port {}: self:{} to {}:{} as {}",
                route.index(),
                route.inbound(),
                route.target().address,
                route.target().port,
                route.mode(),
            );
        }
        Ok(Self::from_routes(routes))
    }

    /// Group already validated routes.
    pub fn from_routes(routes: impl IntoIterator<Item = Route>) -> Self {
        let mut table = Self::default();
        for route in routes {
            match route {
                Route::Raw(raw) => table.raw.push(raw),
                Route::Http(http) => table
                    .http
                    .entry(http.inbound)
                    .or_insert_with(|| LogicalPort::new(http.inbound))
                    .push(http),
            }
        }
        table
    }

    /// Routes with mode `raw` or `raw-tls`.
    pub fn raw_routes(&self) -> &[RawRoute] {
        &self.raw
    }

    /// HTTP-family routes grouped by inbound port, in registration order.
    pub fn http_groups_by_port(&self) -> &BTreeMap<u16, LogicalPort> {
        &self.http
    }
}
