//! Configuration schema definitions.
//!
//! These types mirror the JSON configuration file one-to-one. Fields that the
//! validator reports individually are kept as `Option` so that a missing value
//! surfaces as a precise validation error instead of a generic parse failure.

use serde::{Deserialize, Serialize};

/// Host id used when a port entry does not name one.
pub const DEFAULT_HOST_ID: &str = "main";

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProxyConfig {
    /// Certificate used to terminate TLS on `raw-tls` ports and on the TLS
    /// leg of HTTP-family ports.
    #[serde(default)]
    pub certificates: Option<CertificateConfig>,

    /// Backend hosts, referenced by id from the port entries.
    #[serde(default)]
    pub hosts: Vec<HostConfig>,

    /// Port bindings, in registration order.
    #[serde(default)]
    pub ports: Option<Vec<PortConfig>>,
}

/// PEM certificate chain and private key paths.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CertificateConfig {
    pub cert: String,
    pub key: String,
}

/// A backend host.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// Logical name referenced by `PortConfig::host`.
    pub id: String,

    /// Hostname or IP, without a port.
    #[serde(default)]
    pub address: Option<String>,
}

/// One configured port binding.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PortConfig {
    /// Inbound port the proxy listens on.
    #[serde(rename = "in", default)]
    pub inbound: Option<u16>,

    /// Port on the backend host.
    #[serde(rename = "out", default)]
    pub outbound: Option<u16>,

    /// One of `http`, `https`, `ws`, `wss`, `raw`, `raw-tls`.
    #[serde(default)]
    pub mode: Option<String>,

    /// Host id; `"main"` when omitted.
    #[serde(default)]
    pub host: Option<String>,

    /// Exact subdomain labels this binding answers for. Absent means any.
    #[serde(default)]
    pub subdomain: Option<Vec<String>>,
}

impl PortConfig {
    /// The host id this port refers to, applying the default.
    pub fn host_id(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST_ID)
    }
}
