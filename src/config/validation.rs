//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (ports reference existing hosts)
//! - Enforce exclusive ownership of `raw`/`raw-tls` ports
//! - Require a certificate when any listener terminates TLS
//!
//! # Design Decisions
//! - Fails on the first violation, in input order; errors are not collected
//! - Validation is a pure function: ProxyConfig → Result<Vec<Route>, ValidationError>
//! - Runs before any listener binds

use std::collections::HashMap;

use thiserror::Error;

use crate::config::schema::{PortConfig, ProxyConfig};
use crate::routing::{HttpRoute, Mode, RawRoute, Route, SubdomainFilter};

/// A semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("config [ports] field is empty")]
    MissingPorts,

    #[error("port {index}: [{field}] field is empty")]
    MissingField { index: usize, field: &'static str },

    #[error("port {index}: invalid port mode {mode:?}")]
    InvalidMode { index: usize, mode: String },

    #[error("port {index}: could not find host {host:?}")]
    UnknownHost { index: usize, host: String },

    #[error("port {index}: host {host:?} [address] field is empty")]
    MissingAddress { index: usize, host: String },

    #[error("port {index}: inbound port {port} is already claimed by port {other}; raw modes need the port exclusively")]
    PortConflict { index: usize, other: usize, port: u16 },

    #[error("certificates not provided but port {index} terminates TLS")]
    MissingCertificates { index: usize },
}

/// Validate `config` and resolve every port entry into a typed route.
pub fn validate_config(config: &ProxyConfig) -> Result<Vec<Route>, ValidationError> {
    let ports = config.ports.as_ref().ok_or(ValidationError::MissingPorts)?;

    let mut routes = Vec::with_capacity(ports.len());
    let mut owners = PortOwners::default();
    for (index, port) in ports.iter().enumerate() {
        let route = validate_port(config, index, port)?;
        owners.claim(&route)?;
        routes.push(route);
    }

    if config.certificates.is_none() {
        if let Some(route) = routes.iter().find(|r| r.mode().terminates_tls()) {
            return Err(ValidationError::MissingCertificates {
                index: route.index(),
            });
        }
    }

    Ok(routes)
}

fn validate_port(
    config: &ProxyConfig,
    index: usize,
    port: &PortConfig,
) -> Result<Route, ValidationError> {
    let missing = |field| ValidationError::MissingField { index, field };

    let inbound = port.inbound.ok_or_else(|| missing("in"))?;
    let outbound = port.outbound.ok_or_else(|| missing("out"))?;
    let mode_name = port.mode.as_deref().ok_or_else(|| missing("mode"))?;

    let mode = Mode::from_name(mode_name).ok_or_else(|| ValidationError::InvalidMode {
        index,
        mode: mode_name.to_string(),
    })?;

    let host_id = port.host_id();
    let host = config
        .hosts
        .iter()
        .find(|h| h.id == host_id)
        .ok_or_else(|| ValidationError::UnknownHost {
            index,
            host: host_id.to_string(),
        })?;
    let address = host
        .address
        .as_deref()
        .ok_or_else(|| ValidationError::MissingAddress {
            index,
            host: host_id.to_string(),
        })?;

    let route = if mode.is_http_family() {
        Route::Http(HttpRoute::new(
            index,
            inbound,
            outbound,
            mode,
            host_id,
            address,
            SubdomainFilter::from(port.subdomain.clone()),
        ))
    } else {
        Route::Raw(RawRoute::new(index, inbound, outbound, mode, host_id, address))
    };
    Ok(route)
}

/// First claimant of each inbound port seen so far.
///
/// A raw port may not be shared with any other route, raw or HTTP-family.
#[derive(Default)]
struct PortOwners {
    // port -> (first index, first mode was raw)
    owners: HashMap<u16, (usize, bool)>,
}

impl PortOwners {
    fn claim(&mut self, route: &Route) -> Result<(), ValidationError> {
        let is_raw = !route.mode().is_http_family();
        match self.owners.get(&route.inbound()) {
            Some(&(other, other_raw)) if is_raw || other_raw => Err(ValidationError::PortConflict {
                index: route.index(),
                other,
                port: route.inbound(),
            }),
            Some(_) => Ok(()),
            None => {
                self.owners.insert(route.inbound(), (route.index(), is_raw));
                Ok(())
            }
        }
    }
}
