use std::net::{Ipv4Addr, SocketAddr};

use crate::ServiceConfig;

/// Listener settings for the HTTP server.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Level of the per-request access log line
    pub access_log_level: tracing::Level,
}

impl Config {
    /// Listen on every interface at the configured port.
    pub fn from_service(service: &ServiceConfig) -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, service.port)),
            access_log_level: tracing::Level::INFO,
        }
    }
}
