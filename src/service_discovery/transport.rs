//! Address formatting for discovered instances

use serde::{Deserialize, Serialize};
use std::fmt;

use super::traits::{DiscoveryError, DiscoveryResult};

/// Transport used to reach discovered instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportProtocol {
    /// Bare `host:port`
    #[default]
    Tcp,
    Http,
    Https,
    Ws,
    Wss,
}

impl TransportProtocol {
    fn scheme(&self) -> Option<&'static str> {
        match self {
            TransportProtocol::Tcp => None,
            TransportProtocol::Http => Some("http://"),
            TransportProtocol::Https => Some("https://"),
            TransportProtocol::Ws => Some("ws://"),
            TransportProtocol::Wss => Some("wss://"),
        }
    }

    /// Prefix the host with this transport's scheme unless it already has one
    pub fn format_address(&self, host: &str) -> String {
        match self.scheme() {
            Some(scheme) if !host.contains("://") => format!("{}{}", scheme, host),
            _ => host.to_string(),
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportProtocol::Tcp => write!(f, "tcp"),
            TransportProtocol::Http => write!(f, "http"),
            TransportProtocol::Https => write!(f, "https"),
            TransportProtocol::Ws => write!(f, "ws"),
            TransportProtocol::Wss => write!(f, "wss"),
        }
    }
}

/// Options shared by discovery providers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryOptions {
    path_suffix: Option<String>,
    require_path_suffix: bool,
}

impl DiscoveryOptions {
    /// Options without a path suffix
    pub fn none() -> Self {
        Self::default()
    }

    /// Append `path` to every discovered address
    pub fn with_path_suffix<P: Into<String>>(path: P) -> Self {
        Self {
            path_suffix: Some(path.into()),
            require_path_suffix: true,
        }
    }

    /// Mark the path suffix as required (or not); validated at provider construction
    pub fn required(mut self, required: bool) -> Self {
        self.require_path_suffix = required;
        self
    }

    /// Reject a required-but-empty path suffix
    pub fn validate(&self) -> DiscoveryResult<()> {
        if self.require_path_suffix && self.path_suffix.as_deref().unwrap_or("").is_empty() {
            return Err(DiscoveryError::EmptyOptionalPath);
        }
        Ok(())
    }

    /// Apply the configured path suffix to an address
    pub fn apply(&self, address: String) -> String {
        match self.path_suffix.as_deref() {
            Some(path) if self.require_path_suffix && !path.is_empty() => join_path(&address, path),
            _ => address,
        }
    }
}

/// Join an address and a path with exactly one slash between them
pub fn join_path(address: &str, path: &str) -> String {
    format!(
        "{}/{}",
        address.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_address() {
        assert_eq!(TransportProtocol::Tcp.format_address("10.0.0.1"), "10.0.0.1");
        assert_eq!(
            TransportProtocol::Http.format_address("10.0.0.1"),
            "http://10.0.0.1"
        );
        assert_eq!(
            TransportProtocol::Wss.format_address("node.local"),
            "wss://node.local"
        );
        assert_eq!(
            TransportProtocol::Https.format_address("http://already"),
            "http://already"
        );
    }

    #[test]
    fn test_join_path_single_slash() {
        assert_eq!(join_path("h:80", "rpc"), "h:80/rpc");
        assert_eq!(join_path("h:80/", "rpc"), "h:80/rpc");
        assert_eq!(join_path("h:80", "/rpc"), "h:80/rpc");
        assert_eq!(join_path("h:80/", "/rpc/v1"), "h:80/rpc/v1");
    }

    #[test]
    fn test_required_path_suffix_validation() {
        assert!(DiscoveryOptions::none().validate().is_ok());
        assert_eq!(
            DiscoveryOptions::with_path_suffix("").validate(),
            Err(DiscoveryError::EmptyOptionalPath)
        );
        assert!(DiscoveryOptions::with_path_suffix("ws").validate().is_ok());
        assert!(DiscoveryOptions::with_path_suffix("")
            .required(false)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_apply_path_suffix() {
        let opts = DiscoveryOptions::with_path_suffix("/ws");
        assert_eq!(opts.apply("http://h:80".to_string()), "http://h:80/ws");
        assert_eq!(
            DiscoveryOptions::none().apply("http://h:80".to_string()),
            "http://h:80"
        );
    }
}
