//! Supernode configuration consumed by the registry.

/// Prefix of the client ids the supernode generates for its own CDN downloads.
pub const SUPER_CLIENT_PREFIX: &str = "cdnnode:";

/// Lookup of the identities reserved by the supernode itself.
///
/// Fetch tasks registered under those identities are internal (CDN) downloads and are left out of some metrics.
pub trait ReservedIdentities: Send + Sync {
    /// Whether `peer_id` is the supernode's own peer.
    fn is_reserved_peer(&self, peer_id: &str) -> bool;

    /// Whether `cid` is a client id issued by the supernode.
    fn is_reserved_client(&self, cid: &str) -> bool;
}

/// Supernode configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The peer id the supernode registered itself with, once known.
    super_peer_id: Option<String>,
    /// Client ids starting with this prefix belong to the supernode.
    super_client_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            super_peer_id: None,
            super_client_prefix: SUPER_CLIENT_PREFIX.to_owned(),
        }
    }
}

impl Config {
    /// Build a new `Config` with the supernode's own peer id.
    #[inline]
    pub fn with_super_peer_id(self, peer_id: impl Into<String>) -> Self {
        Self {
            super_peer_id: Some(peer_id.into()),
            ..self
        }
    }

    /// Build a new `Config` with another client id prefix.
    #[inline]
    pub fn with_super_client_prefix(self, prefix: impl Into<String>) -> Self {
        Self {
            super_client_prefix: prefix.into(),
            ..self
        }
    }
}

impl ReservedIdentities for Config {
    #[inline]
    fn is_reserved_peer(&self, peer_id: &str) -> bool {
        self.super_peer_id.as_deref() == Some(peer_id)
    }

    #[inline]
    fn is_reserved_client(&self, cid: &str) -> bool {
        cid.starts_with(&self.super_client_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_identities() {
        let config = Config::default();

        assert!(!config.is_reserved_peer("peer"));
        assert!(config.is_reserved_client("cdnnode:10.0.0.1~0"));
        assert!(!config.is_reserved_client("10.0.0.1-1234-1"));

        let config = config.with_super_peer_id("supernode-peer");

        assert!(config.is_reserved_peer("supernode-peer"));
        assert!(!config.is_reserved_peer("supernode-peer-2"));
    }

    #[test]
    fn test_custom_prefix() {
        let config = Config::default().with_super_client_prefix("cdn/");

        assert!(config.is_reserved_client("cdn/1"));
        assert!(!config.is_reserved_client("cdnnode:1"));
    }
}
