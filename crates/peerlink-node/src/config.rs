// ============================================
// File: crates/peerlink-node/src/config.rs
// ============================================
//! # Node Configuration
//!
//! ## Creation Reason
//! Provides configuration management for a peerlink node, loaded from
//! TOML with per-field defaults.
//!
//! ## Main Functionality
//! - `NodeConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - Duration helpers for the millisecond fields
//!
//! ## Configuration Sections
//! - `network`: listen address, dial timeout
//! - `limits`: peer cap, idle deadline, payload cap, handshake timeout
//! - `events`: subscriber mailbox size and delivery policy
//! - `identity`: optional static private key
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [network]
//! listen_addr = "127.0.0.1:9090"
//! dial_timeout_ms = 10000
//!
//! [limits]
//! max_peers_connected = 100
//! peer_deadline_ms = 1800000
//! max_payload_size = 65536
//! handshake_timeout_ms = 10000
//!
//! [events]
//! mailbox_capacity = 64
//! delivery = "block"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require a node restart
//! - Validate config before constructing a `Node`
//! - `identity.private_key` is a secret; keep the file mode restrictive
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use peerlink_core::crypto::StaticKeyPair;
use peerlink_core::MAX_FRAME_SIZE;

use crate::error::{NodeError, Result};

// ============================================
// NodeConfig
// ============================================

/// Main node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Event delivery configuration.
    #[serde(default)]
    pub events: EventsConfig,

    /// Static identity configuration.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NodeConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| NodeError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| NodeError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the string cannot be parsed or validated.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| NodeError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        self.limits.validate()?;
        self.events.validate()?;
        self.identity.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

// ============================================
// NetworkConfig
// ============================================

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address the node listens on (`ip:port`; port 0 picks one).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Connect timeout for outbound dials, in milliseconds.
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,
}

fn default_listen_addr() -> String {
    "127.0.0.1:9090".to_string()
}

fn default_dial_timeout_ms() -> u64 {
    10_000
}

impl NetworkConfig {
    fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(NodeError::config_invalid(
                "network.listen_addr",
                format!("'{}' is not an ip:port socket address", self.listen_addr),
            ));
        }
        if self.dial_timeout_ms == 0 {
            return Err(NodeError::config_invalid(
                "network.dial_timeout_ms",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Dial timeout as a `Duration`.
    #[must_use]
    pub const fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            dial_timeout_ms: default_dial_timeout_ms(),
        }
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Resource limits configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of connected peers.
    #[serde(default = "default_max_peers")]
    pub max_peers_connected: u8,

    /// Idle deadline in milliseconds; re-armed by every successful I/O.
    #[serde(default = "default_peer_deadline_ms")]
    pub peer_deadline_ms: u64,

    /// Maximum plaintext bytes per message.
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: u32,

    /// Upper bound for the whole three-message handshake, in milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

fn default_max_peers() -> u8 {
    100
}

fn default_peer_deadline_ms() -> u64 {
    1_800_000
}

fn default_max_payload_size() -> u32 {
    65_536
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_peers_connected == 0 {
            return Err(NodeError::config_invalid(
                "limits.max_peers_connected",
                "must be greater than 0",
            ));
        }

        if self.peer_deadline_ms == 0 {
            return Err(NodeError::config_invalid(
                "limits.peer_deadline_ms",
                "must be greater than 0",
            ));
        }

        if self.handshake_timeout_ms == 0 {
            return Err(NodeError::config_invalid(
                "limits.handshake_timeout_ms",
                "must be greater than 0",
            ));
        }

        if self.max_payload_size == 0 {
            return Err(NodeError::config_invalid(
                "limits.max_payload_size",
                "must be greater than 0",
            ));
        }

        if self.max_payload_size as usize > MAX_FRAME_SIZE {
            return Err(NodeError::config_invalid(
                "limits.max_payload_size",
                format!("cannot exceed {MAX_FRAME_SIZE} bytes"),
            ));
        }

        Ok(())
    }

    /// Idle deadline as a `Duration`.
    #[must_use]
    pub const fn peer_deadline(&self) -> Duration {
        Duration::from_millis(self.peer_deadline_ms)
    }

    /// Handshake timeout as a `Duration`.
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Maximum plaintext size in bytes.
    #[must_use]
    pub const fn max_payload(&self) -> usize {
        self.max_payload_size as usize
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_peers_connected: default_max_peers(),
            peer_deadline_ms: default_peer_deadline_ms(),
            max_payload_size: default_max_payload_size(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

// ============================================
// EventsConfig
// ============================================

/// What a subscriber does with a signal when its mailbox is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Wait for room; the publisher slows down, nothing is dropped.
    #[default]
    Block,
    /// Drop the signal immediately.
    DropNewest,
}

/// Event delivery configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Per-subscriber mailbox size.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Full-mailbox policy.
    #[serde(default)]
    pub delivery: DeliveryPolicy,
}

fn default_mailbox_capacity() -> usize {
    64
}

impl EventsConfig {
    fn validate(&self) -> Result<()> {
        if self.mailbox_capacity == 0 {
            return Err(NodeError::config_invalid(
                "events.mailbox_capacity",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            delivery: DeliveryPolicy::default(),
        }
    }
}

// ============================================
// IdentityConfig
// ============================================

/// Static identity configuration section.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base64 X25519 private key. A fresh key is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl IdentityConfig {
    fn validate(&self) -> Result<()> {
        self.load().map(|_| ())
    }

    /// Returns the configured key pair, if any.
    ///
    /// # Errors
    /// `ConfigInvalid` if the key is not base64 of exactly 32 bytes.
    pub fn load(&self) -> Result<Option<StaticKeyPair>> {
        self.private_key
            .as_deref()
            .map(|encoded| {
                StaticKeyPair::from_base64(encoded)
                    .map_err(|e| NodeError::config_invalid("identity.private_key", e.to_string()))
            })
            .transpose()
    }
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.network.listen_addr, "127.0.0.1:9090");
        assert_eq!(config.limits.max_peers_connected, 100);
        assert_eq!(config.limits.peer_deadline(), Duration::from_secs(1800));
        assert_eq!(config.events.delivery, DeliveryPolicy::Block);
    }

    #[test]
    fn test_full_config_format() {
        let key = StaticKeyPair::generate();
        let toml = format!(
            r#"
            [network]
            listen_addr = "0.0.0.0:7000"
            dial_timeout_ms = 2500

            [limits]
            max_peers_connected = 8
            peer_deadline_ms = 60000
            max_payload_size = 1024
            handshake_timeout_ms = 3000

            [events]
            mailbox_capacity = 4
            delivery = "drop_newest"

            [identity]
            private_key = "{}"

            [logging]
            level = "debug"
        "#,
            key.to_base64()
        );

        let config = NodeConfig::from_str(&toml).unwrap();
        assert_eq!(config.network.dial_timeout(), Duration::from_millis(2500));
        assert_eq!(config.limits.max_peers_connected, 8);
        assert_eq!(config.limits.max_payload(), 1024);
        assert_eq!(config.events.delivery, DeliveryPolicy::DropNewest);
        assert_eq!(config.logging.level, "debug");

        let loaded = config.identity.load().unwrap().unwrap();
        assert_eq!(loaded.public_key(), key.public_key());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = NodeConfig::from_str("[limits]\nmax_peers_connected = 2\n").unwrap();
        assert_eq!(config.limits.max_peers_connected, 2);
        assert_eq!(config.limits.max_payload_size, 65_536);
        assert_eq!(config.events.mailbox_capacity, 64);
        assert!(config.identity.private_key.is_none());
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            "[network]\nlisten_addr = \"localhost\"\n",
            "[limits]\nmax_peers_connected = 0\n",
            "[limits]\npeer_deadline_ms = 0\n",
            "[limits]\nmax_payload_size = 0\n",
            "[limits]\nmax_payload_size = 4294967295\n",
            "[events]\nmailbox_capacity = 0\n",
            "[identity]\nprivate_key = \"AAAA\"\n",
        ];
        for case in cases {
            let err = NodeConfig::from_str(case).unwrap_err();
            assert!(err.is_config_error(), "{case}: {err}");
        }
    }

    #[test]
    fn test_identity_debug_is_redacted() {
        let config = IdentityConfig {
            private_key: Some(StaticKeyPair::generate().to_base64()),
        };
        assert!(format!("{config:?}").contains("REDACTED"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = NodeConfig::default();
        let reparsed = NodeConfig::from_str(&config.to_toml()).unwrap();
        assert_eq!(reparsed.network.listen_addr, config.network.listen_addr);
    }
}
