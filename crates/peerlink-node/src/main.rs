// ============================================
// File: crates/peerlink-node/src/main.rs
// ============================================
//! # PeerLink Node Entry Point
//!
//! ## Creation Reason
//! Command-line front end for running a node by hand.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading
//! - Node execution, with every signal logged
//!
//! ## Usage
//! ```bash
//! # Generate an identity and paste it into the config
//! peerlink-node keygen
//!
//! # Start listening, optionally dialing some peers
//! peerlink-node start --config node.toml --connect 10.0.0.2:9090
//!
//! # Other commands
//! peerlink-node validate --config node.toml
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Without `identity.private_key` every start gets a new identity
//! - Ctrl+C closes the node; peers see `ClosedConnection`
//! - The tracing subscriber is installed exactly once per command;
//!   `start` waits for the config so `logging.level` applies
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use peerlink_node::{EventType, Node, NodeConfig, Signal, StaticKeyPair};

/// Log level until a config says otherwise.
const DEFAULT_LOG_LEVEL: &str = "info";

// ============================================
// CLI Definition
// ============================================

/// PeerLink encrypted peer-to-peer node
#[derive(Parser, Debug)]
#[command(name = "peerlink-node")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the node
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = "peerlink.toml")]
        config: PathBuf,

        /// Peer to dial once listening (repeatable)
        #[arg(long = "connect", value_name = "HOST:PORT")]
        connect: Vec<String>,

        /// Reply to every message with the same payload
        #[arg(long)]
        echo: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "peerlink.toml")]
        config: PathBuf,
    },

    /// Generate a static identity key
    Keygen {
        /// Public key output format: base64 (default), hex
        #[arg(long, default_value = "base64")]
        format: String,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start {
            config,
            connect,
            echo,
        } => cmd_start(config, connect, echo).await,
        Commands::Validate { config } => {
            init_logging(DEFAULT_LOG_LEVEL);
            cmd_validate(&config).await
        }
        Commands::Keygen { format } => {
            init_logging(DEFAULT_LOG_LEVEL);
            cmd_keygen(&format);
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Starts the node and runs until Ctrl+C.
async fn cmd_start(config_path: PathBuf, connect: Vec<String>, echo: bool) -> anyhow::Result<()> {
    let found = config_path.exists();
    let loaded = load_or_default_config(&config_path).await;
    init_logging(startup_log_level(&loaded));
    let config = loaded?;
    if !found {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }

    let node = Node::new(config)?;
    info!("Public key: {}", node.public_key());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut signals = node.signals(async move {
        let _ = stop_rx.await;
    });

    let listener = tokio::spawn({
        let node = node.clone();
        async move { node.listen().await }
    });

    for peer in connect {
        let node = node.clone();
        tokio::spawn(async move {
            if let Err(e) = node.dial(&peer).await {
                warn!(peer = %peer, error = %e, "Dial failed");
            }
        });
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
            next = signals.recv() => match next {
                Some(signal) => log_signal(&signal, echo).await,
                None => break,
            },
        }
    }

    let _ = stop_tx.send(());
    node.close().await;
    listener.await??;
    Ok(())
}

/// Validates configuration file.
async fn cmd_validate(config_path: &Path) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("⚠️  Config file not found: {}", config_path.display());
        println!("   Node will use default values.");
        return Ok(());
    }

    let config = NodeConfig::load(config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("Network:");
    println!("   Listen:            {}", config.network.listen_addr);
    println!("   Dial Timeout:      {}ms", config.network.dial_timeout_ms);
    println!();
    println!("Limits:");
    println!("   Max Peers:         {}", config.limits.max_peers_connected);
    println!("   Peer Deadline:     {}ms", config.limits.peer_deadline_ms);
    println!("   Max Payload:       {} bytes", config.limits.max_payload_size);
    println!("   Handshake Timeout: {}ms", config.limits.handshake_timeout_ms);
    println!();
    println!("Events:");
    println!("   Mailbox:           {}", config.events.mailbox_capacity);
    println!("   Delivery:          {:?}", config.events.delivery);
    println!();
    if let Some(identity) = config.identity.load()? {
        println!("Identity:");
        println!("   Public Key:        {}", identity.public_key());
        println!();
    }

    Ok(())
}

/// Prints a fresh identity as a config snippet.
fn cmd_keygen(format: &str) {
    let identity = StaticKeyPair::generate();
    let public = match format {
        "hex" => hex::encode(identity.public_key().as_bytes()),
        _ => identity.public_key().to_string(),
    };

    println!("# public key: {public}");
    println!("[identity]");
    println!("private_key = \"{}\"", identity.to_base64());
}

// ============================================
// Helper Functions
// ============================================

/// Level to install the subscriber at: the configured one, or the
/// default when the config failed to load (so the failure is logged).
fn startup_log_level(loaded: &anyhow::Result<NodeConfig>) -> &str {
    loaded
        .as_ref()
        .map_or(DEFAULT_LOG_LEVEL, |config| config.logging.level.as_str())
}

/// Initializes the tracing subscriber. `RUST_LOG` wins over `level`.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

/// Loads config or returns default.
async fn load_or_default_config(path: &Path) -> anyhow::Result<NodeConfig> {
    if path.exists() {
        Ok(NodeConfig::load(path).await?)
    } else {
        Ok(NodeConfig::default())
    }
}

async fn log_signal(signal: &Signal, echo: bool) {
    let payload = String::from_utf8_lossy(signal.payload());
    match signal.event() {
        EventType::MessageReceived => {
            let from = signal.peer().map(|p| p.socket().to_string()).unwrap_or_default();
            info!(from = %from, len = signal.payload().len(), "Message: {}", payload);
            if echo {
                if let Err(e) = signal.reply(signal.payload()).await {
                    warn!(error = %e, "Echo failed");
                }
            }
        }
        event => info!(event = %event, "{}", payload),
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_level_follows_config() {
        let mut config = NodeConfig::default();
        config.logging.level = "debug".to_string();
        assert_eq!(startup_log_level(&Ok(config)), "debug");

        let failed: anyhow::Result<NodeConfig> = Err(anyhow::anyhow!("unreadable"));
        assert_eq!(startup_log_level(&failed), DEFAULT_LOG_LEVEL);
    }

    #[tokio::test]
    async fn test_missing_config_uses_defaults() {
        let loaded = load_or_default_config(Path::new("/nonexistent/peerlink.toml"))
            .await
            .unwrap();
        assert_eq!(startup_log_level(&Ok(loaded)), NodeConfig::default().logging.level);
    }
}
