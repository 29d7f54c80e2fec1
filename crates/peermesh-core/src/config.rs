//! Node configuration
//!
//! The only external setting the mesh needs is where to reach the
//! signaling/relay server. Everything else is a convenience for the CLI.
//!
//! ```json
//! {
//!   "signaling": { "host": "relay.example.org", "port": 443 },
//!   "instance": "love",
//!   "bootstrap": ["<peer id>"]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};
use crate::types::PeerId;

/// Signaling/relay server used by the transport to reach other peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingServer {
    /// Host name or IP address
    pub host: String,
    /// Port number
    pub port: u16,
}

impl SignalingServer {
    /// Create a server address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// URL handed to the transport
    pub fn url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }

    /// Reject empty hosts, hosts carrying a scheme, and port zero
    pub fn validate(&self) -> MeshResult<()> {
        if self.host.trim().is_empty() {
            return Err(MeshError::Config("signaling host is empty".to_string()));
        }
        if self.host.contains("://") {
            return Err(MeshError::Config(format!(
                "signaling host '{}' must not include a scheme",
                self.host
            )));
        }
        if self.port == 0 {
            return Err(MeshError::Config("signaling port must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Configuration for a mesh node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Signaling/relay server; `None` uses the transport's defaults
    pub signaling: Option<SignalingServer>,
    /// Label for log files (defaults to a shortened peer id)
    pub instance: Option<String>,
    /// Peers to dial as soon as the node starts
    pub bootstrap: Vec<PeerId>,
}

impl MeshConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> MeshResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: MeshConfig = serde_json::from_str(&raw).map_err(|e| {
            MeshError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Set the signaling server
    pub fn with_signaling(mut self, server: SignalingServer) -> Self {
        self.signaling = Some(server);
        self
    }

    /// Set the instance label
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Add a bootstrap peer
    pub fn with_bootstrap(mut self, peer: PeerId) -> Self {
        self.bootstrap.push(peer);
        self
    }

    /// Check every field
    pub fn validate(&self) -> MeshResult<()> {
        if let Some(server) = &self.signaling {
            server.validate()?;
        }
        if self.bootstrap.iter().any(PeerId::is_empty) {
            return Err(MeshError::Config("bootstrap peer id is empty".to_string()));
        }
        Ok(())
    }

    /// Label for this node's logs; defaults to `peer-<pid>`
    pub fn instance_name(&self) -> String {
        self.instance
            .clone()
            .unwrap_or_else(|| format!("peer-{}", std::process::id()))
    }
}
