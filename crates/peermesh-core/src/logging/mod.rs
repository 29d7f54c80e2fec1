//! Per-node JSONL logging.
//!
//! Console output goes through `tracing_subscriber::fmt`. When a log
//! directory is given, a [`JsonlLayer`] is stacked next to it and every
//! event is also appended to that node's own file:
//!
//! ```text
//! logs/
//! └── raw/                              # one file per node per day
//!     ├── 2026-10-19_love.jsonl
//!     └── 2026-10-19_joy.jsonl
//! ```
//!
//! Several peers on one machine can share a log directory without
//! interleaving writes. To follow the mesh as a whole:
//!
//! ```bash
//! # Every gossip round
//! jq 'select(.msg == "Gossiped peer list")' logs/raw/*.jsonl
//!
//! # Mesh-wide timeline
//! cat logs/raw/*.jsonl | jq -s 'sort_by(.ts)'
//! ```

pub mod entry;
pub mod layer;
pub mod writer;

pub use entry::LogEntry;
pub use layer::JsonlLayer;
pub use writer::InstanceLogWriter;

use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::EnvFilter;

/// Default filter directive for a `-v` count
pub fn filter_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber: console output filtered by `RUST_LOG`
/// (or `verbosity` when unset), plus the JSONL layer if given.
pub fn init(verbosity: u8, jsonl: Option<JsonlLayer>) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_for_verbosity(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(jsonl)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_for_verbosity() {
        assert_eq!(filter_for_verbosity(0), "warn");
        assert_eq!(filter_for_verbosity(1), "info");
        assert_eq!(filter_for_verbosity(2), "debug");
        assert_eq!(filter_for_verbosity(9), "trace");
    }
}
