//! peermesh CLI
//!
//! Thin wrapper around peermesh-core for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # First peer: prints its id and waits
//! peermesh serve
//!
//! # Every other peer dials the first one
//! peermesh serve --connect <peer id>
//!
//! # Use a self-hosted signaling/relay server
//! peermesh serve --signal-host relay.example.org --signal-port 443
//!
//! # Run a whole mesh in-process and report on it
//! peermesh simulate --peers 5 --message "hello"
//! ```
//!
//! While serving, plain lines are sent as chat messages and lines starting
//! with `/` are commands (`/help` lists them).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use peermesh_core::logging::{self, JsonlLayer};
use peermesh_core::{
    IrohTransport, MemoryNetwork, MeshConfig, MeshEvent, MeshNode, PeerId, SignalingServer,
};
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// peermesh - leader/follower chat mesh
#[derive(Parser)]
#[command(name = "peermesh")]
#[command(version = "0.1.0")]
#[command(about = "Peer-to-peer chat mesh with leader/follower discovery")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the mesh over iroh and chat from stdin
    Serve {
        /// Signaling/relay server host (replaces the default relays)
        #[arg(long)]
        signal_host: Option<String>,

        /// Signaling/relay server port
        #[arg(long, default_value_t = 443)]
        signal_port: u16,

        /// Peer to dial at startup (repeatable)
        #[arg(long = "connect", value_name = "PEER_ID")]
        connect: Vec<String>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also write JSONL logs under this directory
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Instance name used for log files
        #[arg(long)]
        name: Option<String>,
    },

    /// Run a mesh of in-process peers and report on it
    Simulate {
        /// Number of peers
        #[arg(long, default_value_t = 3)]
        peers: usize,

        /// Message sent from the last peer once the mesh has converged
        #[arg(long)]
        message: Option<String>,

        /// Seconds to wait for convergence and delivery
        #[arg(long, default_value_t = 5)]
        timeout: u64,

        /// Print one JSON snapshot per peer instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// One line typed into `serve`
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Send(String),
    Connect(String),
    Peers,
    Role,
    Log,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Input {
    fn parse(raw: &str) -> Self {
        let line = raw.trim();
        if line.is_empty() {
            return Input::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Input::Send(raw.to_string());
        };

        let mut parts = command.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).unwrap_or_default();
        match (name, arg) {
            ("connect", id) if !id.is_empty() => Input::Connect(id.to_string()),
            ("peers", _) => Input::Peers,
            ("role", _) => Input::Role,
            ("log", _) => Input::Log,
            ("help", _) => Input::Help,
            ("quit" | "exit", _) => Input::Quit,
            _ => Input::Unknown(line.to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            signal_host,
            signal_port,
            connect,
            config,
            log_dir,
            name,
        } => {
            let mut config = match config {
                Some(path) => MeshConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => MeshConfig::default(),
            };
            if let Some(host) = signal_host {
                config = config.with_signaling(SignalingServer::new(host, signal_port));
            }
            if let Some(name) = name {
                config = config.with_instance(name);
            }
            for peer in connect {
                config = config.with_bootstrap(PeerId::new(peer));
            }
            config.validate().context("Invalid configuration")?;

            let jsonl = log_dir
                .map(|dir| JsonlLayer::new(&dir, config.instance_name()))
                .transpose()
                .context("Failed to open log directory")?;
            if let Some(layer) = &jsonl {
                println!("Logging {} to {}", layer.instance(), layer.log_path().display());
            }
            logging::init(cli.verbose, jsonl).context("Failed to set up logging")?;

            serve(config).await
        }

        Commands::Simulate {
            peers,
            message,
            timeout,
            json,
        } => {
            logging::init(cli.verbose, None).context("Failed to set up logging")?;
            simulate(peers, message, Duration::from_secs(timeout), json).await
        }
    }
}

async fn serve(config: MeshConfig) -> Result<()> {
    println!("Starting peermesh...");

    let transport = Arc::new(
        IrohTransport::bind(&config)
            .await
            .context("Failed to bind endpoint")?,
    );
    let node = MeshNode::start(transport.clone())?;
    let mut events = node.subscribe();

    println!();
    println!("Peer ID: {}", node.local_id());
    if let Some(server) = &config.signaling {
        println!("Signaling: {}", server.url());
    }
    println!();

    for peer in &config.bootstrap {
        if let Err(e) = node.connect(peer.clone()) {
            eprintln!("Cannot connect to {}: {}", peer, e);
        }
    }

    println!("Type a message and press Enter to send. /help lists commands.");
    println!();

    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin).lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => print_event(&node, &event),
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "Event display fell behind"),
                    Err(RecvError::Closed) => break,
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_input(&node, Input::parse(&line)).await {
                            break;
                        }
                    }
                    Ok(None) => {
                        println!();
                        println!("Input closed, exiting...");
                        break;
                    }
                    Err(e) => eprintln!("Read error: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Received shutdown signal...");
                break;
            }
        }
    }

    println!("Shutting down...");
    node.shutdown();
    transport.shutdown().await;
    Ok(())
}

/// Run one line of input. Returns `false` when the user asked to quit.
async fn handle_input(node: &MeshNode, input: Input) -> bool {
    match input {
        Input::Send(body) => {
            if let Err(e) = node.send_message(body).await {
                eprintln!("Failed to send: {}", e);
            }
        }
        Input::Connect(id) => match node.connect(PeerId::new(id)) {
            Ok(()) => println!("Connecting..."),
            Err(e) => eprintln!("Cannot connect: {}", e),
        },
        Input::Peers => {
            let peers = node.peer_ids();
            println!("{} connection(s):", peers.len());
            for peer in peers {
                println!("  {}", peer);
            }
        }
        Input::Role => println!("Role: {}", node.role()),
        Input::Log => {
            for message in node.messages() {
                println!("{}: {}", message.from().short(), message.body());
            }
        }
        Input::Help => {
            println!("Commands:");
            println!("  /connect <peer id>   dial a peer");
            println!("  /peers               list connections");
            println!("  /role                show this node's role");
            println!("  /log                 show the message log");
            println!("  /quit                exit");
        }
        Input::Quit => return false,
        Input::Empty => {}
        Input::Unknown(line) => eprintln!("Unknown command: {} (try /help)", line),
    }
    true
}

fn print_event(node: &MeshNode, event: &MeshEvent) {
    match event {
        MeshEvent::RoleChanged { role } => println!("* Role: {}", role),
        MeshEvent::PeerConnected {
            peer_id,
            direction,
            peer_count,
        } => println!(
            "* Connected to {} ({}), {} connection(s)",
            peer_id, direction, peer_count
        ),
        MeshEvent::PeerListReceived { undiscovered, .. } if !undiscovered.is_empty() => {
            println!("* Discovered {} new peer(s)", undiscovered.len())
        }
        MeshEvent::MessageReceived { message } => {
            println!("{}: {}", message.from().short(), message.body())
        }
        MeshEvent::MessageSent { message, recipients } => {
            println!("{} (you, to {}): {}", node.local_id().short(), recipients, message.body())
        }
        MeshEvent::EnvelopeRejected { from, reason } => {
            eprintln!("! Rejected envelope from {}: {}", from.short(), reason)
        }
        MeshEvent::TransportError { message, .. } => eprintln!("! {}", message),
        _ => {}
    }
}

async fn simulate(peers: usize, message: Option<String>, wait: Duration, json: bool) -> Result<()> {
    if peers < 2 {
        anyhow::bail!("A mesh needs at least 2 peers (got {})", peers);
    }

    let network = MemoryNetwork::new();
    let nodes = (0..peers)
        .map(|i| MeshNode::start(Arc::new(network.transport(format!("peer-{}", i)))))
        .collect::<Result<Vec<_>, _>>()?;
    info!(peers, "Simulated peers started");

    let hub = nodes[0].local_id().clone();
    for node in &nodes[1..] {
        let joined = nodes[0].peer_ids().len() + 1;
        node.connect(hub.clone())?;
        wait_for(wait, || nodes[0].peer_ids().len() >= joined)
            .await
            .with_context(|| format!("{} never reached {}", node.local_id(), hub))?;
    }

    wait_for(wait, || {
        nodes
            .iter()
            .all(|n| n.snapshot().distinct_peers().len() == peers - 1)
    })
    .await
    .context("Mesh did not converge")?;
    println!("Mesh converged: {} peers, fully connected", peers);

    if let Some(body) = message {
        let sender = &nodes[peers - 1];
        let sent = sender.send_message(body).await?;
        wait_for(wait, || nodes.iter().all(|n| n.messages().contains(&sent)))
            .await
            .context("Message was not delivered to every peer")?;
        println!("Message from {} delivered to every peer", sender.local_id());
    }
    println!();

    for node in &nodes {
        let snapshot = node.snapshot();
        if json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            println!(
                "{:<10} {:<9} peers={} connections={} messages={}",
                snapshot.local_id.to_string(),
                snapshot.role.to_string(),
                snapshot.distinct_peers().len(),
                snapshot.peers.len(),
                snapshot.messages.len()
            );
        }
    }

    for node in &nodes {
        node.shutdown();
    }
    Ok(())
}

/// Poll `done` until it holds or `limit` elapses
async fn wait_for(limit: Duration, mut done: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + limit;
    while !done() {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("Timed out after {:?}", limit);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text_is_a_message() {
        assert_eq!(Input::parse("hello there"), Input::Send("hello there".into()));
        assert_eq!(Input::parse("   "), Input::Empty);
    }

    #[test]
    fn test_parse_keeps_message_whitespace() {
        assert_eq!(Input::parse("  indented "), Input::Send("  indented ".into()));
        assert_eq!(Input::parse("  /peers "), Input::Peers);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Input::parse("/connect abc"), Input::Connect("abc".into()));
        assert_eq!(Input::parse("/peers"), Input::Peers);
        assert_eq!(Input::parse("/role"), Input::Role);
        assert_eq!(Input::parse("/log"), Input::Log);
        assert_eq!(Input::parse("/help"), Input::Help);
        assert_eq!(Input::parse("/quit"), Input::Quit);
        assert_eq!(Input::parse("/exit"), Input::Quit);
    }

    #[test]
    fn test_parse_bad_commands() {
        assert_eq!(Input::parse("/connect"), Input::Unknown("/connect".into()));
        assert_eq!(Input::parse("/dance now"), Input::Unknown("/dance now".into()));
    }

    #[tokio::test]
    async fn test_simulate_rejects_single_peer() {
        assert!(simulate(1, None, Duration::from_secs(1), false).await.is_err());
    }

    #[tokio::test]
    async fn test_simulate_small_mesh() {
        simulate(3, Some("hi".into()), Duration::from_secs(5), false)
            .await
            .unwrap();
    }
}
