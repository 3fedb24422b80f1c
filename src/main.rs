//! Entry point for `udp-arq`.
//!
//! Parses CLI arguments and dispatches into either **send** or **receive**
//! mode.  All protocol work is delegated to the library; `main.rs` owns only
//! process setup (logging, signal handling, argument parsing).

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use udp_arq::config::{ReceiverConfig, SenderConfig, DEFAULT_PORT};
use udp_arq::loss::policy_for;
use udp_arq::sender::Outcome;
use udp_arq::socket::{resolve, unspecified_for, Socket};
use udp_arq::{Receiver, Sender};

/// Selective-acknowledgment sliding-window transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Send a numbered sequence of DATA packets and wait for every ACK.
    Send {
        /// Receiver address (host:port).
        #[arg(short, long, default_value_t = format!("127.0.0.1:{DEFAULT_PORT}"))]
        server: String,
        /// Number of packets to deliver.
        #[arg(short = 'n', long, default_value_t = 200)]
        total: u32,
        /// Maximum packets in flight.
        #[arg(short, long, default_value_t = 16)]
        window: u32,
        /// Retransmit timeout in milliseconds.
        #[arg(long, default_value_t = 200)]
        timeout_ms: u64,
        /// Longest single receive wait in milliseconds.
        #[arg(long, default_value_t = 50)]
        poll_ms: u64,
        /// Log progress every N delivered packets (0 disables).
        #[arg(long, default_value_t = 25)]
        progress: u32,
        /// Give up on a packet after this many retransmissions.
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Acknowledge DATA packets, suppressing some ACKs at random.
    Receive {
        /// Local address to bind.
        #[arg(short, long, default_value_t = format!("0.0.0.0:{DEFAULT_PORT}"))]
        bind: String,
        /// Probability of suppressing each ACK, in [0, 1].
        #[arg(short, long, default_value_t = 0.30)]
        drop_probability: f64,
        /// Seed for reproducible drop decisions.
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let stop = stop_on_ctrl_c();

    match cli.mode {
        Mode::Send {
            server,
            total,
            window,
            timeout_ms,
            poll_ms,
            progress,
            max_retries,
        } => {
            let config = SenderConfig {
                total_packets: total,
                window_size: window,
                timeout: Duration::from_millis(timeout_ms),
                poll_interval: Duration::from_millis(poll_ms),
                progress_interval: progress,
                max_retries,
            };
            let peer = resolve(&server)
                .await
                .with_context(|| format!("resolving {server}"))?;
            let socket = Socket::bind(unspecified_for(peer))
                .await
                .context("binding sender socket")?;
            log::info!("Sending {total} packets to {peer} from {}", socket.local_addr);

            let sender = Sender::new(socket, peer, config).context("invalid sender options")?;
            let report = sender.run(stop).await;
            println!("{report}");
            if report.outcome == Outcome::Cancelled || !report.failed.is_empty() {
                std::process::exit(1);
            }
        }
        Mode::Receive {
            bind,
            drop_probability,
            seed,
        } => {
            let config = ReceiverConfig {
                drop_probability,
                seed,
            };
            config.validate().context("invalid receiver options")?;
            let addr = resolve(&bind)
                .await
                .with_context(|| format!("resolving {bind}"))?;
            let socket = Socket::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            log::info!(
                "Receiving on {} (drop probability {drop_probability})",
                socket.local_addr
            );

            let policy = policy_for(config.drop_probability, config.seed)?;
            let mut receiver = Receiver::new(policy);
            let stats = receiver.serve(&socket, stop).await?;
            println!("{stats:?}");
        }
    }
    Ok(())
}

/// Stop signal that flips to `true` on the first Ctrl-C.
fn stop_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, shutting down");
            let _ = tx.send(true);
        } else {
            // No signal handler: keep the sender alive so the flag stays false.
            std::future::pending::<()>().await;
        }
    });
    rx
}
