mod common;
mod events;
mod output;
mod peer;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tom_protocol::{Dictionary, NodeId, PeerTable, RuntimeConfig, TrafficConfig};

#[derive(Parser, Debug)]
#[command(name = "tom-peer", about = "Total-order multicast group member")]
struct Cli {
    /// This process's id, 1-based as in the ip table.
    pid: u32,

    /// Peer table: one `<pid> <host> <port>` per line.
    ip_table: PathBuf,

    /// Word list the traffic source draws from.
    dictionary: PathBuf,

    /// Mean generated messages per second.
    #[arg(long, default_value = "1.0")]
    rate: f64,

    /// Wait before the first generated message, in ms.
    #[arg(long, default_value = "1500")]
    startup_delay_ms: u64,

    /// Stop after this many seconds (default: run until Ctrl+C).
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Also write the JSONL stream to a file in this directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Do not generate traffic; only acknowledge and deliver.
    #[arg(long)]
    no_traffic: bool,
}

impl Cli {
    fn runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        if self.pid == 0 {
            anyhow::bail!("pid is 1-based, got 0");
        }
        let peers = PeerTable::load(&self.ip_table)?;
        let words = Dictionary::load(&self.dictionary)?.into_words();

        let traffic = (!self.no_traffic).then(|| TrafficConfig {
            rate_per_sec: self.rate,
            startup_delay: Duration::from_millis(self.startup_delay_ms),
        });

        let config = RuntimeConfig::new(NodeId::new(self.pid - 1), peers, words).traffic(traffic);
        config
            .validate()
            .with_context(|| format!("pid {} cannot start", self.pid))?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let start = Instant::now();

    let config = cli.runtime_config()?;

    if let Some(dir) = &cli.output_dir {
        let path = output::resolve_output_path(dir, cli.pid)?;
        output::init_jsonl_writer(&path)?;
        eprintln!("JSONL output: {}", path.display());
    }

    eprintln!("tom-peer v{}", env!("CARGO_PKG_VERSION"));

    peer::run(
        peer::PeerOptions {
            config,
            duration: cli.duration_secs.map(Duration::from_secs),
        },
        start,
    )
    .await
}
