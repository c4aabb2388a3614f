//! blipcast – drive publishers and subscribers through one in-process broadcaster.
//
//  $ blipcast run --config blipcast.toml
//  $ blipcast run --publishers 4 --subscribers 16 --messages 50000
use blipcast::config::BroadcasterSettings;
use blipcast::core::DeliveryMode;
use blipcast::logging::init_logging;
use blipcast::workload::{self, WorkloadReport};
use blipcast::{load_config, Config};

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "blipcast", version, about = "BlipCast broadcaster workload driver")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a publish/subscribe workload and print a report.
    Run {
        /// Path to config TOML (env BLIPCAST_CONFIG overrides)
        #[arg(short, long)]
        config: Option<String>,
        /// Number of concurrent publishers
        #[arg(long)]
        publishers: Option<usize>,
        /// Number of subscribers
        #[arg(long)]
        subscribers: Option<usize>,
        /// Messages broadcast by each publisher
        #[arg(long)]
        messages: Option<usize>,
        /// Every n-th subscriber leaves halfway through
        #[arg(long)]
        unsubscribe_every: Option<usize>,
        /// Fan-out strategy
        #[arg(long, value_enum)]
        mode: Option<Mode>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Concurrent,
    Sequential,
}

impl From<Mode> for DeliveryMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Concurrent => DeliveryMode::Concurrent,
            Mode::Sequential => DeliveryMode::Sequential,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.cmd {
        Command::Run {
            config,
            publishers,
            subscribers,
            messages,
            unsubscribe_every,
            mode,
        } => {
            let mut cfg: Config = match std::env::var("BLIPCAST_CONFIG").ok().or(config) {
                Some(path) => load_config(&path)?,
                None => Config::default(),
            };

            if let Some(n) = publishers {
                cfg.workload.publishers = n;
            }
            if let Some(n) = subscribers {
                cfg.workload.subscribers = n;
            }
            if let Some(n) = messages {
                cfg.workload.messages_per_publisher = n;
            }
            if unsubscribe_every.is_some() {
                cfg.workload.unsubscribe_every = unsubscribe_every;
            }
            if let Some(mode) = mode {
                cfg.broadcaster = BroadcasterSettings {
                    delivery_mode: mode.into(),
                };
            }

            let broadcaster = cfg.broadcaster.builder().build();
            let report = workload::run(broadcaster, &cfg.workload).await?;
            print_report(&cfg, &report);
        }
    }
    Ok(())
}

fn print_report(cfg: &Config, report: &WorkloadReport) {
    println!("📡 BlipCast workload ({:?} fan-out)", cfg.broadcaster.delivery_mode);
    println!(
        "   publishers={} subscribers={} messages/publisher={}",
        cfg.workload.publishers, cfg.workload.subscribers, cfg.workload.messages_per_publisher
    );
    println!("   published        {}", report.published);
    println!("   delivered        {}", report.delivered);
    println!("   order violations {}", report.order_violations);
    println!("   elapsed          {:?}", report.elapsed);
    println!("   mean latency     {:?}", report.mean_latency);
    println!("   throughput       {:.0} msg/s", report.throughput());
    for sub in &report.per_subscriber {
        let note = if sub.left_early { " (left early)" } else { "" };
        println!("   {} received {}{}", sub.id, sub.received, note);
    }
}
