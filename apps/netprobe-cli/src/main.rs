use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use netprobe_ops::init_tracing;
use netprobe_orchestrator::NetworkSpeed;
use netprobe_types::{
    config::{LoadStrategy, NetprobeConfig, OpsConfig, ProbeOptions},
    probe::ProbeAttemptResult,
    timing::SpeedInfo,
    NetprobeError,
};
use serde_json::json;
use tracing::warn;

const DEFAULT_CONFIG_PATH: &str = "configs/netprobe.toml";

#[derive(Debug, Parser)]
#[command(name = "netprobe", about = "Estimate throughput by timing a cache-busted probe download")]
struct Cli {
    /// TOML config file.
    #[arg(long, env = "NETPROBE_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long)]
    public_url: Option<String>,
    #[arg(long)]
    local_url: Option<String>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Only probe the public URL.
    #[arg(long)]
    no_fallback: bool,
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
    #[arg(long)]
    fast_mbps: Option<f64>,
    #[arg(long)]
    medium_mbps: Option<f64>,
    #[arg(long)]
    log_level: Option<String>,
    /// Print results as JSON.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Tag,
    Fetch,
}

impl From<StrategyArg> for LoadStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Tag => LoadStrategy::Tag,
            StrategyArg::Fetch => LoadStrategy::Fetch,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run one probe with tier fallback (default).
    Probe,
    /// Run a probe, then list the speed of every loaded resource.
    Resources,
    /// Print every timing entry matching PATTERN while a probe runs.
    Watch { pattern: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    config.validate().context("invalid probe configuration")?;
    init_tracing(&config.ops)?;
    let thresholds = config.probe.thresholds;
    if thresholds.fast_mbps <= thresholds.medium_mbps {
        warn!(
            fast = thresholds.fast_mbps,
            medium = thresholds.medium_mbps,
            "Fast threshold is not above medium; medium will never be reported"
        );
    }

    let speed = NetworkSpeed::new(config.probe.clone())?;
    let json = cli.json;
    match cli.command.unwrap_or(Command::Probe) {
        Command::Probe => {
            let outcome = speed.probe().await;
            report_probe(outcome, json)
        }
        Command::Resources => {
            let outcome = speed.probe().await;
            let speeds = speed.list_loaded_resource_speeds();
            report_resources(&speeds, json)?;
            report_probe(outcome, json)
        }
        Command::Watch { pattern } => {
            let mut handle = speed.subscribe(pattern, move |record| {
                if json {
                    println!("{}", json!({ "entry": record }));
                } else {
                    println!(
                        "entry  {}  {} bytes  {:.2}ms",
                        record.name,
                        record.transfer_size,
                        record.download_time_ms()
                    );
                }
            });
            let outcome = speed.probe().await;
            tokio::task::yield_now().await;
            handle.unsubscribe();
            report_probe(outcome, json)
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<NetprobeConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = match NetprobeConfig::from_file(&path) {
        Ok(cfg) => cfg,
        Err(err) => match &cli.public_url {
            Some(public_url) => {
                if cli.config.is_some() {
                    eprintln!(
                        "Failed to load config from '{}': {err}. Using command-line options.",
                        path.display()
                    );
                }
                NetprobeConfig {
                    probe: ProbeOptions::new(public_url.clone()),
                    ops: OpsConfig::default(),
                }
            }
            None => bail!("{err}; pass --public-url or a config file"),
        },
    };

    let probe = &mut config.probe;
    if let Some(url) = &cli.public_url {
        probe.public_url = url.clone();
    }
    if let Some(url) = &cli.local_url {
        probe.local_url = Some(url.clone());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        probe.timeout_ms = timeout_ms;
    }
    if cli.no_fallback {
        probe.auto_detect_fallback = false;
    }
    if let Some(strategy) = cli.strategy {
        probe.load_strategy = strategy.into();
    }
    if let Some(fast) = cli.fast_mbps {
        probe.thresholds.fast_mbps = fast;
    }
    if let Some(medium) = cli.medium_mbps {
        probe.thresholds.medium_mbps = medium;
    }
    if let Some(level) = &cli.log_level {
        config.ops.log_level = level.clone();
    }
    Ok(config)
}

fn report_probe(outcome: netprobe_types::Result<ProbeAttemptResult>, json: bool) -> Result<()> {
    match outcome {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "{:.2} Mbps ({:.2} KB/s), {} network via {} tier [{} bytes in {:.2}ms from {}]",
                    result.speed_mbps,
                    result.speed_kbps,
                    result.network_type,
                    result.tier(),
                    result.transfer_size_bytes,
                    result.duration_ms,
                    result.resource_url
                );
            }
            Ok(())
        }
        Err(err) => {
            if json {
                println!("{}", failure_json(&err));
            }
            Err(err.into())
        }
    }
}

fn failure_json(err: &NetprobeError) -> serde_json::Value {
    json!({
        "error": err.to_string(),
        "url": err.attempted_url(),
        "cause": err.failure_cause(),
    })
}

fn report_resources(speeds: &[SpeedInfo], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(speeds)?);
        return Ok(());
    }
    if speeds.is_empty() {
        println!("no loaded resources with usable timing");
    }
    for info in speeds {
        println!(
            "{:>10.2} Mbps {:>10.2} KB/s {:>10} bytes  {}",
            info.speed_mbps, info.speed_kbps, info.transfer_size, info.name
        );
    }
    Ok(())
}
