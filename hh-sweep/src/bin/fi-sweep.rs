//! Print the f-I curve as `amplitude frequency` lines (`NaN` when the
//! membrane does not fire repetitively).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use hh_sweep::{FiSweep, SweepConfig};

#[derive(Debug, Parser)]
#[command(name = "fi-sweep", about = "Sweep step-current amplitude and report firing frequency")]
struct Args {
    /// TOML configuration file (defaults to $HH_SWEEP_CONFIG or ./fi_sweep.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the sweep range as `min,max,count`
    #[arg(long, value_parser = parse_range)]
    amplitudes: Option<(f64, f64, usize)>,

    /// Log level written to stderr; `RUST_LOG` directives refine it
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn parse_range(text: &str) -> Result<(f64, f64, usize), String> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected `min,max,count`, got `{}`", text));
    }
    let min = parts[0].parse::<f64>().map_err(|e| format!("min: {}", e))?;
    let max = parts[1].parse::<f64>().map_err(|e| format!("max: {}", e))?;
    let count = parts[2].parse::<usize>().map_err(|e| format!("count: {}", e))?;
    Ok((min, max, count))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(args.log_level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = SweepConfig::load(args.config.as_deref()).context("loading sweep configuration")?;
    if let Some((min, max, count)) = args.amplitudes {
        config.sweep.amplitude_min = min;
        config.sweep.amplitude_max = max;
        config.sweep.amplitude_count = count;
    }

    let mut sweep = FiSweep::new(config).context("configuring sweep")?;
    info!(points = sweep.amplitudes().len(), "starting f-I sweep");

    for point in sweep.run()? {
        println!("{} {}", point.amplitude, point.frequency.unwrap_or(f64::NAN));
    }
    Ok(())
}
