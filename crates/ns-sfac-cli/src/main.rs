//! NextStat scale-factor CLI

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ns_sfac::{EventRecord, ScaleFactorConfig, ScaleFactorProvider, Systematic, TableFile};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nextstat-sf")]
#[command(about = "NextStat - object scale-factor weights from 2-D correction tables")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List objects stored in a table file
    Keys {
        /// Table file (JSON)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Per-event weights for the CT, UP and DN variations
    Weights {
        #[command(flatten)]
        provider: ProviderArgs,

        /// Events (JSON array of `{"collections": {...}}` records)
        #[arg(short, long)]
        events: PathBuf,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Per-object scale factors for one variation
    Factors {
        #[command(flatten)]
        provider: ProviderArgs,

        /// Events (JSON array of `{"collections": {...}}` records)
        #[arg(short, long)]
        events: PathBuf,

        /// Systematic variation (CT, UP, DN)
        #[arg(long, default_value = "CT")]
        sys: Systematic,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ProviderArgs {
    /// Provider config (JSON). Replaces --file/--table/--collection/--sys-fraction.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Table file (JSON)
    #[arg(short, long, required_unless_present = "config")]
    file: Option<PathBuf>,

    /// Table path inside the file (name must contain `abseta_pt_ratio` or `pt_abseta_ratio`)
    #[arg(short, long, required_unless_present = "config")]
    table: Option<String>,

    /// Object collection to weigh
    #[arg(long, default_value = "muons")]
    collection: String,

    /// Flat fractional systematic added in quadrature, in [0, 1)
    #[arg(long, default_value = "0.0")]
    sys_fraction: f64,

    /// Log one line per object while weighing
    #[arg(long)]
    verbose: bool,
}

impl ProviderArgs {
    fn config(&self) -> Result<ScaleFactorConfig> {
        let cfg = match &self.config {
            Some(path) => ScaleFactorConfig::from_path(path)?,
            None => {
                let file = self.file.clone().context("--file is required without --config")?;
                let table = self.table.clone().context("--table is required without --config")?;
                ScaleFactorConfig::new(self.collection.clone(), file, table)
                    .sys_fraction(self.sys_fraction)
            }
        };
        let verbose = cfg.verbose || self.verbose;
        Ok(cfg.verbose(verbose))
    }

    fn provider(&self) -> Result<ScaleFactorProvider> {
        let cfg = self.config()?;
        tracing::info!(file = %cfg.file.display(), table = %cfg.table, "loading scale factors");
        Ok(ScaleFactorProvider::from_config(&cfg)?)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Keys { file } => cmd_keys(&file),
        Commands::Weights { provider, events, output } => {
            cmd_weights(&provider, &events, output.as_ref())
        }
        Commands::Factors { provider, events, sys, output } => {
            cmd_factors(&provider, &events, sys, output.as_ref())
        }
    }
}

fn cmd_keys(file: &PathBuf) -> Result<()> {
    let f = TableFile::open(file)
        .with_context(|| format!("failed to open table file {}", file.display()))?;
    for key in f.list_keys()? {
        println!("{} ({})", key.name, key.class_name);
    }
    Ok(())
}

fn cmd_weights(provider: &ProviderArgs, events: &PathBuf, output: Option<&PathBuf>) -> Result<()> {
    let sf = provider.provider()?;
    let events = load_events(events)?;

    let weights = events.iter().map(|e| sf.weights(e)).collect::<ns_sfac::Result<Vec<_>>>()?;
    tracing::info!(n_events = weights.len(), "weights computed");

    write_json(output, serde_json::to_value(weights)?)
}

fn cmd_factors(
    provider: &ProviderArgs,
    events: &PathBuf,
    sys: Systematic,
    output: Option<&PathBuf>,
) -> Result<()> {
    let sf = provider.provider()?;
    let events = load_events(events)?;

    let factors =
        events.iter().map(|e| sf.factors(e, sys)).collect::<ns_sfac::Result<Vec<_>>>()?;

    write_json(output, serde_json::json!({ "sys": sys, "factors": factors }))
}

fn load_events(path: &PathBuf) -> Result<Vec<EventRecord>> {
    tracing::info!(path = %path.display(), "loading events");
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read events {}", path.display()))?;
    let events: Vec<EventRecord> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse events {}", path.display()))?;
    tracing::debug!(n_events = events.len(), "events loaded");
    Ok(events)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
