//! Transaction Patrol - command line entry point
//!
//! Builds a patrol from the configuration file plus command-line overrides
//! and checks each transaction id given on the command line.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use transaction_patrol::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    patrol::parse_threshold,
    Action,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One `id<TAB>action` line per check
    Text,
    /// One JSON check report per line
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "patrol", version, about = "Lock or allow transactions by fraud probability")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Model artifact (.onnx or .json), overrides [model] path
    #[arg(long)]
    model: Option<PathBuf>,

    /// JSON transaction table, overrides [data] path
    #[arg(long)]
    data: Option<PathBuf>,

    /// Decision threshold in [0, 1], overrides [detection] threshold
    #[arg(long)]
    threshold: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Transaction ids to check
    #[arg(required = true)]
    transaction_ids: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Some(AppConfig::load_from_path(&cli.config)?)
    } else {
        None
    };
    let config_found = config.is_some();
    let mut config = config.unwrap_or_default();
    apply_overrides(&cli, &mut config)?;

    init_logging(&config.logging)?;

    info!("Starting Transaction Patrol");
    if config_found {
        info!(path = %cli.config.display(), "Configuration loaded successfully");
    } else {
        warn!(path = %cli.config.display(), "Configuration file not found, using defaults");
    }

    let patrol = config.build_patrol()?;

    let mut outcomes: BTreeMap<String, usize> = BTreeMap::new();
    for transaction_id in &cli.transaction_ids {
        let report = patrol.check_with_report(transaction_id);

        match cli.output {
            OutputFormat::Text => println!("{}\t{}", transaction_id, report.action),
            OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        }

        let key = match report.action {
            Action::Allow => "allow",
            Action::Lock => "lock",
            Action::Indeterminate => "indeterminate",
        };
        *outcomes.entry(key.to_string()).or_insert(0) += 1;
    }

    info!(
        checked = cli.transaction_ids.len(),
        outcomes = ?outcomes,
        "Patrol finished"
    );

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("transaction_patrol={}", logging.level).parse()?)
        .add_directive(format!("patrol={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Fold command-line overrides into the loaded configuration
fn apply_overrides(cli: &Cli, config: &mut AppConfig) -> Result<()> {
    if let Some(model) = &cli.model {
        config.model.path = model.display().to_string();
    }
    if let Some(data) = &cli.data {
        config.data.path = Some(data.display().to_string());
    }
    if let Some(raw) = &cli.threshold {
        config.detection.threshold = parse_threshold(raw)?;
    }
    Ok(())
}
