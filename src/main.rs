//! Command-line model runner
//!
//! Loads a run configuration (TOML or JSON), executes the model against the
//! registered data sources, and writes the temperature-delta field as a JSON
//! report to a file or stdout.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use arrhenius_core::aggregate::ResultEntry;
use arrhenius_core::config::ModelConfig;
use arrhenius_core::model::{ModelRun, RunSummary};
use arrhenius_core::provider::SourceRegistry;

/// CO2 doubling on a 10 degree grid against the static baseline fields.
const DEFAULT_CONFIG: &str = r#"
iters = 50

[co2]
from = 1.0
to = 2.0

[grid.dims]
lat = 10.0
lon = 10.0
"#;

#[derive(Parser)]
#[command(
    name = "arrhenius",
    about = "Radiative-equilibrium surface temperature change per grid cell"
)]
struct Args {
    /// Run configuration file (.json is JSON, anything else TOML).
    /// Without it, a CO2-doubling run on a 10 degree grid.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the JSON report. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct RunReport {
    summary: RunSummary,
    deltas: Vec<ResultEntry>,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ModelConfig::from_path(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ModelConfig::from_toml_str(DEFAULT_CONFIG)
            .context("parsing built-in configuration")?,
    };

    let registry = SourceRegistry::with_builtins();
    let run = ModelRun::from_registry(&config, &registry).context("configuring model run")?;
    let output = run.run().context("running model")?;

    if let (Some(mean), Some(min), Some(max)) =
        (output.field.mean(), output.field.min(), output.field.max())
    {
        log::info!("delta T: mean {mean:.4} K, min {min:.4} K, max {max:.4} K");
    }

    let report = RunReport {
        summary: output.summary,
        deltas: output.field.to_entries(),
    };
    let document = serde_json::to_string_pretty(&report).context("serializing report")?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, document)
                .with_context(|| format!("writing report to {}", path.display()))?;
            log::info!("report written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(document.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}
