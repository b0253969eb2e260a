//! gantry - render the APISIX gateway topology as cluster manifests.
//!
//! With no arguments the default topology for namespace `default` is written
//! to stdout as a YAML stream.

use anyhow::Context;
use clap::Parser;
use gantry::constants::NAMESPACE_ENV;
use gantry::{OutputFormat, TopologyOptions};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "gantry")]
#[command(about = "Compose a control plane, data plane and dashboard around one etcd backend", long_about = None)]
#[command(version)]
struct Cli {
    /// Deployment namespace (overrides the config file)
    #[arg(short, long, env = NAMESPACE_ENV)]
    namespace: Option<String>,

    /// Topology options file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Manifest format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    output: OutputFormat,

    /// Write manifests to a file instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also write logs to daily-rotated files in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let options = TopologyOptions::load(cli.config.as_deref())?.with_namespace(cli.namespace);
    let topology = gantry::synthesize(&options)?;
    let rendered = gantry::render_manifests(&topology, cli.output)?;

    match &cli.out {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Wrote manifests");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = gantry::init_logging(cli.verbose, cli.log_dir.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Synthesis failed");
            eprintln!("error: {err:#}");
            ExitCode::from(gantry::exit_code(&err))
        }
    }
}
