use anyhow::{Context, Result};
use clap::Parser;
use sa_diff::{
	output::BrokenPipeGuard,
	preview::{self, PreviewArgs, PreviewOpts},
	telemetry,
};
use tracing::Level;

#[derive(Parser)]
#[command(name = "sa-diff")]
#[command(about = "Compare a ServiceAccount against its backup and preview the merge patch", long_about = None)]
#[command(version)]
struct Cli {
	#[command(flatten)]
	preview: PreviewArgs,

	/// Log level (trace, debug, info, warn, error), falls back to RUST_LOG and then info
	#[arg(long, value_name = "LEVEL")]
	log_level: Option<Level>,
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	telemetry::init(cli.log_level)?;

	let cwd = std::env::current_dir().context("resolving working directory")?;
	let opts = PreviewOpts::resolve(cli.preview, &cwd)?;

	let stdout = BrokenPipeGuard::new(std::io::stdout().lock());
	preview::run(&opts, stdout)
}
