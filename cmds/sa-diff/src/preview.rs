//! The preview command: load, reconcile, render.

use std::{
	io::Write,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Args;
use sa_reconcile::{LookupPolicy, Reconciler};
use tracing::{info, instrument};

use crate::{
	config::SaDiffConfig,
	loader,
	output::{ColorMode, OutputFormat, ReportWriter},
};

pub const DEFAULT_INCLUSTER: &str = "incluster.json";
pub const DEFAULT_BACKUP: &str = "backup.json";

#[derive(Args, Debug, Clone, Default)]
pub struct PreviewArgs {
	/// In-cluster object [default: ./incluster.json]
	#[arg(long, value_name = "PATH")]
	pub incluster: Option<PathBuf>,

	/// Backup object [default: ./backup.json]
	#[arg(long, value_name = "PATH")]
	pub backup: Option<PathBuf>,

	/// What to do when metadata or secrets are malformed: "strict" aborts, "lenient" logs and carries on [default: strict]
	#[arg(long, value_name = "POLICY")]
	pub lookup_policy: Option<LookupPolicy>,

	/// Rendering of the documents [default: json]
	#[arg(short, long, value_enum, value_name = "FORMAT")]
	pub output: Option<OutputFormat>,

	/// Controls color in the report [default: auto]
	#[arg(long, value_enum, value_name = "MODE")]
	pub color: Option<ColorMode>,

	/// Also print a unified diff from the in-cluster to the desired object
	#[arg(long)]
	pub diff: bool,

	/// Config file to use instead of searching for .sa-diff.yaml
	#[arg(long, value_name = "PATH")]
	pub config: Option<PathBuf>,
}

/// Fully resolved options: command line, then config file, then defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewOpts {
	pub incluster: PathBuf,
	pub backup: PathBuf,
	pub lookup_policy: LookupPolicy,
	pub output: OutputFormat,
	pub color: ColorMode,
	pub show_diff: bool,
}

impl PreviewOpts {
	/// Resolve `args` against the config file, which is searched for upward
	/// from `cwd` unless given explicitly. Default document paths are relative
	/// to `cwd`.
	pub fn resolve(args: PreviewArgs, cwd: &Path) -> Result<Self> {
		let mut config = match &args.config {
			Some(path) => SaDiffConfig::load_from_file(&cwd.join(path))?,
			None => SaDiffConfig::load_from_directory(cwd)?.unwrap_or_default(),
		};
		config.merge_from(SaDiffConfig {
			incluster: args.incluster.map(|p| cwd.join(p)),
			backup: args.backup.map(|p| cwd.join(p)),
			lookup_policy: args.lookup_policy,
			output: args.output,
			color: args.color,
		});

		Ok(Self {
			incluster: config
				.incluster
				.unwrap_or_else(|| cwd.join(DEFAULT_INCLUSTER)),
			backup: config.backup.unwrap_or_else(|| cwd.join(DEFAULT_BACKUP)),
			lookup_policy: config.lookup_policy.unwrap_or_default(),
			output: config.output.unwrap_or_default(),
			color: config.color.unwrap_or_default(),
			show_diff: args.diff,
		})
	}
}

/// Runs the preview and writes the report to `writer`.
///
/// The comparison is written before the patch is computed, so a patch
/// failure still leaves the normalized objects on screen.
#[instrument(skip_all, fields(incluster = %opts.incluster.display(), backup = %opts.backup.display()))]
pub fn run<W: Write>(opts: &PreviewOpts, writer: W) -> Result<()> {
	let incluster = loader::load(&opts.incluster)?;
	let backup = loader::load(&opts.backup)?;

	let reconciler = Reconciler::new(opts.lookup_policy);
	let reconciliation = reconciler
		.reconcile(incluster, backup)
		.context("reconciling service account")?;

	let mut report = ReportWriter::new(writer, opts.color, opts.output);
	report.write_comparison(&reconciliation, opts.show_diff)?;

	let patch = reconciler.preview(&reconciliation)?;
	info!(empty = patch.as_object().is_some_and(|p| p.is_empty()), "computed merge patch");
	report.write_patch(&patch)?;

	Ok(())
}
