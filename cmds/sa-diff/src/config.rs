//! Configuration file support for sa-diff
//!
//! A `.sa-diff.yaml` file may be placed anywhere in the directory hierarchy;
//! sa-diff searches from the working directory upward to the filesystem root.
//! Values given on the command line take precedence over the file.

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use sa_reconcile::LookupPolicy;
use serde::Deserialize;

use crate::output::{ColorMode, OutputFormat};

/// The name of the config file sa-diff looks for
pub const CONFIG_FILE_NAME: &str = ".sa-diff.yaml";

/// Root configuration structure for .sa-diff.yaml
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SaDiffConfig {
	/// In-cluster object, relative to the config file
	#[serde(default)]
	pub incluster: Option<PathBuf>,

	/// Backup object, relative to the config file
	#[serde(default)]
	pub backup: Option<PathBuf>,

	#[serde(default)]
	pub lookup_policy: Option<LookupPolicy>,

	#[serde(default)]
	pub output: Option<OutputFormat>,

	#[serde(default)]
	pub color: Option<ColorMode>,
}

impl SaDiffConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>> {
		if let Some(config_path) = find_config_file(start_dir) {
			let config = Self::load_from_file(&config_path)?;
			Ok(Some(config))
		} else {
			Ok(None)
		}
	}

	/// Load config from a specific file path
	///
	/// Relative document paths are resolved against the directory holding the
	/// file.
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		if content.trim().is_empty() {
			return Ok(Self::default());
		}
		let mut config: Self = serde_yaml::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;

		if let Some(base) = path.parent() {
			config.incluster = config.incluster.map(|p| base.join(p));
			config.backup = config.backup.map(|p| base.join(p));
		}

		Ok(config)
	}

	/// Merge `other` over this config, values set in `other` win
	pub fn merge_from(&mut self, other: Self) {
		if other.incluster.is_some() {
			self.incluster = other.incluster;
		}
		if other.backup.is_some() {
			self.backup = other.backup;
		}
		if other.lookup_policy.is_some() {
			self.lookup_policy = other.lookup_policy;
		}
		if other.output.is_some() {
			self.output = other.output;
		}
		if other.color.is_some() {
			self.color = other.color;
		}
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let mut current = start_dir.to_path_buf();

	// Canonicalize if possible to handle relative paths
	if let Ok(canonical) = current.canonicalize() {
		current = canonical;
	}

	loop {
		let config_path = current.join(CONFIG_FILE_NAME);
		if config_path.is_file() {
			return Some(config_path);
		}

		match current.parent() {
			Some(parent) if parent != current => current = parent.to_path_buf(),
			_ => return None,
		}
	}
}
