//! Reading the two snapshots from disk.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use sa_reconcile::Snapshot;
use tracing::{debug, instrument};

/// Reads and parses the JSON object at `path`.
///
/// The file is read once; an unreadable or unparseable file is fatal.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load(path: &Path) -> Result<Snapshot> {
	let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
	debug!(bytes = raw.len(), "read snapshot");
	Snapshot::parse(raw).with_context(|| format!("failed to parse {} as JSON", path.display()))
}
