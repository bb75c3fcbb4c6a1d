//! Stripping of volatile fields, so that two independently read copies of the
//! same object become comparable.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::{
	document::{self, AccessError},
	policy::LookupPolicy,
};

/// Metadata keys that survive normalization. Everything else under `metadata`
/// (uid, resourceVersion, creationTimestamp, managedFields, ...) is assigned
/// by the API server and differs between a live object and its backup.
pub const RETAINED_METADATA_KEYS: &[&str] = &["name", "namespace", "labels", "annotations"];

#[derive(Debug, Error)]
pub enum NormalizeError {
	#[error("reading metadata")]
	Metadata(#[source] AccessError),
}

/// Normalizes `doc` in place and returns it for chaining.
///
/// Only [`RETAINED_METADATA_KEYS`] are kept under `metadata` and the top level
/// `status` is dropped. Applying it twice is the same as applying it once.
#[instrument(skip_all, fields(%policy))]
pub fn normalize(doc: &mut Value, policy: LookupPolicy) -> Result<&mut Value, NormalizeError> {
	// Only a bad metadata value may be tolerated, never a bad document
	document::root_map(doc).map_err(NormalizeError::Metadata)?;

	match document::get_map_mut(doc, "metadata") {
		Ok(metadata) => {
			let before = metadata.len();
			metadata.retain(|key, _| RETAINED_METADATA_KEYS.contains(&key.as_str()));
			debug!(removed = before - metadata.len(), "stripped metadata");
		}
		Err(e) if policy.is_lenient() => {
			warn!(error = %e, "leaving metadata untouched");
		}
		Err(e) => return Err(NormalizeError::Metadata(e)),
	}

	// Status should never be part of a backup anyway, but drop it just in case
	if let Value::Object(map) = doc {
		if map.shift_remove("status").is_some() {
			debug!("removed status");
		}
	}

	Ok(doc)
}
