//! The reconciliation pipeline: normalize both snapshots, filter the backup's
//! token secrets, derive the desired object and preview the patch.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
	document::{self, AccessError, Shape},
	equality::{Equality, SemanticEquality},
	merge_patch::{JsonMergePatch, MergePatcher, PatchError},
	normalize::{normalize, NormalizeError},
	policy::LookupPolicy,
	secrets::filter_default_tokens,
};

/// Which of the two snapshots an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
	InCluster,
	Backup,
}

impl fmt::Display for Side {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Side::InCluster => write!(f, "in-cluster"),
			Side::Backup => write!(f, "backup"),
		}
	}
}

#[derive(Debug, Error)]
pub enum ReconcileError {
	#[error("normalizing {side} object")]
	Normalize {
		side: Side,
		#[source]
		source: NormalizeError,
	},

	#[error("filtering secrets of the backup object")]
	Secrets(#[source] AccessError),

	#[error("merging backup secrets into the desired object")]
	Desired(#[source] AccessError),

	#[error("serializing desired object")]
	Serialize(#[source] serde_json::Error),

	#[error("computing merge patch")]
	Patch(#[from] PatchError),
}

/// A document together with the bytes it was parsed from.
///
/// The patch is computed against the raw in-cluster bytes, i.e. before
/// normalization, so volatile fields show up as deletions.
#[derive(Debug, Clone)]
pub struct Snapshot {
	pub raw: Vec<u8>,
	pub document: Value,
}

impl Snapshot {
	pub fn parse(raw: Vec<u8>) -> Result<Self, serde_json::Error> {
		let document = serde_json::from_slice(&raw)?;
		Ok(Self { raw, document })
	}
}

/// Outcome of comparing the two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
	/// In-cluster object as it was read, before normalization.
	pub incluster_raw: Vec<u8>,
	/// Normalized in-cluster object.
	pub incluster: Value,
	/// Normalized backup object, default tokens filtered out.
	pub backup: Value,
	pub equal: bool,
	/// Only present when the two objects differ.
	pub desired: Option<Value>,
}

impl Reconciliation {
	/// The desired object as JSON, `null` if there is none.
	pub fn desired_raw(&self) -> Result<Vec<u8>, serde_json::Error> {
		serde_json::to_vec(&self.desired)
	}
}

/// Runs the reconciliation pipeline with pluggable equality and merge patch
/// implementations.
#[derive(Debug, Clone, Default)]
pub struct Reconciler<E = SemanticEquality, P = JsonMergePatch> {
	equality: E,
	patcher: P,
	policy: LookupPolicy,
}

impl Reconciler {
	pub fn new(policy: LookupPolicy) -> Self {
		Self::with_capabilities(SemanticEquality, JsonMergePatch, policy)
	}
}

impl<E: Equality, P: MergePatcher> Reconciler<E, P> {
	pub fn with_capabilities(equality: E, patcher: P, policy: LookupPolicy) -> Self {
		Self {
			equality,
			patcher,
			policy,
		}
	}

	pub fn policy(&self) -> LookupPolicy {
		self.policy
	}

	#[instrument(skip_all, fields(policy = %self.policy))]
	pub fn reconcile(
		&self,
		incluster: Snapshot,
		backup: Snapshot,
	) -> Result<Reconciliation, ReconcileError> {
		let Snapshot {
			raw: incluster_raw,
			document: mut incluster,
		} = incluster;
		let mut backup = backup.document;

		normalize(&mut incluster, self.policy).map_err(|source| ReconcileError::Normalize {
			side: Side::InCluster,
			source,
		})?;
		let filtered = self.prepare_backup(&mut backup)?;

		let equal = self.equality.equal(&incluster, &backup);
		info!(equal, "compared in-cluster and backup objects");

		let desired = if equal {
			None
		} else {
			Some(self.desired_document(&incluster, &backup, &filtered)?)
		};

		Ok(Reconciliation {
			incluster_raw,
			incluster,
			backup,
			equal,
			desired,
		})
	}

	/// Previews the merge patch that takes the raw in-cluster object to the
	/// desired one.
	pub fn preview(&self, reconciliation: &Reconciliation) -> Result<Value, ReconcileError> {
		let desired_raw = reconciliation
			.desired_raw()
			.map_err(ReconcileError::Serialize)?;
		Ok(self.preview_patch(&reconciliation.incluster_raw, &desired_raw)?)
	}

	/// Normalizes the backup object and drops its default token secrets.
	///
	/// The filtered list is written back under `secrets` if the backup had
	/// that key, and also returned.
	#[instrument(skip_all)]
	pub fn prepare_backup(&self, backup: &mut Value) -> Result<Vec<Value>, ReconcileError> {
		normalize(backup, self.policy).map_err(|source| ReconcileError::Normalize {
			side: Side::Backup,
			source,
		})?;

		let secrets = match document::get_list_mut(backup, "secrets") {
			Ok(list) => std::mem::take(list),
			Err(AccessError::NotFound { .. }) => {
				debug!("backup has no secrets");
				return Ok(Vec::new());
			}
			Err(e) if self.policy.is_lenient() => {
				warn!(error = %e, "treating backup secrets as empty");
				Vec::new()
			}
			Err(e) => return Err(ReconcileError::Secrets(e)),
		};

		let filtered =
			filter_default_tokens(secrets, self.policy).map_err(ReconcileError::Secrets)?;
		if let Value::Object(map) = backup {
			map.insert("secrets".to_string(), Value::Array(filtered.clone()));
		}

		Ok(filtered)
	}

	/// Builds the object the cluster should converge to: the in-cluster
	/// object, with the backup's `imagePullSecrets` and the filtered backup
	/// secrets appended to its own.
	#[instrument(skip_all, fields(filtered = filtered.len()))]
	pub fn desired_document(
		&self,
		incluster: &Value,
		backup: &Value,
		filtered: &[Value],
	) -> Result<Value, ReconcileError> {
		let mut map = document::root_map(incluster)
			.map_err(ReconcileError::Desired)?
			.clone();

		match backup.get("imagePullSecrets") {
			Some(pull_secrets) => {
				map.insert("imagePullSecrets".to_string(), pull_secrets.clone());
			}
			None => {
				map.shift_remove("imagePullSecrets");
			}
		}

		if filtered.is_empty() {
			return Ok(Value::Object(map));
		}

		let mut secrets = match map.get("secrets") {
			None => Vec::new(),
			Some(Value::Array(list)) => list.clone(),
			Some(other) if self.policy.is_lenient() => {
				warn!(secrets = %other, "replacing malformed in-cluster secrets");
				Vec::new()
			}
			Some(other) => {
				return Err(ReconcileError::Desired(AccessError::TypeMismatch {
					path: "secrets".to_string(),
					expected: Shape::List,
					found: Shape::of(other),
				}))
			}
		};
		secrets.extend_from_slice(filtered);
		map.insert("secrets".to_string(), Value::Array(secrets));

		Ok(Value::Object(map))
	}

	/// Computes the patch taking `original_raw` to `desired_raw`, with no
	/// known current state. A `null` desired object means there is nothing
	/// to reconcile and yields an empty patch.
	#[instrument(skip_all)]
	pub fn preview_patch(&self, original_raw: &[u8], desired_raw: &[u8]) -> Result<Value, PatchError> {
		if matches!(serde_json::from_slice::<Value>(desired_raw), Ok(Value::Null)) {
			debug!("no desired object, nothing to patch");
			return Ok(Value::Object(Map::new()));
		}
		self.patcher.three_way(original_raw, desired_raw, None)
	}
}
