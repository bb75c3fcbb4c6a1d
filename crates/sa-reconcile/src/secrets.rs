//! Filtering of auto-provisioned token secrets out of a ServiceAccount's
//! `secrets` list.

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::{
	document::{self, AccessError},
	policy::LookupPolicy,
};

/// Name prefix of the token secrets Kubernetes provisions for every
/// ServiceAccount. Those are recreated by the cluster and never restored.
pub const DEFAULT_TOKEN_PREFIX: &str = "default-token-";

/// Returns true if `name` belongs to an auto-provisioned token secret.
pub fn is_default_token(name: &str) -> bool {
	name.starts_with(DEFAULT_TOKEN_PREFIX)
}

/// Drops every entry whose `name` starts with [`DEFAULT_TOKEN_PREFIX`],
/// keeping the relative order of the rest.
///
/// An entry that is not a map with a string `name` is an error under
/// [`LookupPolicy::Strict`] and is kept under [`LookupPolicy::Lenient`].
#[instrument(skip_all, fields(count = secrets.len(), %policy))]
pub fn filter_default_tokens(
	secrets: Vec<Value>,
	policy: LookupPolicy,
) -> Result<Vec<Value>, AccessError> {
	let mut kept = Vec::with_capacity(secrets.len());

	for secret in secrets {
		debug!(%secret, "inspecting secret");

		let name = match secret_name(&secret) {
			Ok(name) => name,
			Err(e) if policy.is_lenient() => {
				warn!(error = %e, %secret, "keeping secret without a readable name");
				kept.push(secret);
				continue;
			}
			Err(e) => return Err(e),
		};

		if is_default_token(name) {
			info!(name, "dropping default token secret");
			continue;
		}
		kept.push(secret);
	}

	Ok(kept)
}

fn secret_name(secret: &Value) -> Result<&str, AccessError> {
	// A null entry is a malformed entry here, not an absent document
	if secret.is_null() {
		return Err(AccessError::TypeMismatch {
			path: "name".to_string(),
			expected: document::Shape::Map,
			found: document::Shape::Null,
		});
	}
	document::get_string(secret, "name")
}
