//! How accessor errors are handled at call sites.

use std::{fmt, str::FromStr};

use serde::Deserialize;
use thiserror::Error;

/// Policy applied when a lookup into `metadata`, `secrets` or a secret's
/// `name` fails.
///
/// An absent document ([`AccessError::NilRoot`](crate::document::AccessError::NilRoot))
/// is always an error, regardless of the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LookupPolicy {
	/// Abort on the first failed lookup.
	#[default]
	Strict,
	/// Log the failure and carry on with the value left as is.
	///
	/// A secret entry without a readable name is kept, a document without
	/// readable metadata is only stripped of its status.
	Lenient,
}

impl LookupPolicy {
	pub fn is_lenient(self) -> bool {
		matches!(self, LookupPolicy::Lenient)
	}
}

#[derive(Debug, Error)]
#[error("unknown lookup policy `{0}`, expected `strict` or `lenient`")]
pub struct ParseLookupPolicyError(String);

impl FromStr for LookupPolicy {
	type Err = ParseLookupPolicyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"strict" => Ok(LookupPolicy::Strict),
			"lenient" => Ok(LookupPolicy::Lenient),
			_ => Err(ParseLookupPolicyError(s.to_string())),
		}
	}
}

impl fmt::Display for LookupPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LookupPolicy::Strict => write!(f, "strict"),
			LookupPolicy::Lenient => write!(f, "lenient"),
		}
	}
}
