//! JSON merge patch (RFC 7386) computation.
//!
//! [`create_merge_patch`] computes the two-way patch between two objects.
//! [`JsonMergePatch`] builds the three-way patch kubectl uses for
//! client-side apply: additions and changes come from `current → modified`,
//! deletions from `original → modified`, and the two are merged once they are
//! known not to conflict.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{instrument, trace};

use crate::{
	document::Shape,
	equality::{Equality, SemanticEquality},
};

/// Which input of the three-way merge a [`PatchError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchInput {
	Original,
	Modified,
	Current,
}

impl fmt::Display for PatchInput {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PatchInput::Original => write!(f, "original"),
			PatchInput::Modified => write!(f, "modified"),
			PatchInput::Current => write!(f, "current"),
		}
	}
}

/// Errors that can occur while computing a merge patch.
#[derive(Debug, Error)]
pub enum PatchError {
	#[error("parsing {input} document")]
	InvalidJson {
		input: PatchInput,
		#[source]
		source: serde_json::Error,
	},

	#[error("{input} document is {found}, expected a map")]
	NotAnObject { input: PatchInput, found: Shape },

	#[error(
		"merge patch conflict: changes {add_and_change} conflict with deletions {deletions}"
	)]
	Conflict {
		add_and_change: Value,
		deletions: Value,
	},
}

/// Computes the patch that takes an original document to a modified one.
pub trait MergePatcher {
	/// `current` is the live state of the object, if known. Missing or empty
	/// inputs are treated as `{}`.
	fn three_way(
		&self,
		original: &[u8],
		modified: &[u8],
		current: Option<&[u8]>,
	) -> Result<Value, PatchError>;
}

/// Three-way JSON merge patch with RFC 7386 semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMergePatch;

impl MergePatcher for JsonMergePatch {
	#[instrument(skip_all, fields(original = original.len(), modified = modified.len()))]
	fn three_way(
		&self,
		original: &[u8],
		modified: &[u8],
		current: Option<&[u8]>,
	) -> Result<Value, PatchError> {
		let original = parse_object(original, PatchInput::Original)?;
		let modified = parse_object(modified, PatchInput::Modified)?;
		let current = parse_object(current.unwrap_or_default(), PatchInput::Current)?;

		let add_and_change =
			Value::Object(keep_or_delete_null(&diff_objects(&current, &modified), false));
		let deletions =
			Value::Object(keep_or_delete_null(&diff_objects(&original, &modified), true));
		trace!(%add_and_change, %deletions, "partial patches");

		combine(add_and_change, deletions)
	}
}

/// Merges the additions and changes over the deletions, refusing to do so
/// when they touch the same field differently.
fn combine(add_and_change: Value, deletions: Value) -> Result<Value, PatchError> {
	if has_conflicts(&add_and_change, &deletions) {
		return Err(PatchError::Conflict {
			add_and_change,
			deletions,
		});
	}

	let mut patch = deletions;
	json_patch::merge(&mut patch, &add_and_change);
	Ok(patch)
}

fn parse_object(raw: &[u8], input: PatchInput) -> Result<Map<String, Value>, PatchError> {
	if raw.is_empty() {
		return Ok(Map::new());
	}
	match serde_json::from_slice(raw).map_err(|source| PatchError::InvalidJson { input, source })? {
		Value::Object(map) => Ok(map),
		other => Err(PatchError::NotAnObject {
			input,
			found: Shape::of(&other),
		}),
	}
}

/// Computes the two-way merge patch between two objects.
///
/// Keys whose values differ are set to the modified value (maps recurse),
/// keys missing from `modified` are set to `null`.
pub fn create_merge_patch(original: &Value, modified: &Value) -> Result<Value, PatchError> {
	let original = as_object(original, PatchInput::Original)?;
	let modified = as_object(modified, PatchInput::Modified)?;
	Ok(Value::Object(diff_objects(original, modified)))
}

fn as_object(value: &Value, input: PatchInput) -> Result<&Map<String, Value>, PatchError> {
	value.as_object().ok_or_else(|| PatchError::NotAnObject {
		input,
		found: Shape::of(value),
	})
}

fn diff_objects(original: &Map<String, Value>, modified: &Map<String, Value>) -> Map<String, Value> {
	let mut patch = Map::new();

	for (key, new) in modified {
		match (original.get(key), new) {
			(Some(Value::Object(old_map)), Value::Object(new_map)) => {
				let nested = diff_objects(old_map, new_map);
				if !nested.is_empty() {
					patch.insert(key.clone(), Value::Object(nested));
				}
			}
			(Some(old), _) if SemanticEquality.equal(old, new) => {}
			_ => {
				patch.insert(key.clone(), new.clone());
			}
		}
	}

	for key in original.keys() {
		if !modified.contains_key(key) {
			patch.insert(key.clone(), Value::Null);
		}
	}

	patch
}

/// Keeps only the deletions (`keep_null`) or only the additions and changes
/// (`!keep_null`) of a patch.
///
/// An explicitly empty map is a value, not an empty sub-patch. Lists are
/// always replaced as a whole, so they are never looked into.
fn keep_or_delete_null(patch: &Map<String, Value>, keep_null: bool) -> Map<String, Value> {
	let mut filtered = Map::new();

	for (key, value) in patch {
		match value {
			Value::Null => {
				if keep_null {
					filtered.insert(key.clone(), Value::Null);
				}
			}
			Value::Object(map) if map.is_empty() => {
				if !keep_null {
					filtered.insert(key.clone(), value.clone());
				}
			}
			Value::Object(map) => {
				let nested = keep_or_delete_null(map, keep_null);
				if !nested.is_empty() {
					filtered.insert(key.clone(), Value::Object(nested));
				}
			}
			_ => {
				if !keep_null {
					filtered.insert(key.clone(), value.clone());
				}
			}
		}
	}

	filtered
}

/// Returns true if applying both patches would touch the same field in
/// incompatible ways.
pub fn has_conflicts(left: &Value, right: &Value) -> bool {
	match (left, right) {
		(Value::Object(left), Value::Object(right)) => left.iter().any(|(key, left)| {
			right
				.get(key)
				.is_some_and(|right| has_conflicts(left, right))
		}),
		(Value::Object(_), _) => true,
		(Value::Array(left), Value::Array(right)) => {
			left.len() != right.len()
				|| left.iter().zip(right).any(|(l, r)| has_conflicts(l, r))
		}
		(Value::Array(_), _) => true,
		(left, right) => !SemanticEquality.equal(left, right),
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	fn three_way(original: &Value, modified: &Value) -> Value {
		JsonMergePatch
			.three_way(
				original.to_string().as_bytes(),
				modified.to_string().as_bytes(),
				None,
			)
			.unwrap()
	}

	#[test]
	fn test_two_way_changes_and_deletions() {
		let original = json!({
			"metadata": { "name": "sa", "uid": "1", "labels": { "a": "1" } },
			"secrets": [{ "name": "x" }]
		});
		let modified = json!({
			"metadata": { "name": "sa", "labels": { "a": "2" } },
			"secrets": [{ "name": "x" }, { "name": "y" }],
			"imagePullSecrets": [{ "name": "registry" }]
		});

		assert_eq!(
			create_merge_patch(&original, &modified).unwrap(),
			json!({
				"metadata": { "uid": null, "labels": { "a": "2" } },
				"secrets": [{ "name": "x" }, { "name": "y" }],
				"imagePullSecrets": [{ "name": "registry" }]
			})
		);
	}

	#[test]
	fn test_two_way_identical_is_empty() {
		let doc = json!({ "a": { "b": [1, 2] }, "c": null });
		assert_eq!(create_merge_patch(&doc, &doc).unwrap(), json!({}));
	}

	#[rstest]
	#[case::list(json!([]), PatchInput::Original, Shape::List)]
	#[case::null(json!(null), PatchInput::Original, Shape::Null)]
	fn test_two_way_requires_objects(
		#[case] original: Value,
		#[case] input: PatchInput,
		#[case] shape: Shape,
	) {
		assert_matches!(
			create_merge_patch(&original, &json!({})),
			Err(PatchError::NotAnObject { input: i, found }) if i == input && found == shape
		);
	}

	#[test]
	fn test_three_way_without_current_restates_modified() {
		let original = json!({ "metadata": { "name": "sa", "uid": "1" }, "status": {} });
		let modified = json!({ "metadata": { "name": "sa" }, "secrets": [{ "name": "x" }] });

		assert_eq!(
			three_way(&original, &modified),
			json!({
				"metadata": { "name": "sa", "uid": null },
				"status": null,
				"secrets": [{ "name": "x" }]
			})
		);
	}

	#[test]
	fn test_three_way_with_current_only_sends_changes() {
		let original = json!({ "a": 1, "b": 2 });
		let modified = json!({ "a": 1, "c": 3 });
		let current = json!({ "a": 1, "b": 2, "d": 4 });

		let patch = JsonMergePatch
			.three_way(
				original.to_string().as_bytes(),
				modified.to_string().as_bytes(),
				Some(current.to_string().as_bytes()),
			)
			.unwrap();

		// `d` was never part of original, so it is left alone
		assert_eq!(patch, json!({ "b": null, "c": 3 }));
	}

	#[test]
	fn test_three_way_empty_inputs() {
		assert_eq!(JsonMergePatch.three_way(b"", b"", None).unwrap(), json!({}));
	}

	#[test]
	fn test_three_way_keeps_explicit_empty_map() {
		let patch = three_way(&json!({}), &json!({ "metadata": { "labels": {} } }));
		assert_eq!(patch, json!({ "metadata": { "labels": {} } }));
	}

	#[test]
	fn test_three_way_patch_applies() {
		let original = json!({
			"apiVersion": "v1",
			"kind": "ServiceAccount",
			"metadata": { "name": "sa", "uid": "1" },
			"secrets": [{ "name": "a" }]
		});
		let modified = json!({
			"apiVersion": "v1",
			"kind": "ServiceAccount",
			"metadata": { "name": "sa" },
			"secrets": [{ "name": "a" }, { "name": "b" }],
			"imagePullSecrets": [{ "name": "registry" }]
		});

		let patch = three_way(&original, &modified);
		let mut patched = original.clone();
		json_patch::merge(&mut patched, &patch);

		assert_eq!(patched, modified);
	}

	#[test]
	fn test_three_way_invalid_json() {
		assert_matches!(
			JsonMergePatch.three_way(b"{}", b"{not json", None),
			Err(PatchError::InvalidJson {
				input: PatchInput::Modified,
				..
			})
		);
	}

	#[test]
	fn test_three_way_not_an_object() {
		assert_matches!(
			JsonMergePatch.three_way(b"[1]", b"{}", None),
			Err(PatchError::NotAnObject {
				input: PatchInput::Original,
				found: Shape::List
			})
		);
	}

	#[test]
	fn test_combine_rejects_conflicting_partials() {
		let add_and_change = json!({ "metadata": { "labels": { "team": "infra" } } });
		let deletions = json!({ "metadata": { "labels": null } });

		assert_matches!(
			combine(add_and_change.clone(), deletions.clone()),
			Err(PatchError::Conflict { add_and_change: a, deletions: d })
				if a == add_and_change && d == deletions
		);
	}

	#[test]
	fn test_combine_merges_disjoint_partials() {
		let patch = combine(
			json!({ "metadata": { "name": "sa" }, "secrets": [{ "name": "b" }] }),
			json!({ "metadata": { "uid": null }, "status": null }),
		)
		.unwrap();

		assert_eq!(
			patch,
			json!({
				"metadata": { "uid": null, "name": "sa" },
				"status": null,
				"secrets": [{ "name": "b" }]
			})
		);
	}

	#[rstest]
	#[case::empty(json!({}))]
	#[case::same_as_original(json!({ "metadata": { "name": "sa", "uid": "1" }, "secrets": [{ "name": "a" }] }))]
	#[case::label_as_scalar(json!({ "metadata": { "labels": "oops" } }))]
	#[case::secrets_as_map(json!({ "secrets": { "name": "a" } }))]
	#[case::extra_fields(json!({ "metadata": { "generation": 4 }, "status": { "phase": "Active" } }))]
	fn test_three_way_with_diverged_current(#[case] current: Value) {
		let original = json!({ "metadata": { "name": "sa", "uid": "1" }, "secrets": [{ "name": "a" }] });
		let modified = json!({
			"metadata": { "name": "sa", "labels": { "team": "infra" } },
			"secrets": [{ "name": "a" }, { "name": "b" }]
		});

		let patch = JsonMergePatch
			.three_way(
				original.to_string().as_bytes(),
				modified.to_string().as_bytes(),
				Some(current.to_string().as_bytes()),
			)
			.unwrap();

		// Whatever the live state, the patch brings it to modified on the
		// fields that modified or original mention
		let mut patched = current;
		json_patch::merge(&mut patched, &patch);
		assert_eq!(patched["metadata"]["labels"], modified["metadata"]["labels"]);
		assert_eq!(patched["secrets"], modified["secrets"]);
		assert!(patched["metadata"].get("uid").is_none());
	}

	#[test]
	fn test_two_way_large_integers_differ() {
		let original = json!({ "n": 9_007_199_254_740_992_u64 });
		let modified = json!({ "n": 9_007_199_254_740_993_u64 });

		assert_eq!(
			create_merge_patch(&original, &modified).unwrap(),
			json!({ "n": 9_007_199_254_740_993_u64 })
		);
	}

	#[rstest]
	#[case::disjoint(json!({ "a": 1 }), json!({ "b": null }), false)]
	#[case::same_scalar(json!({ "a": 1 }), json!({ "a": 1 }), false)]
	#[case::different_scalar(json!({ "a": 1 }), json!({ "a": null }), true)]
	#[case::map_vs_scalar(json!({ "a": { "b": 1 } }), json!({ "a": null }), true)]
	#[case::nested_disjoint(json!({ "a": { "b": 1 } }), json!({ "a": { "c": null } }), false)]
	#[case::list_length(json!({ "a": [1] }), json!({ "a": [1, 2] }), true)]
	#[case::list_same(json!({ "a": [1, 2] }), json!({ "a": [1, 2] }), false)]
	fn test_has_conflicts(#[case] left: Value, #[case] right: Value, #[case] expected: bool) {
		assert_eq!(has_conflicts(&left, &right), expected);
	}
}
