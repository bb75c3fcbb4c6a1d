//! Dotted-path access into JSON documents.
//!
//! Documents are plain [`serde_json::Value`] trees. A path such as
//! `metadata.name` is resolved one segment at a time; every intermediate value
//! has to be an object.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// A single Kubernetes-style resource, as read from JSON.
pub type Document = Value;

/// Errors that can occur while resolving a path inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
	/// The document itself is absent (`null` root).
	#[error("document is nil")]
	NilRoot,

	#[error("key `{key}` not found while resolving `{path}`")]
	NotFound { path: String, key: String },

	#[error("value at `{path}` is {found}, expected {expected}")]
	TypeMismatch {
		path: String,
		expected: Shape,
		found: Shape,
	},
}

/// The shape of a JSON value, as reported in [`AccessError::TypeMismatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
	Null,
	Bool,
	Number,
	String,
	List,
	Map,
}

impl Shape {
	pub fn of(value: &Value) -> Self {
		match value {
			Value::Null => Self::Null,
			Value::Bool(_) => Self::Bool,
			Value::Number(_) => Self::Number,
			Value::String(_) => Self::String,
			Value::Array(_) => Self::List,
			Value::Object(_) => Self::Map,
		}
	}
}

impl fmt::Display for Shape {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Shape::Null => write!(f, "null"),
			Shape::Bool => write!(f, "a boolean"),
			Shape::Number => write!(f, "a number"),
			Shape::String => write!(f, "a string"),
			Shape::List => write!(f, "a list"),
			Shape::Map => write!(f, "a map"),
		}
	}
}

/// Path reported for errors about the document root itself.
pub const ROOT_PATH: &str = ".";

/// Returns the map at the root of a document, distinguishing an absent
/// document from a document of the wrong shape.
pub fn root_map(root: &Value) -> Result<&Map<String, Value>, AccessError> {
	match root {
		Value::Null => Err(AccessError::NilRoot),
		Value::Object(map) => Ok(map),
		other => Err(mismatch(ROOT_PATH, Shape::Map, other)),
	}
}

fn root_map_mut(root: &mut Value) -> Result<&mut Map<String, Value>, AccessError> {
	match root {
		Value::Null => Err(AccessError::NilRoot),
		Value::Object(map) => Ok(map),
		other => Err(mismatch(ROOT_PATH, Shape::Map, other)),
	}
}

/// Resolves `path` (dot separated) against `root`.
pub fn get<'a>(root: &'a Value, path: &str) -> Result<&'a Value, AccessError> {
	let mut current = root_map(root)?;
	let mut consumed = 0;

	loop {
		let rest = &path[consumed..];
		let (key, last) = match rest.split_once('.') {
			Some((key, _)) => (key, false),
			None => (rest, true),
		};

		let value = current.get(key).ok_or_else(|| AccessError::NotFound {
			path: path.to_string(),
			key: key.to_string(),
		})?;
		consumed += key.len();

		if last {
			return Ok(value);
		}

		// More segments follow, so this value has to be a map
		current = value.as_object().ok_or_else(|| AccessError::TypeMismatch {
			path: path[..consumed].to_string(),
			expected: Shape::Map,
			found: Shape::of(value),
		})?;
		consumed += 1;
	}
}

/// Mutable counterpart of [`get`].
pub fn get_mut<'a>(root: &'a mut Value, path: &str) -> Result<&'a mut Value, AccessError> {
	let (parent, key) = match path.rsplit_once('.') {
		Some((parent, key)) => (get_map_mut(root, parent)?, key),
		None => (root_map_mut(root)?, path),
	};
	parent.get_mut(key).ok_or_else(|| AccessError::NotFound {
		path: path.to_string(),
		key: key.to_string(),
	})
}

fn mismatch(path: &str, expected: Shape, found: &Value) -> AccessError {
	AccessError::TypeMismatch {
		path: path.to_string(),
		expected,
		found: Shape::of(found),
	}
}

/// Returns the map at `path`.
pub fn get_map<'a>(root: &'a Value, path: &str) -> Result<&'a Map<String, Value>, AccessError> {
	let value = get(root, path)?;
	value
		.as_object()
		.ok_or_else(|| mismatch(path, Shape::Map, value))
}

/// Returns the map at `path` for in-place modification.
pub fn get_map_mut<'a>(
	root: &'a mut Value,
	path: &str,
) -> Result<&'a mut Map<String, Value>, AccessError> {
	match get_mut(root, path)? {
		Value::Object(map) => Ok(map),
		other => Err(mismatch(path, Shape::Map, other)),
	}
}

/// Returns the list at `path`.
pub fn get_list<'a>(root: &'a Value, path: &str) -> Result<&'a Vec<Value>, AccessError> {
	let value = get(root, path)?;
	value
		.as_array()
		.ok_or_else(|| mismatch(path, Shape::List, value))
}

/// Returns the list at `path` for in-place modification.
pub fn get_list_mut<'a>(root: &'a mut Value, path: &str) -> Result<&'a mut Vec<Value>, AccessError> {
	match get_mut(root, path)? {
		Value::Array(list) => Ok(list),
		other => Err(mismatch(path, Shape::List, other)),
	}
}

/// Returns the string at `path`.
pub fn get_string<'a>(root: &'a Value, path: &str) -> Result<&'a str, AccessError> {
	let value = get(root, path)?;
	value
		.as_str()
		.ok_or_else(|| mismatch(path, Shape::String, value))
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	fn service_account() -> Value {
		json!({
			"apiVersion": "v1",
			"kind": "ServiceAccount",
			"metadata": {
				"name": "builder",
				"namespace": "ci",
				"labels": { "team": "infra" }
			},
			"secrets": [{ "name": "builder-token-abcde" }]
		})
	}

	#[test]
	fn test_get_top_level() {
		let doc = service_account();
		assert_eq!(get(&doc, "kind").unwrap(), &json!("ServiceAccount"));
	}

	#[test]
	fn test_get_nested() {
		let doc = service_account();
		assert_eq!(get_string(&doc, "metadata.labels.team").unwrap(), "infra");
	}

	#[test]
	fn test_get_typed() {
		let doc = service_account();
		assert_eq!(get_map(&doc, "metadata").unwrap().len(), 3);
		assert_eq!(get_list(&doc, "secrets").unwrap().len(), 1);
	}

	#[test]
	fn test_nil_root() {
		assert_matches!(get(&Value::Null, "metadata"), Err(AccessError::NilRoot));
		assert_matches!(get_map(&Value::Null, "metadata"), Err(AccessError::NilRoot));
	}

	#[test]
	fn test_non_object_root_is_type_mismatch() {
		assert_matches!(
			get(&json!([1, 2]), "metadata"),
			Err(AccessError::TypeMismatch {
				path,
				expected: Shape::Map,
				found: Shape::List,
			}) if path == ROOT_PATH
		);
	}

	#[rstest]
	#[case::top_level("spec", "spec")]
	#[case::nested("metadata.uid", "uid")]
	#[case::deep("metadata.labels.owner", "owner")]
	fn test_not_found(#[case] path: &str, #[case] missing: &str) {
		let doc = service_account();
		assert_matches!(
			get(&doc, path),
			Err(AccessError::NotFound { key, .. }) if key == missing
		);
	}

	#[test]
	fn test_intermediate_not_a_map() {
		let doc = service_account();
		assert_matches!(
			get(&doc, "kind.name"),
			Err(AccessError::TypeMismatch { path, expected: Shape::Map, found: Shape::String })
				if path == "kind"
		);
		assert_matches!(
			get(&doc, "metadata.name.first"),
			Err(AccessError::TypeMismatch { path, found: Shape::String, .. })
				if path == "metadata.name"
		);
	}

	#[rstest]
	#[case::map_is_string(get_map(&service_account(), "kind").map(|_| ()), Shape::Map)]
	#[case::list_is_map(get_list(&service_account(), "metadata").map(|_| ()), Shape::List)]
	#[case::string_is_list(get_string(&service_account(), "secrets").map(|_| ()), Shape::String)]
	fn test_typed_accessor_mismatch(
		#[case] result: Result<(), AccessError>,
		#[case] expected_shape: Shape,
	) {
		assert_matches!(
			result,
			Err(AccessError::TypeMismatch { expected, .. }) if expected == expected_shape
		);
	}

	#[test]
	fn test_get_mut_modifies_in_place() {
		let mut doc = service_account();
		get_map_mut(&mut doc, "metadata.labels")
			.unwrap()
			.insert("tier".to_string(), json!("backend"));
		get_list_mut(&mut doc, "secrets").unwrap().clear();

		assert_eq!(get_string(&doc, "metadata.labels.tier").unwrap(), "backend");
		assert!(get_list(&doc, "secrets").unwrap().is_empty());
	}

	#[test]
	fn test_get_mut_errors_match_get() {
		let mut doc = service_account();
		assert_matches!(
			get_mut(&mut doc, "metadata.uid"),
			Err(AccessError::NotFound { key, .. }) if key == "uid"
		);
		assert_matches!(get_mut(&mut Value::Null, "metadata"), Err(AccessError::NilRoot));
		assert_matches!(
			get_list_mut(&mut doc, "metadata"),
			Err(AccessError::TypeMismatch { expected: Shape::List, .. })
		);
	}

	#[test]
	fn test_error_display() {
		let err = get_string(&service_account(), "secrets").unwrap_err();
		assert_eq!(err.to_string(), "value at `secrets` is a list, expected a string");
	}
}
