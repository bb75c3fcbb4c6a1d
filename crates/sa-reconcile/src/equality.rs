//! Deep semantic equality of documents.

use serde_json::Value;

/// Decides whether two documents describe the same object.
pub trait Equality {
	fn equal(&self, left: &Value, right: &Value) -> bool;
}

/// Structural equality: same keys, same values recursively, list order
/// significant, map key order insignificant.
///
/// Numbers are compared exactly, so `1` and `1.0` differ, as do integers that
/// only collapse to the same `f64`. A `null` value and an absent key differ.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemanticEquality;

impl Equality for SemanticEquality {
	fn equal(&self, left: &Value, right: &Value) -> bool {
		// Map equality ignores insertion order even with preserve_order
		left == right
	}
}
