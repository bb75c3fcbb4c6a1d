//! Reconciliation of a ServiceAccount between a live cluster snapshot and a
//! backup.
//!
//! Both snapshots are [normalized](normalize::normalize), the backup's
//! auto-provisioned token secrets are [filtered](secrets::filter_default_tokens),
//! and if the two still differ a desired object is derived and the
//! [merge patch](merge_patch) that would get the cluster there is previewed.

pub mod document;
pub mod equality;
pub mod merge_patch;
pub mod normalize;
pub mod policy;
pub mod reconcile;
pub mod secrets;

pub use document::{AccessError, Document};
pub use equality::{Equality, SemanticEquality};
pub use merge_patch::{JsonMergePatch, MergePatcher, PatchError};
pub use policy::LookupPolicy;
pub use reconcile::{Reconciler, Reconciliation, ReconcileError, Snapshot};
