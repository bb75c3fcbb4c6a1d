//! Compares a ServiceAccount read from the cluster against its backup and
//! previews the merge patch that would restore the backup's secrets.

pub mod config;
pub mod loader;
pub mod output;
pub mod preview;
pub mod telemetry;
