//! Simulated provider runs for the `cloudtask` executor.
//!
//! Exposes the configuration loader and scenario runner for use in tests
//! and embedding.

pub mod config;
pub mod scenario;
