//! KernelCI fstests runner library.
//!
//! Runs xfstests against a kernel through a fail-fast stage pipeline and
//! turns the xunit results into the `{node, child_nodes}` report that is
//! submitted to the KernelCI API.

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
