//! Pipeline E2E test suite.
//!
//! Drives the pipeline controller and the job orchestration with a scripted
//! command runner and an in-process mock of the KernelCI API. No kernel,
//! VM or xfstests checkout is needed.
//!
//! Run with: cargo test --test pipeline_e2e

mod mock_api;
mod test_helpers;

mod test_fail_fast;
mod test_success_path;
