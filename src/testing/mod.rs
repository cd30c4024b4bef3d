//! Test doubles for the orchestrator's external collaborators, mirroring
//! the teacher crate's `testing::mocks` shape: a `should_fail` flag per
//! mock, recorded call history behind a mutex, and constructors named after
//! the scenario they set up.

pub mod mocks;
