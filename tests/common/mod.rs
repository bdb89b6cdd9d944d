#![allow(dead_code, unused_imports)]
//! Shared test utilities for integration tests.
//!
//! - `fixtures`: bundle directories and origin fetchers
//! - `setup`: caches wired to an in-memory remote

pub mod fixtures;
pub mod setup;

pub use fixtures::{dataset_bundle, model_bundle, FailingBundle, StaticOrigin};
pub use setup::{init_tracing, remote_config, Harness};
