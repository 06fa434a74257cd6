//! Integration tests for the canopy version-control engine

mod concurrency;
mod persistence;
mod snapshot_log_engine;
mod support;
