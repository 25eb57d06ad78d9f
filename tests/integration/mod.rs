//! Integration test suite for dtrust-deploy.
//!
//! These tests drive the sequencer end to end against a recording fake
//! deployer and the in-process local chain.
//!
//! # Test Categories
//!
//! - `sequencer_e2e`: Governance deployment scenario and argument wiring
//! - `validation`: Plans rejected before any deploy call
//! - `failure`: Partial-failure semantics
//! - `idempotence`: Re-running a plan in a fresh session
//! - `persistence`: Address logs, plan files and build-directory artifacts
//! - `logging`: Deploy log lines for a partial run
//!
//! No network access is needed.

mod fixtures;

mod failure;
mod idempotence;
mod persistence;
mod logging;
