//! provision-wait - condition-gated wait step for image provisioning
//!
//! This crate pauses a machine-image build until a fixed duration elapses or
//! a readiness check succeeds, with bounded retries, a delay between checks
//! and optional success/failure actions.

pub mod config;
pub mod wait;
