//! duallog Integration Tests
//!
//! End-to-end behavior through the `DualLog` facade over in-memory stores.

#[path = "../common/mod.rs"]
mod common;

mod cancellation;
mod config;
mod retry;
mod round_trip;
mod sequences;
