//! Deterministic, pure logic shared by the capture orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod budget;
pub mod login_state;
pub mod phase;
pub mod plan;
pub mod registry;
pub mod types;
