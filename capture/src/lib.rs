//! Login-gated parallel planning and execution for UI state capture.
//!
//! Given a natural-language task, the orchestrator detects the target web app,
//! logs in (with a human-in-the-loop second factor) while a documentation
//! grounded plan is generated concurrently, executes whichever plan is ready
//! through a UI-driving agent, and records a numbered screenshot plus manifest
//! entry for every executed step. The split mirrors the rest of the crate:
//!
//! - **[`core`]**: Pure, deterministic logic (registry, state machines, plan
//!   validation). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting boundaries (config, profile store, manifest,
//!   history, subprocess-backed collaborators).
//!
//! Orchestration modules ([`login`], [`plan_generator`], [`handoff`],
//! [`engine`], [`capture`], [`orchestrator`]) coordinate core logic with I/O.

pub mod capture;
pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod handoff;
pub mod io;
pub mod logging;
pub mod login;
pub mod orchestrator;
pub mod plan_generator;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
