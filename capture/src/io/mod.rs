//! Side-effecting boundaries: config, persistence, and collaborators.

pub mod agent;
pub mod config;
pub mod history;
pub mod manifest;
pub mod planner;
pub mod process;
pub mod profile_store;
pub mod search;
