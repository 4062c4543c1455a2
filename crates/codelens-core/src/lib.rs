//! Configuration loading, startup wiring, and review orchestration.

pub mod bootstrap;
pub mod config;
pub mod intent;
pub mod project;
pub mod review;
