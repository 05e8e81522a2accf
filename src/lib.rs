// ABOUTME: Library root for quickcd - exposes the engines for the binary and tests.
// ABOUTME: The main binary is in main.rs.

pub mod bootstrap;
pub mod charts;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod exec;
pub mod github;
pub mod notify;
pub mod pipeline;
pub mod shell;
pub mod shutdown;
pub mod store;
pub mod types;
