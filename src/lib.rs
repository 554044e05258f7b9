// ABOUTME: Library root for ergates - exposes the build and render engine.
// ABOUTME: The main binary is in main.rs.

pub mod build;
pub mod command;
pub mod config;
pub mod deploy;
pub mod engine;
pub mod error;
pub mod render;
pub mod retry;
pub mod store;
pub mod types;
