//! Authflow CLI
//!
//! Command-line interface for listing and running protocol conformance
//! scenarios and for inspecting tokens.

pub mod commands;
pub mod output;
