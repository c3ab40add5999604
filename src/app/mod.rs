//! Application shell
//!
//! The thin CLI harness around the library: argument parsing, TOML
//! configuration loading and merging, logging setup, signal-driven
//! cancellation, and the run summary. Everything here wires the engine to
//! the local loopback collaborators; the orchestration logic itself lives
//! in the library modules.

pub mod cli;
pub mod config;
pub mod startup;
