//! Command line interface module
//!
//! Argument parsing plus the runner that drives check discovery and image
//! inspection.

pub mod args;
pub mod runner;

pub use args::{Args, Command};
pub use runner::Runner;
