//! Command-line interface

pub mod app;
pub mod args;
pub mod config_cmd;

pub use args::{Cli, Commands, ConfigAction};
