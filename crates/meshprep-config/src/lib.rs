//! Configuration for the material preparation pipeline.
//!
//! Settings persist to disk as RON files and can be overridden per
//! invocation from the command line via clap.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, LoadConfig, OutputConfig};
pub use error::ConfigError;
