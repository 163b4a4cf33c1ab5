//! Command line interface definition.
//!
//! The business surface is exactly the spec's single positional argument:
//! the address to listen on. Everything else here is ambient (logging).

use clap::{Parser, ValueEnum};
use log::LevelFilter;

/// Chord-like overlay Registry
#[derive(Debug, Parser)]
#[command(author, version, rename_all = "kebab-case")]
pub struct CommandLineArgs {
    /// Address to listen for node connections on, as "<host>:<port>"
    pub listen_addr: String,

    /// Sets the maximum level to log
    #[arg(long, default_value = "info")]
    pub log_level: LogLevel,
}

/// Defines the log level. Kept separate from [`LevelFilter`] so clap can
/// derive a `ValueEnum` for it without needing a wrapper crate.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}
