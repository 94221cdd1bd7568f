//! CLI argument parsing for agents.

use std::path::PathBuf;

use clap::Parser;

/// Common CLI arguments for all agents.
#[derive(Parser, Debug, Clone)]
#[command(about = "fieldpoll collection agent")]
pub struct AgentArgs {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl AgentArgs {
    /// Parse CLI arguments with a default config path.
    ///
    /// Exits with clap's usage message on invalid arguments.
    pub fn parse_with_default(name: &'static str, default_config: &'static str) -> Self {
        Self::parse_from_with_default(name, default_config, std::env::args_os())
    }

    /// Parse the given arguments with a default config path.
    pub fn parse_from_with_default<I, T>(
        name: &'static str,
        default_config: &'static str,
        args: I,
    ) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = <Self as clap::CommandFactory>::command()
            .name(name)
            .mut_arg("config", |arg| arg.default_value(default_config))
            .get_matches_from(args);

        <Self as clap::FromArgMatches>::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }
}
