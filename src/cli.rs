use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pixtag", version, about = "Inspect and maintain the pixtag caches")]
pub struct Cli {
    /// Config file to read instead of the platform default.
    #[arg(long, global = true, env = "PIXTAG_CONFIG_FILE")]
    pub config: Option<PathBuf>,
    /// Cache root directory, overriding the configuration.
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,
    /// More logging (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    /// Only log warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Default log filter directive for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Remove every record from one or all caches.
    Clear {
        #[arg(value_enum, default_value_t = Target::All)]
        target: Target,
    },
    /// List the file paths a cache holds records for.
    Keys {
        #[arg(value_enum)]
        kind: Kind,
    },
    /// Remove records for files that no longer exist.
    Prune {
        #[arg(value_enum)]
        kind: Kind,
    },
    /// Reclaim unused space in both stores.
    Compact,
    /// Show how many records each cache holds.
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    Metadata,
    Thumbnails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    Metadata,
    Thumbnails,
    All,
}
