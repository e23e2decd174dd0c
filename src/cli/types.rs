use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Host and service check scheduler", long_about = None)]
#[command(version)]
#[command(subcommand_help_heading = "Commands")]
pub struct Cli {
    /// Engine configuration file (default: $VIGIL_CONFIG, then ~/.config/vigil/vigil.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the check engine in the foreground
    Run {
        /// Object definitions (YAML)
        #[arg(short, long)]
        objects: PathBuf,
    },

    /// Validate configuration and object definitions without running
    Verify {
        /// Object definitions (YAML)
        #[arg(short, long)]
        objects: PathBuf,
    },

    /// Queue a passive check result for the running engine
    Submit {
        /// Host name
        #[arg(long)]
        host: String,

        /// Service description; omit to submit a host result
        #[arg(long)]
        service: Option<String>,

        /// Plugin return code (services 0-3, hosts 0-2)
        #[arg(long, allow_negative_numbers = true)]
        code: i32,

        /// Plugin output, optionally with `|` performance data
        #[arg(long)]
        output: String,
    },

    /// Apply the results waiting in the spool once, without running checks
    Reap {
        /// Object definitions (YAML)
        #[arg(short, long)]
        objects: PathBuf,
    },

    /// Show the status published by the running engine
    Status {
        /// Include objects in OK/UP state
        #[arg(short, long)]
        all: bool,
    },
}
