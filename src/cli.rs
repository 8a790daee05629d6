use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "past-files")]
#[command(about = "Track files by identity across renames, moves and edits", long_about = None)]
pub struct Cli {
    /// Tracking database (overrides configuration)
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan the configured roots and record what changed
    Scan {
        /// Root to scan; repeat for several (overrides configuration)
        #[arg(long = "root")]
        roots: Vec<String>,
        /// Glob pattern to ignore; repeat for several (added to configuration)
        #[arg(long = "ignore")]
        ignore: Vec<String>,
        /// Process scan units one at a time
        #[arg(long)]
        sequential: bool,
    },
    /// Show the last scan and row counts
    Status,
    /// Show name and location history of a file, and other copies of its content
    History { path: PathBuf },
    /// List every file currently holding a content hash
    Content { hash: String },
    /// Print configuration values
    PrintConfig,
}
