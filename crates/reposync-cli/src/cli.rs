use clap::Parser;
use clap::builder::BoolishValueParser;
use std::path::PathBuf;

/// Repository mirroring tool
///
/// Mirror source directories into destination roots and keep them in sync
/// while the sources change. Without `--source`, instances are read from
/// reposync.toml (or reposync.json) in the working directory or a parent.
#[derive(Parser, Debug)]
#[command(name = "reposync")]
#[command(about, long_about = None, version)]
pub struct Cli {
    /// Keep watching for changes after the initial mirror pass
    #[arg(short, long)]
    pub watch: bool,

    /// Exit after the initial pass even when watching is requested
    #[arg(long, env = "REPOSYNC_PRODUCTION", value_parser = BoolishValueParser::new())]
    pub production: bool,

    /// Use specific config file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Source directory to mirror (repeatable; replaces configured instances)
    #[arg(short = 's', long = "source", value_name = "DIR")]
    pub sources: Vec<PathBuf>,

    /// Destination root receiving the mirror (repeatable)
    #[arg(short = 'd', long = "dest", value_name = "DIR", requires = "sources")]
    pub destinations: Vec<PathBuf>,

    /// Fixed marker directory instead of each source's name
    #[arg(long, value_name = "NAME", requires = "sources")]
    pub marker: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
