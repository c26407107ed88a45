mod mode;

pub use mode::UsageError;

use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;

const AFTER_HELP: &str = "\
Modes:
  Full provisioning (5 inputs): start the services, reconcile the quality gate,
  quality profile and project, mint a token, then build and analyze.
    sonarup KEY NAME BRANCH ANALYZE DIR
    sonarup -p KEY -n NAME -m BRANCH -a ANALYZE -d DIR

  Re-analysis (2 inputs): reuse the token saved by a full run and analyze again.
    sonarup NAME DIR
    sonarup -n NAME -d DIR";

#[derive(Parser, Debug)]
#[command(name = "sonarup")]
#[command(about = "Provision a local SonarQube environment and analyze a project", long_about = None)]
#[command(version)]
#[command(after_help = AFTER_HELP)]
pub struct Cli {
    /// KEY NAME BRANCH ANALYZE DIR, or NAME DIR
    #[arg(value_name = "ARGS")]
    pub inputs: Vec<String>,

    /// Project key
    #[arg(short = 'p', long = "project")]
    pub project: Option<String>,

    /// Project name
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Main branch name
    #[arg(short = 'm', long)]
    pub main_branch: Option<String>,

    /// Name of the analysis token to mint
    #[arg(short = 'a', long)]
    pub analyze: Option<String>,

    /// Project directory to build and analyze
    #[arg(short = 'd', long)]
    pub directory: Option<PathBuf>,

    /// Settings file (defaults: $SONARUP_CONFIG, ./sonarup.toml, user config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = "warn")]
    pub log_level: LogLevel,

    /// Do not open the dashboard after a successful full run
    #[arg(long)]
    pub no_browser: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}
