//! Command-line interface.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

/// Production dashboard: partition the production sheet by month and
/// explore weight, waste and price KPIs per period.
///
/// Examples:
///   prod_dashboard partition
///   prod_dashboard serve --port 8080
///   prod_dashboard view --year 2026 --month 2
///   prod_dashboard dashboard --from dir
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, uses prod_dashboard.toml in the current directory
    /// when present.
    #[arg(short, long, global = true, value_name = "FILE", env = "PROD_DASHBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Split the source sheet into one JSON file per year/month
    Partition,

    /// Serve the data fragments, the aggregation API and the front end
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the dashboard for one period
    View {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        #[arg(long, value_enum, default_value_t = FetchFrom::Dir)]
        from: FetchFrom,
        /// Print the aggregated view as JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Interactive dashboard: pick periods and see their KPIs
    Dashboard {
        #[arg(long, value_enum, default_value_t = FetchFrom::Http)]
        from: FetchFrom,
    },

    /// Count rows with and without a unit price in one period
    Check {
        /// Defaults to the newest period in metadata.json
        #[arg(long, requires = "month")]
        year: Option<i32>,
        #[arg(long, requires = "year")]
        month: Option<u32>,
    },

    /// Write a default prod_dashboard.toml
    InitConfig,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFrom {
    /// GET from the configured dashboard.base_url
    Http,
    /// Read the output data directory directly
    Dir,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}
