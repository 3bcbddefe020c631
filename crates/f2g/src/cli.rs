//! Command-line surface.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "f2g", version, about = "Convert Fitbit activities to Garmin formats")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create activities' tcx
    CreateActivityTcx(ConvertArgs),
    /// Create activities' fit
    CreateActivityFit(ConvertArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    #[arg(short = 'c', long, default_value = ".cache")]
    pub cache_directory: PathBuf,

    #[arg(short = 'd', long, default_value = "f2g")]
    pub directory: PathBuf,

    /// Start of the inclusive date range, YYYY-MM-DD.
    #[arg(short = 's', long)]
    pub start_date: NaiveDate,

    /// End of the inclusive date range, YYYY-MM-DD.
    #[arg(short = 'e', long, default_value_t = chrono::Local::now().date_naive())]
    pub end_date: NaiveDate,
}
