const DEFAULT_AFTER_HELP: &str = "Refer to the crate's documentation for further help";

#[derive(clap::Parser, Debug)]
#[command(after_help=DEFAULT_AFTER_HELP)]
pub struct Args {
    /// Directory holding ORDERS.csv, CALENDAR.csv, TASKS.csv, STATIONS.csv
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: std::path::PathBuf,

    /// Raise logging verbosity to debug
    #[arg(short='v', long="verbose", default_value="false", action=clap::ArgAction::SetTrue)]
    pub verbose: bool,

    /// Solver wall-clock budget, in seconds
    #[arg(long="time-limit", value_name="SECS", default_value="300")]
    pub time_limit_secs: u64,

    /// Local-search worker thread count
    #[arg(long="workers", value_name="N", default_value="8")]
    pub workers: u32,

    /// Write a JSON dump of the raw solver outcome under output/debug/
    #[arg(long="debug-dump", default_value="false", action=clap::ArgAction::SetTrue)]
    pub debug_dump: bool,
}
