use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(name = "dvb-scan")]
#[clap(about = "Scans DVB transponders and stores discovered channels in a database.", long_about = None)]
#[clap(version)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan channels and store results in the database.{n}
    /// Reads a captured transport-stream file in place of a physical tuner,
    /// feeds it through the section filter orchestrator transponder by
    /// transponder, and writes discovered channels and services out.
    #[clap(name = "scan")]
    Scan {
        /// Path to the captured transport-stream file standing in for the
        /// tuner device.
        #[clap(short = 'i', long, value_name = "CAPTURE_PATH", required = true)]
        device: String,

        /// Broadcast type being scanned; only affects which delivery-system
        /// fields of the seed transponder list are honored.
        #[clap(value_enum, long, default_value = "terrestrial")]
        broadcast_type: BroadcastType,

        /// Database file path. If not specified, uses an in-memory database
        /// and discards results on exit.
        #[clap(long, value_name = "DB_PATH")]
        database: Option<String>,

        /// Timeout per section filter, in seconds.
        #[clap(long, default_value = "4")]
        timeout: u64,

        /// LNB voltage for satellite frontends (13V/18V).
        #[clap(value_enum, long = "lnb")]
        lnb: Option<LnbVoltage>,

        /// Keep scanning remaining transponders after one fails to lock.
        #[clap(long)]
        continue_on_error: bool,

        /// Only keep free-to-air (non-scrambled) services.
        #[clap(long)]
        scan_only_free: bool,

        /// Remove previously stored services on delivery systems touched by
        /// this scan before writing new results.
        #[clap(long)]
        scan_remove_services: bool,

        /// Path to the LCN side file to update, if any.
        #[clap(long, value_name = "LCN_PATH")]
        lcn_file: Option<String>,

        /// Show per-transponder progress during the scan.
        #[clap(long, short = 'v')]
        verbose: bool,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum BroadcastType {
    Terrestrial,
    Cable,
    Satellite,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LnbVoltage {
    #[clap(name = "13v")]
    V13,
    #[clap(name = "18v")]
    V18,
}
