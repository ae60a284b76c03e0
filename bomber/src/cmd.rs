use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Continuous HTTP load generator.
///
/// Replays a fixed catalog of GET requests against the configured base
/// URL forever, measuring per-request latency and exposing the results
/// for Prometheus scraping.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Cmd {
    /// Path to the configuration file.
    #[clap(short, long, default_value = "bomber.yaml")]
    pub config: PathBuf,
    /// Be verbose in terms of logging.
    #[clap(short, action = ArgAction::Count)]
    pub verbose: u8,
}
