#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args)]

mod csv_reader;
mod error;
mod logging;
mod ml;
mod schema;
mod structs;

use clap::Parser;
use logging::LogConfig;
use ml::pipeline::AnalysisConfig;
use schema::StudentSchema;
use std::path::{Path, PathBuf};
use structs::{PipelineError, Result};
use tracing::info;

/// Sleepscore - student stress, sleep and performance analysis
#[derive(Parser, Debug)]
#[command(name = "sleepscore")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input CSV file with one row per student
    #[arg(short, long, default_value = "data/Students_Grading_Dataset_Biased.csv")]
    data: PathBuf,

    /// Output directory for reports and figure data
    #[arg(short, long, default_value = "figures")]
    output_dir: PathBuf,

    /// Directory for the dated log file
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Number of clusters for K-means
    #[arg(short = 'k', long, default_value = "3")]
    clusters: usize,

    /// Number of PCA components
    #[arg(long, default_value = "2")]
    pca_components: usize,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log to the file
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let log_config = LogConfig::from_verbosity(args.verbose, &args.log_dir, args.quiet);
    let log_file = logging::init_logging(&log_config)?;
    info!("Logging to {}", log_file.display());

    let config = AnalysisConfig {
        clusters: args.clusters,
        pca_components: args.pca_components,
    };
    if config.clusters == 0 {
        return Err(PipelineError::Config("--clusters must be at least 1".into()));
    }

    run_analysis(&args.data, &args.output_dir, &config)
}

/// Load, analyze and write every report for one data file
fn run_analysis(data_path: &Path, output_dir: &Path, config: &AnalysisConfig) -> Result<()> {
    let schema = StudentSchema::default();

    let raw = csv_reader::load_student_data(data_path)?;
    let result = ml::pipeline::run_pipeline(&raw, &schema, config)?;

    std::fs::create_dir_all(output_dir)?;

    let summary = ml::output::build_summary(data_path, &result);
    ml::output::write_summary(output_dir, &summary)?;
    ml::output::write_stats_json(output_dir, &result)?;
    ml::output::write_clusters(output_dir, &result.pca, &result.clusters)?;
    ml::figures::write_all_figures(output_dir, &result, &schema)?;

    info!("Output written to {}", output_dir.display());
    info!("Pipeline completed successfully");
    Ok(())
}
