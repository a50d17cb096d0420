use std::path::PathBuf;

use clap::Parser;
use clima::{Config, FixedOffset};
use tracing::info;

#[derive(Parser)]
#[command(name = "clima")]
#[command(about = "Monthly climatological mean temperatures of INMET automatic stations", long_about = None)]
struct Cli {
    /// Directory holding the hourly CSV exports
    #[arg(long, env = "CLIMA_INPUT_DIR", default_value = "Automaticas_INMET")]
    input_dir: PathBuf,

    /// Directory receiving the report and the plots
    #[arg(long, env = "CLIMA_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// File name of the monthly means report
    #[arg(long, default_value = "medias_mensais.csv")]
    report_name: String,

    /// Also write every normalized record to this file
    #[arg(long)]
    dump_dataset: Option<PathBuf>,

    /// Skip the time series plots
    #[arg(long)]
    no_plots: bool,

    /// Character offset of the station code in the file names
    #[arg(long, default_value_t = 12)]
    code_offset: usize,

    /// Length of the station code
    #[arg(long, default_value_t = 4)]
    code_len: usize,
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config {
        input_dir: cli.input_dir,
        output_dir: cli.output_dir,
        report_name: cli.report_name,
        dump_dataset: cli.dump_dataset,
        plots: !cli.no_plots,
    };
    let extractor = FixedOffset {
        start: cli.code_offset,
        len: cli.code_len,
    };

    let summary = clima::run(&config, &extractor)?;
    info!(
        "{} stations from {} records in {} files, {} plots, report in {}",
        summary.stations,
        summary.records,
        summary.files,
        summary.plots,
        summary.report.display()
    );

    Ok(())
}
