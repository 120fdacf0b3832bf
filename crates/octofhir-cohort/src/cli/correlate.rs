//! Correlate command implementation

use super::{load, output};
use anyhow::Result;
use std::path::PathBuf;

/// Configuration for correlate command
pub struct CorrelateConfig {
    pub sources: load::DataSources,
    pub request: PathBuf,
    pub output_format: Option<String>,
    pub output_file: Option<PathBuf>,
}

/// Run the treatment/outcome correlation
pub async fn correlate(config: CorrelateConfig) -> Result<()> {
    let request = load::load_correlation(&config.request)?;
    let executor = load::build_executor(&config.sources)?;
    let report = executor.run_correlation(&request).await?;

    if report.cohort_total() == 0 {
        eprintln!("{}", output::format_warning("no patients match the base criteria"));
    }

    let format = output::OutputFormat::from_name(config.output_format.as_deref().unwrap_or("pretty"));
    output::print_output(&report, format, config.output_file.as_deref())
}
