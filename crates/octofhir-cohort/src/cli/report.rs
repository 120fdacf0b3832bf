//! Report command implementation

use super::{load, output};
use anyhow::Result;
use std::path::PathBuf;

/// Configuration for report command
pub struct ReportConfig {
    pub sources: load::DataSources,
    pub definition: PathBuf,
    pub output_format: Option<String>,
    pub output_file: Option<PathBuf>,
}

/// Build a report tree from a definition file
pub async fn report(config: ReportConfig) -> Result<()> {
    let definition = load::load_report(&config.definition)?;
    let executor = load::build_executor(&config.sources)?;
    let tree = executor.run_report(&definition).await?;

    let format = output::OutputFormat::from_name(config.output_format.as_deref().unwrap_or("pretty"));
    output::print_output(&tree, format, config.output_file.as_deref())
}
