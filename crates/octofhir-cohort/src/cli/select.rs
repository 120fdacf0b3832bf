//! Select command implementation

use super::{load, output};
use anyhow::Result;
use octofhir_cohort_eval::PageRequest;
use std::path::PathBuf;

/// Configuration for select command
pub struct SelectConfig {
    pub sources: load::DataSources,
    pub criteria: PathBuf,
    pub page: usize,
    pub size: Option<usize>,
    pub output_format: Option<String>,
    pub output_file: Option<PathBuf>,
}

/// Fetch one page of a cohort
pub async fn select(config: SelectConfig) -> Result<()> {
    let criteria = load::load_criteria(&config.criteria)?;
    let executor = load::build_executor(&config.sources)?;
    let size = config.size.unwrap_or(executor.config().default_page_size);

    let page = executor
        .fetch_cohort(&criteria, Some(PageRequest::new(config.page, size)))
        .await?;
    log::info!(
        "Page {} holds {} of {} matching patients",
        page.page,
        page.patients.len(),
        page.total
    );

    let format = output::OutputFormat::from_name(config.output_format.as_deref().unwrap_or("pretty"));
    output::print_output(&page, format, config.output_file.as_deref())
}
