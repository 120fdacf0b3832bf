//! Output formatting utilities

use anyhow::{Context, Result};
use colored::Colorize;
use octofhir_cohort_eval::{CohortPage, ReportNode, StatisticalCorrelationReport};
use serde::Serialize;
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    JsonPretty,
    Table,
}

impl OutputFormat {
    pub fn from_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" | "json-pretty" => Self::JsonPretty,
            "table" => Self::Table,
            _ => Self::JsonPretty,
        }
    }
}

/// Set up color output based on user preference
pub fn setup_colors(mode: &str) {
    match mode.to_lowercase().as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::set_override(io::stderr().is_terminal()),
    }
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error) -> String {
    format!("{} {:#}", "Error:".red().bold(), error)
}

/// Format a warning for display
pub fn format_warning(warning: &str) -> String {
    format!("{} {}", "Warning:".yellow().bold(), warning)
}

/// Format a success message for display
pub fn format_success(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write to output file: {}", path.display()))?;
        eprintln!(
            "{}",
            format_success(&format!("Output written to {}", path.display()))
        );
    } else {
        println!("{}", content);
    }
    Ok(())
}

/// Serialize a value as JSON
pub fn format_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).context("Failed to serialize JSON")
    } else {
        serde_json::to_string(value).context("Failed to serialize JSON")
    }
}

/// Types with a tabular rendering
pub trait TableView {
    fn to_table(&self) -> String;
}

/// Render in the requested format and write it out
pub fn print_output<T>(value: &T, format: OutputFormat, output_file: Option<&Path>) -> Result<()>
where
    T: Serialize + TableView,
{
    let content = match format {
        OutputFormat::Json => format_json(value, false)?,
        OutputFormat::JsonPretty => format_json(value, true)?,
        OutputFormat::Table => value.to_table(),
    };
    write_output(&content, output_file)
}

#[derive(Tabled)]
struct PatientRow {
    #[tabled(rename = "Patient")]
    id: String,
    #[tabled(rename = "Sex")]
    sex: String,
    #[tabled(rename = "Birth date")]
    birth_date: String,
    #[tabled(rename = "Events")]
    events: usize,
}

#[derive(Tabled)]
struct CostRow {
    #[tabled(rename = "CPT")]
    code: String,
    #[tabled(rename = "Count")]
    count: u64,
    #[tabled(rename = "Work RVU")]
    work_rvu: String,
    #[tabled(rename = "Facility payment")]
    facility_payment: String,
    #[tabled(rename = "Non-facility payment")]
    non_facility_payment: String,
}

fn format_amount(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

fn cost_table<'a, I>(totals: I) -> String
where
    I: IntoIterator<Item = &'a octofhir_cohort_eval::CptTotals>,
{
    let rows: Vec<CostRow> = totals
        .into_iter()
        .map(|t| CostRow {
            code: t.cpt_code.clone(),
            count: t.count,
            work_rvu: format_amount(t.work_rvu),
            facility_payment: format_amount(t.total_medicare_physician_fee_schedule_facility_payment),
            non_facility_payment: format_amount(
                t.total_medicare_physician_fee_schedule_non_facility_payment,
            ),
        })
        .collect();
    Table::new(rows).with(Style::modern()).to_string()
}

impl TableView for CohortPage {
    fn to_table(&self) -> String {
        let rows: Vec<PatientRow> = self
            .patients
            .iter()
            .map(|p| PatientRow {
                id: p.id.clone(),
                sex: p.sex.to_string(),
                birth_date: p.birth_date.to_string(),
                events: p.events.len(),
            })
            .collect();
        let mut out = Table::new(rows).with(Style::modern()).to_string();
        out.push_str(&format!(
            "\npage {} of {} ({} patients in cohort)",
            self.page + 1,
            self.total_pages().max(1),
            self.total
        ));
        if let Some(totals) = &self.cpt_totals {
            out.push('\n');
            out.push_str(&cost_table(totals.values()));
        }
        out
    }
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Group")]
    name: String,
    #[tabled(rename = "Patients")]
    patient_count: usize,
}

fn report_rows(node: &ReportNode, depth: usize, rows: &mut Vec<ReportRow>) {
    rows.push(ReportRow {
        name: format!("{}{}", "  ".repeat(depth), node.name),
        patient_count: node.patient_count,
    });
    for group in &node.groups {
        report_rows(group, depth + 1, rows);
    }
}

impl TableView for ReportNode {
    fn to_table(&self) -> String {
        let mut rows = Vec::new();
        report_rows(self, 0, &mut rows);
        Table::new(rows).with(Style::modern()).to_string()
    }
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

impl TableView for StatisticalCorrelationReport {
    fn to_table(&self) -> String {
        let rows = vec![
            MetricRow { metric: "All patients", value: self.all_patients_count.to_string() },
            MetricRow { metric: "Cohort", value: self.cohort_total().to_string() },
            MetricRow { metric: "With treatment", value: self.with_treatment_count.to_string() },
            MetricRow {
                metric: "With treatment, negative outcome",
                value: self.with_treatment_with_negative_outcome_count.to_string(),
            },
            MetricRow { metric: "Without treatment", value: self.without_treatment_count.to_string() },
            MetricRow {
                metric: "Without treatment, negative outcome",
                value: self.without_treatment_with_negative_outcome_count.to_string(),
            },
            MetricRow {
                metric: "With treatment chance of negative outcome (%)",
                value: self.with_treatment_chance_of_negative_outcome(),
            },
            MetricRow {
                metric: "Without treatment chance of negative outcome (%)",
                value: self.without_treatment_chance_of_negative_outcome(),
            },
            MetricRow {
                metric: "Hazard ratio",
                value: self.treatment_negative_outcome_hazard_ratio(),
            },
        ];
        Table::new(rows).with(Style::modern()).to_string()
    }
}
