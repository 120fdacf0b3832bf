//! Cohort command-line interface

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use octofhir_cohort::cli::{correlate, load, output, report, select, validate};
use std::path::PathBuf;

/// Cohort criteria matching tool
#[derive(Parser)]
#[command(name = "cohort")]
#[command(author, version, about = "Cohort selection, reports and correlation over patient histories", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (json, table, pretty)
    #[arg(short = 'f', long, global = true)]
    format: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    /// Executor configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chain matching strategy (exhaustive, greedy)
    #[arg(long, global = true)]
    strategy: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Patient and terminology inputs
#[derive(Args)]
struct SourceArgs {
    /// Patients file (NDJSON, one patient per line)
    #[arg(short, long)]
    patients: PathBuf,

    /// Concept expressions and subsets file (JSON)
    #[arg(short, long)]
    concepts: PathBuf,

    /// Directory holding the CPT tables (default: $COHORT_DATA_DIR)
    #[arg(long)]
    cpt_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Select one page of a cohort
    Select {
        /// Criteria file (JSON)
        criteria: PathBuf,

        #[command(flatten)]
        sources: SourceArgs,

        /// Zero-based page number
        #[arg(long, default_value_t = 0)]
        page: usize,

        /// Page size (default from configuration)
        #[arg(long)]
        size: Option<usize>,
    },

    /// Build a hierarchical report
    Report {
        /// Report definition file (JSON)
        definition: PathBuf,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Correlate a treatment with a negative outcome
    Correlate {
        /// Correlation request file (JSON)
        request: PathBuf,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Validate documents without evaluating them
    Validate {
        /// Files to validate
        files: Vec<PathBuf>,

        /// Document kind
        #[arg(short, long, value_enum, default_value = "criteria")]
        kind: validate::DocumentKind,

        /// Strict mode (warnings as errors)
        #[arg(short, long)]
        strict: bool,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    output::setup_colors(&cli.color);
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Cli {
        format,
        output: output_file,
        config: config_file,
        strategy,
        command,
        ..
    } = cli;
    let data_sources = |args: SourceArgs| load::DataSources {
        patients: args.patients,
        concepts: args.concepts,
        cpt_dir: args.cpt_dir,
        config: config_file.clone(),
        strategy: strategy.clone(),
    };

    match command {
        Commands::Select {
            criteria,
            sources,
            page,
            size,
        } => {
            let config = select::SelectConfig {
                sources: data_sources(sources),
                criteria,
                page,
                size,
                output_format: format,
                output_file,
            };
            select::select(config).await
        }

        Commands::Report {
            definition,
            sources,
        } => {
            let config = report::ReportConfig {
                sources: data_sources(sources),
                definition,
                output_format: format,
                output_file,
            };
            report::report(config).await
        }

        Commands::Correlate { request, sources } => {
            let config = correlate::CorrelateConfig {
                sources: data_sources(sources),
                request,
                output_format: format,
                output_file,
            };
            correlate::correlate(config).await
        }

        Commands::Validate {
            files,
            kind,
            strict,
        } => {
            let config = validate::ValidateConfig { files, kind, strict };
            validate::validate(config).await
        }
    }
}
