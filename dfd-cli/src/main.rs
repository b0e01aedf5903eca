//! dfd - generate and build datasheets for tabular datasets.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use dfd_core::prelude::*;
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(name = "dfd", version, about = "Datasheets for datasets")]
struct Cli {
    /// Log debug output from dfd
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a blank datasheet template
    GenerateTemplate {
        /// Destination file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Questionnaire schema as JSON (default: Datasheets for Datasets)
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Analyse a dataset and compile its datasheet
    Build(BuildArgs),

    /// Analyse a dataset and print the column statistics as JSON
    Analyse {
        /// Data file (.csv, .tsv, .parquet or .json)
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        backend: Option<BackendKind>,
    },
}

#[derive(Debug, Args)]
struct BuildArgs {
    /// Data file (.csv, .tsv, .parquet or .json)
    #[arg(short, long)]
    data: PathBuf,

    /// Filled-in template to compile (default: a fresh blank template)
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Destination file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pipeline settings as JSON; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Questionnaire schema as JSON
    #[arg(long)]
    schema: Option<PathBuf>,

    #[arg(long)]
    name: Option<String>,

    #[arg(long = "version")]
    dataset_version: Option<String>,

    /// Date printed in the overview, YYYY-MM-DD (default: today)
    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(short, long)]
    backend: Option<BackendKind>,

    #[arg(long)]
    sample_size: Option<usize>,

    #[arg(long)]
    cardinality_threshold: Option<u64>,
}

impl BuildArgs {
    /// The config file, if any, with flags applied on top.
    fn datasheet_config(&self) -> Result<DatasheetConfig> {
        let mut config = match &self.config {
            Some(path) => DatasheetConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => DatasheetConfig::default(),
        };

        if let Some(name) = &self.name {
            config.dataset_name = name.clone();
        } else if self.config.is_none() {
            if let Some(stem) = self.data.file_stem() {
                config.dataset_name = stem.to_string_lossy().into_owned();
            }
        }
        if let Some(version) = &self.dataset_version {
            config.version = version.clone();
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(sample_size) = self.sample_size {
            config.sample_size = sample_size;
        }
        if let Some(threshold) = self.cardinality_threshold {
            config.cardinality_threshold = threshold;
        }
        config.generated_on = self
            .date
            .or(config.generated_on)
            .or_else(|| Some(Local::now().date_naive()));

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = if cli.log_json {
        LoggingConfig::production()
    } else if cli.verbose {
        LoggingConfig::development()
    } else {
        LoggingConfig::default()
    };
    init_logging(logging)?;

    run(cli.command)
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::GenerateTemplate { output, schema } => {
            let schema = load_schema(schema.as_deref())?;
            let template = generate_template(&schema)?;
            emit(output.as_deref(), &template)
        }
        Command::Build(args) => {
            let config = args.datasheet_config()?;
            let schema = load_schema(args.schema.as_deref())?;
            let template = args
                .template
                .as_deref()
                .map(|path| {
                    fs::read_to_string(path)
                        .with_context(|| format!("Failed to read template {}", path.display()))
                })
                .transpose()?;

            let output = Pipeline::new(config)
                .with_schema(schema)
                .build(DataSource::path(&args.data), template.as_deref())
                .with_context(|| format!("Failed to build datasheet for {}", args.data.display()))?;

            for warning in &output.compile.warnings {
                warn!(column = %warning.column, "{}", warning.message);
            }
            let completion = output.compile.completion;
            info!(
                answered = completion.answered_slots,
                total = completion.total_slots,
                "Datasheet built"
            );
            emit(args.output.as_deref(), &output.document)
        }
        Command::Analyse { data, backend } => {
            let config = DatasheetConfig::default().with_backend(backend.unwrap_or_default());
            let report = analyse_source(&config, DataSource::path(&data))
                .with_context(|| format!("Failed to analyse {}", data.display()))?;
            emit(None, &report.to_json()?)
        }
    }
}

fn load_schema(path: Option<&Path>) -> Result<QuestionnaireSchema> {
    match path {
        Some(path) => QuestionnaireSchema::from_json_file(path)
            .with_context(|| format!("Failed to load schema {}", path.display())),
        None => Ok(QuestionnaireSchema::datasheets_for_datasets()),
    }
}

fn emit(output: Option<&Path>, contents: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, contents)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            debug!(path = %path.display(), bytes = contents.len(), "Wrote output");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(contents.as_bytes())?;
            if !contents.ends_with('\n') {
                writeln!(stdout)?;
            }
        }
    }
    Ok(())
}
