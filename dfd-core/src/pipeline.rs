//! End-to-end entry points: load, analyse, compile.
//!
//! # Example
//!
//! ```rust,no_run
//! use dfd_core::backends::DataSource;
//! use dfd_core::config::DatasheetConfig;
//! use dfd_core::pipeline::build_datasheet;
//!
//! # fn example() -> dfd_core::error::Result<()> {
//! let config = DatasheetConfig::new("Customers").with_version("2.0");
//! let output = build_datasheet(&config, DataSource::path("customers.csv"), None)?;
//! std::fs::write("DATASHEET.md", &output.document)?;
//! # Ok(())
//! # }
//! ```

use tracing::{info, instrument, warn};

use crate::analyzers::tabular::{Analysis, TabularAnalysis};
use crate::analyzers::types::AnalysisReport;
use crate::backends::{resolve_backend, DataSource, EngineAvailability};
use crate::config::DatasheetConfig;
use crate::error::Result;
use crate::template::compiler::{CompileReport, TemplateCompiler};
use crate::template::schema::QuestionnaireSchema;

/// Result of [`build_datasheet`].
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// The compiled markdown.
    pub document: String,
    pub analysis: AnalysisReport,
    pub compile: CompileReport,
}

/// A configured pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: DatasheetConfig,
    schema: QuestionnaireSchema,
    availability: EngineAvailability,
}

impl Pipeline {
    pub fn new(config: DatasheetConfig) -> Self {
        Self {
            config,
            schema: QuestionnaireSchema::datasheets_for_datasets(),
            availability: EngineAvailability::compiled(),
        }
    }

    pub fn with_schema(mut self, schema: QuestionnaireSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Restricts the engines backend resolution may pick.
    pub fn with_availability(mut self, availability: EngineAvailability) -> Self {
        self.availability = availability;
        self
    }

    pub fn config(&self) -> &DatasheetConfig {
        &self.config
    }

    /// Loads the source with the configured engine and analyses every column.
    #[instrument(skip(self, source), fields(location = %source.location(), backend = %self.config.backend))]
    pub fn analyse(&self, source: DataSource) -> Result<AnalysisReport> {
        self.config.validate()?;
        let backend = resolve_backend(self.config.backend, &source, self.availability)?;
        info!(engine = %backend.kind(), "Resolved backend");
        let dataset = backend.load(source)?;
        TabularAnalysis::with_config(self.config.analysis_config()).analyse(backend.as_ref(), &dataset)
    }

    /// Analyses the source and compiles the datasheet.
    ///
    /// Without a template, a blank one is generated from the schema and the
    /// configured answers are written into it before compiling.
    pub fn build(&self, source: DataSource, template: Option<&str>) -> Result<BuildOutput> {
        let analysis = self.analyse(source)?;
        let compiler = TemplateCompiler::new(self.schema.clone());
        let metadata = self.config.metadata();

        let mut compiled = match template {
            Some(template) => {
                if !self.config.answers.is_empty() {
                    warn!("Configured answers are only applied to generated templates");
                }
                compiler.compile(template, &analysis.statistics, &metadata)?
            }
            None => {
                let generated = compiler.generate()?;
                let mut document = compiler.parse(&generated)?;
                for (section, answers) in &self.config.answers {
                    for (question, text) in answers {
                        if !document.fill_answer(section, question, text)? {
                            warn!(section = %section, question = %question, "Slot already answered");
                        }
                    }
                }
                compiler.compile_document(&document, &analysis.statistics, &metadata)?
            }
        };
        compiled.report.warnings = analysis.warnings.clone();

        Ok(BuildOutput {
            document: compiled.document,
            analysis,
            compile: compiled.report,
        })
    }
}

/// Builds a datasheet with the default questionnaire and all compiled engines.
pub fn build_datasheet(
    config: &DatasheetConfig,
    source: DataSource,
    template: Option<&str>,
) -> Result<BuildOutput> {
    Pipeline::new(config.clone()).build(source, template)
}

/// Analyses a source without producing a document.
pub fn analyse_source(config: &DatasheetConfig, source: DataSource) -> Result<AnalysisReport> {
    Pipeline::new(config.clone()).analyse(source)
}

/// Generates a blank template for a questionnaire.
pub fn generate_template(schema: &QuestionnaireSchema) -> Result<String> {
    TemplateCompiler::new(schema.clone()).generate()
}
