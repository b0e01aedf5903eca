//! Template generation and compilation.
//!
//! # Example
//!
//! ```rust
//! use dfd_core::analyzers::{ColumnStatistics, DataTypeTag};
//! use dfd_core::template::{DatasetMetadata, QuestionnaireSchema, TemplateCompiler};
//!
//! let compiler = TemplateCompiler::new(QuestionnaireSchema::datasheets_for_datasets());
//! let template = compiler.generate().unwrap();
//!
//! let stats = vec![ColumnStatistics::counts_only("id", DataTypeTag::Numeric, 10, 0)];
//! let compiled = compiler
//!     .compile(&template, &stats, &DatasetMetadata::new("Customers", "1.0"))
//!     .unwrap();
//! assert!(compiled.document.contains("### Missing Data"));
//! assert_eq!(compiled.report.automated_sections, vec!["automated-analysis"]);
//! ```

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::analyzers::types::{AnalysisReport, AnalysisWarning, ColumnStatistics};
use crate::error::Result;
use crate::template::document::{CompletionStatus, TemplateDocument, PLACEHOLDER};
use crate::template::render::{DatasetMetadata, DatasheetLayout, Layout};
use crate::template::schema::QuestionnaireSchema;

/// Marker written into automated sections of generated templates.
pub const AUTOMATED_MARKER: &str = "<!-- dfd:automated -->";

/// Body of an automated section before its first compilation.
pub const AUTOMATED_PLACEHOLDER: &str =
    "[This section will be automatically populated by the compiler]";

/// Summary of one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileReport {
    /// Ids of the sections rewritten from statistics.
    pub automated_sections: Vec<String>,
    /// Ids of `##` sections the schema does not define.
    pub custom_sections: Vec<String>,
    pub completion: CompletionStatus,
    /// Columns whose analysis was recovered.
    pub warnings: Vec<AnalysisWarning>,
}

/// A compiled datasheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDatasheet {
    pub document: String,
    pub report: CompileReport,
}

/// Generates blank templates and merges statistics into edited ones.
#[derive(Debug, Clone)]
pub struct TemplateCompiler<L: Layout = DatasheetLayout> {
    schema: QuestionnaireSchema,
    layout: L,
}

impl TemplateCompiler<DatasheetLayout> {
    pub fn new(schema: QuestionnaireSchema) -> Self {
        Self::with_layout(schema, DatasheetLayout)
    }
}

impl Default for TemplateCompiler<DatasheetLayout> {
    fn default() -> Self {
        Self::new(QuestionnaireSchema::datasheets_for_datasets())
    }
}

impl<L: Layout> TemplateCompiler<L> {
    pub fn with_layout(schema: QuestionnaireSchema, layout: L) -> Self {
        Self { schema, layout }
    }

    pub fn schema(&self) -> &QuestionnaireSchema {
        &self.schema
    }

    /// Writes the blank questionnaire. The same schema always yields the same
    /// bytes.
    #[instrument(skip(self), fields(title = %self.schema.title))]
    pub fn generate(&self) -> Result<String> {
        self.schema.validate()?;

        let mut out = String::new();
        writeln!(out, "# {}", self.schema.title)?;
        if !self.schema.intro.is_empty() {
            writeln!(out)?;
            for line in &self.schema.intro {
                writeln!(out, "{line}")?;
            }
        }

        for section in &self.schema.sections {
            writeln!(out)?;
            writeln!(out, "---")?;
            writeln!(out)?;
            writeln!(out, "## {}", section.heading)?;
            if let Some(guidance) = &section.guidance {
                writeln!(out)?;
                writeln!(out, "*{guidance}*")?;
            }
            for question in &section.questions {
                writeln!(out)?;
                writeln!(out, "### {question}")?;
                writeln!(out)?;
                writeln!(out, "{PLACEHOLDER}")?;
            }
            if section.automated {
                writeln!(out)?;
                writeln!(out, "{AUTOMATED_MARKER}")?;
                writeln!(out)?;
                writeln!(out, "{AUTOMATED_PLACEHOLDER}")?;
            }
        }

        debug!(sections = self.schema.sections.len(), bytes = out.len(), "Generated template");
        Ok(out)
    }

    /// Parses a template.
    pub fn parse(&self, template: &str) -> Result<TemplateDocument> {
        TemplateDocument::parse(template)
    }

    /// Rewrites the automated sections of `template` from `statistics`.
    ///
    /// Everything else, including unanswered placeholders and sections the
    /// schema does not know, is kept as written.
    #[instrument(skip_all, fields(dataset = %metadata.name, columns = statistics.len()))]
    pub fn compile(
        &self,
        template: &str,
        statistics: &[ColumnStatistics],
        metadata: &DatasetMetadata,
    ) -> Result<CompiledDatasheet> {
        let document = self.parse(template)?;
        self.compile_document(&document, statistics, metadata)
    }

    /// Like [`compile`](Self::compile) for an already parsed document.
    pub fn compile_document(
        &self,
        document: &TemplateDocument,
        statistics: &[ColumnStatistics],
        metadata: &DatasetMetadata,
    ) -> Result<CompiledDatasheet> {
        let rendered = self.layout.render(document, statistics, metadata)?;
        let report = CompileReport {
            automated_sections: rendered.automated_sections(),
            custom_sections: rendered.custom_sections(&self.schema),
            completion: rendered.completion(),
            warnings: Vec::new(),
        };

        info!(
            automated = report.automated_sections.len(),
            custom = report.custom_sections.len(),
            answered = report.completion.answered_slots,
            slots = report.completion.total_slots,
            "Compiled datasheet"
        );
        Ok(CompiledDatasheet {
            document: rendered.serialize(),
            report,
        })
    }

    /// Compiles against a full analysis and carries its warnings into the
    /// report.
    pub fn compile_report(
        &self,
        template: &str,
        analysis: &AnalysisReport,
        metadata: &DatasetMetadata,
    ) -> Result<CompiledDatasheet> {
        let mut compiled = self.compile(template, &analysis.statistics, metadata)?;
        compiled.report.warnings = analysis.warnings.clone();
        Ok(compiled)
    }
}
