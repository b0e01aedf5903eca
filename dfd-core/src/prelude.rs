//! Prelude for commonly used types and functions in dfd-core.

pub use crate::analyzers::{
    Analysis, AnalysisConfig, AnalysisReport, ColumnStatistics, DataTypeTag, TabularAnalysis,
    ValueFrequency,
};
pub use crate::backends::{
    resolve_backend, ArrowTable, Backend, BackendKind, DataSource, Dataset, EngineAvailability,
    EngineKind,
};
pub use crate::config::DatasheetConfig;
pub use crate::error::{DatasheetError, Result};
pub use crate::logging::setup::{init_logging, LoggingConfig};
pub use crate::pipeline::{analyse_source, build_datasheet, generate_template, BuildOutput, Pipeline};
pub use crate::template::{
    CompileReport, DatasetMetadata, QuestionnaireSchema, TemplateCompiler, TemplateDocument,
};
