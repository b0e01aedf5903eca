//! Datasheet templates.
//!
//! - [`schema`]: the questionnaire a blank template is generated from
//! - [`document`]: parsing and serializing edited markdown
//! - [`render`]: turning statistics into markdown for automated sections
//! - [`compiler`]: generation and compilation entry points

pub mod compiler;
pub mod document;
pub mod render;
pub mod schema;

pub use compiler::{
    CompileReport, CompiledDatasheet, TemplateCompiler, AUTOMATED_MARKER, AUTOMATED_PLACEHOLDER,
};
pub use document::{
    section_id, AnswerSlot, AutomatedMarker, AutomationCategory, Block, CompletionStatus, Section,
    TemplateDocument, PLACEHOLDER,
};
pub use render::{DatasetMetadata, DatasheetLayout, Layout, NOT_ANALYZED};
pub use schema::{QuestionnaireSchema, SectionDef, REQUIRED_SECTIONS};
