//! Questionnaire schemas.
//!
//! A [`QuestionnaireSchema`] lists the sections of a datasheet, their
//! questions and which sections are filled automatically from statistics.
//! [`QuestionnaireSchema::datasheets_for_datasets`] ships the questionnaire
//! of Gebru et al.; custom schemas are loaded from JSON.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DatasheetError, Result};
use crate::template::document::section_id;

/// Section ids every datasheet must contain unless a schema says otherwise.
pub const REQUIRED_SECTIONS: [&str; 7] = [
    "motivation",
    "composition",
    "collection-process",
    "preprocessing",
    "uses",
    "distribution",
    "maintenance",
];

/// One section of a questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDef {
    pub heading: String,
    /// Italic guidance shown under the heading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    #[serde(default)]
    pub questions: Vec<String>,
    /// Filled from statistics by the compiler.
    #[serde(default)]
    pub automated: bool,
}

impl SectionDef {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            guidance: None,
            questions: Vec::new(),
            automated: false,
        }
    }

    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }

    pub fn with_questions<I, S>(mut self, questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.questions.extend(questions.into_iter().map(Into::into));
        self
    }

    pub fn automated(mut self) -> Self {
        self.automated = true;
        self
    }

    /// Stable id derived from the heading.
    pub fn id(&self) -> String {
        section_id(&self.heading)
    }
}

fn default_required() -> Vec<String> {
    REQUIRED_SECTIONS.iter().map(|s| s.to_string()).collect()
}

/// The sections and questions of a datasheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireSchema {
    /// Level-one heading of the generated document.
    pub title: String,
    /// Lines emitted under the title.
    #[serde(default)]
    pub intro: Vec<String>,
    pub sections: Vec<SectionDef>,
    /// Section ids that must be present.
    #[serde(default = "default_required")]
    pub required: Vec<String>,
}

impl Default for QuestionnaireSchema {
    fn default() -> Self {
        Self::datasheets_for_datasets()
    }
}

impl QuestionnaireSchema {
    /// The questionnaire from "Datasheets for Datasets" (Gebru et al.).
    pub fn datasheets_for_datasets() -> Self {
        let sections = vec![
            SectionDef::new("Motivation")
                .with_guidance(
                    "The questions in this section are primarily intended to encourage dataset \
                     creators to clearly articulate their reasons for creating the dataset and to \
                     promote transparency about funding interests.",
                )
                .with_questions([
                    "For what purpose was the dataset created?",
                    "Who created the dataset?",
                    "Who funded the creation of the dataset?",
                    "Any other comments?",
                ]),
            SectionDef::new("Composition")
                .with_guidance(
                    "Dataset creators should read through the questions in this section prior to \
                     any data collection and then provide answers once collection is complete.",
                )
                .with_questions([
                    "What do the instances that comprise the dataset represent?",
                    "How many instances are there in total?",
                    "Does the dataset contain all possible instances or is it a sample?",
                    "What data does each instance consist of?",
                ]),
            SectionDef::new("Collection Process")
                .with_guidance(
                    "As with the previous section, dataset creators should read through these \
                     questions prior to any data collection to flag potential issues and then \
                     provide answers once collection is complete.",
                )
                .with_questions([
                    "How was the data associated with each instance acquired?",
                    "What mechanisms or procedures were used to collect the data?",
                    "If the dataset is a sample from a larger set, what was the sampling strategy?",
                ]),
            SectionDef::new("Preprocessing")
                .with_guidance(
                    "Dataset creators should read through these questions prior to any data \
                     collection to flag potential issues and then provide answers once collection \
                     is complete.",
                )
                .with_questions([
                    "Was any preprocessing/cleaning/labeling of the data done?",
                    "Was the \"raw\" data saved in addition to the preprocessed/cleaned/labeled data?",
                ]),
            SectionDef::new("Uses")
                .with_guidance(
                    "These questions are intended to encourage dataset creators to reflect on the \
                     tasks for which the dataset should and should not be used.",
                )
                .with_questions([
                    "Has the dataset been used for any tasks already?",
                    "Is there a repository that links to any or all papers or systems that use the dataset?",
                    "What (other) tasks could the dataset be used for?",
                    "Is there anything about the composition of the dataset or the way it was collected and preprocessed/cleaned/labeled that might impact future uses?",
                ]),
            SectionDef::new("Distribution")
                .with_guidance(
                    "Dataset creators should read through these questions prior to any data \
                     collection to flag potential issues and then provide answers once collection \
                     is complete.",
                )
                .with_questions([
                    "Will the dataset be distributed to third parties outside of the entity?",
                    "How will the dataset be distributed?",
                    "When will the dataset be distributed?",
                    "Will the dataset be distributed under a copyright or other intellectual property (IP) license?",
                ]),
            SectionDef::new("Maintenance")
                .with_guidance(
                    "These questions are intended to encourage dataset creators to plan for \
                     dataset maintenance and communicate this plan with dataset consumers.",
                )
                .with_questions([
                    "Who will be supporting/hosting/maintaining the dataset?",
                    "How can the owner/curator/manager of the dataset be contacted?",
                    "Is there an erratum?",
                    "Will the dataset be updated?",
                ]),
            SectionDef::new("Automated Analysis")
                .with_guidance(
                    "This section is generated from the dataset and is rewritten on every \
                     compilation.",
                )
                .automated(),
        ];

        Self {
            title: "Datasheet for Dataset".to_string(),
            intro: vec![
                "*This datasheet template is based on the paper ['Datasheets for Datasets' by Gebru et al.](https://arxiv.org/abs/1803.09010)*"
                    .to_string(),
            ],
            sections,
            required: default_required(),
        }
    }

    /// Parses a schema from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a schema from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            DatasheetError::configuration(format!(
                "cannot read schema {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&json)
    }

    /// Ids of the schema's sections, in order.
    pub fn section_ids(&self) -> Vec<String> {
        self.sections.iter().map(SectionDef::id).collect()
    }

    /// Whether a section id belongs to this schema.
    pub fn knows(&self, id: &str) -> bool {
        self.sections.iter().any(|s| s.id() == id)
    }

    /// Checks that every heading yields a unique id and that the required
    /// sections are present.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(DatasheetError::configuration("schema title cannot be empty"));
        }

        let mut seen = BTreeSet::new();
        for section in &self.sections {
            let id = section.id();
            if id.is_empty() {
                return Err(DatasheetError::configuration(format!(
                    "section heading '{}' has no letters or digits",
                    section.heading
                )));
            }
            if !seen.insert(id.clone()) {
                return Err(DatasheetError::configuration(format!(
                    "duplicate section id '{id}'"
                )));
            }
            let single_line = |text: &str| !text.trim().is_empty() && !text.contains(['\r', '\n']);
            if !single_line(&section.heading) {
                return Err(DatasheetError::configuration(format!(
                    "section heading of '{id}' must be a single line"
                )));
            }
            if let Some(question) = section.questions.iter().find(|q| !single_line(q)) {
                return Err(DatasheetError::configuration(format!(
                    "question {question:?} in section '{id}' must be a single non-empty line"
                )));
            }
        }

        let missing: Vec<&str> = self
            .required
            .iter()
            .map(String::as_str)
            .filter(|id| !seen.contains(*id))
            .collect();
        if !missing.is_empty() {
            return Err(DatasheetError::configuration(format!(
                "missing required sections: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}
