//! Markdown datasheet documents.
//!
//! A document is a preamble followed by sections started by `#` or `##`
//! headings. Inside a section, every `###` heading opens an answer slot that
//! runs until the next heading of level three or less, or a thematic break.
//! Fenced code blocks are opaque. A section may carry one automated marker,
//! `<!-- dfd:automated -->`, optionally followed by categories.
//!
//! Parsing keeps every line, so serializing an untouched document gives back
//! the input byte for byte, apart from CRLF line endings becoming LF.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DatasheetError, Result};
use crate::template::schema::QuestionnaireSchema;

/// Text of an unanswered slot.
pub const PLACEHOLDER: &str = "[Please provide your answer here]";

const MARKER_OPEN: &str = "<!--";
const MARKER_KEYWORD: &str = "dfd:automated";
const MARKER_CLOSE: &str = "-->";

/// Stable id of a heading: lowercase, non-alphanumeric runs become one
/// hyphen, no leading or trailing hyphen.
///
/// ```rust
/// use dfd_core::template::section_id;
///
/// assert_eq!(section_id("Collection Process"), "collection-process");
/// assert_eq!(section_id("  Uses & Misuses! "), "uses-misuses");
/// ```
pub fn section_id(heading: &str) -> String {
    let mut id = String::with_capacity(heading.len());
    let mut pending_hyphen = false;
    for c in heading.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !id.is_empty() {
                id.push('-');
            }
            pending_hyphen = false;
            id.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    id
}

/// Content kinds an automated section can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutomationCategory {
    Overview,
    Numeric,
    Missing,
    TopValues,
}

impl AutomationCategory {
    pub const ALL: [AutomationCategory; 4] = [
        AutomationCategory::Overview,
        AutomationCategory::Numeric,
        AutomationCategory::Missing,
        AutomationCategory::TopValues,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationCategory::Overview => "overview",
            AutomationCategory::Numeric => "numeric",
            AutomationCategory::Missing => "missing",
            AutomationCategory::TopValues => "top-values",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == token)
    }
}

impl fmt::Display for AutomationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The marker that turns a section into an automated block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomatedMarker {
    line: usize,
    body_index: usize,
    categories: Vec<AutomationCategory>,
}

impl AutomatedMarker {
    /// 1-based line of the marker in the parsed input.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Position of the marker among the section's body lines.
    pub fn body_index(&self) -> usize {
        self.body_index
    }

    /// Explicit categories; empty means all.
    pub fn categories(&self) -> &[AutomationCategory] {
        &self.categories
    }

    pub fn includes(&self, category: AutomationCategory) -> bool {
        self.categories.is_empty() || self.categories.contains(&category)
    }
}

/// A `###` question and the text answering it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSlot {
    question: String,
    heading_line: String,
    line: usize,
    lines: Vec<String>,
}

impl AnswerSlot {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// Raw lines after the question heading.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The answer with surrounding blank lines removed.
    pub fn answer(&self) -> String {
        self.lines.join("\n").trim().to_string()
    }

    pub fn is_answered(&self) -> bool {
        let answer = self.answer();
        !answer.is_empty() && !answer.contains(PLACEHOLDER)
    }

    fn fill(&mut self, text: &str) {
        let replacement = text.lines().map(str::to_string);
        if let Some(index) = self.lines.iter().position(|l| l.trim() == PLACEHOLDER) {
            self.lines.splice(index..=index, replacement);
        } else {
            let insert_at = self
                .lines
                .iter()
                .position(|l| l.trim().is_empty())
                .map_or(0, |i| i + 1);
            if insert_at == 0 {
                self.lines.insert(0, String::new());
                self.lines.splice(1..1, replacement);
            } else {
                self.lines.splice(insert_at..insert_at, replacement);
            }
        }
    }
}

/// Body content of a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Static lines kept as written.
    Prose(Vec<String>),
    Answer(AnswerSlot),
}

impl Block {
    fn line_count(&self) -> usize {
        match self {
            Block::Prose(lines) => lines.len(),
            Block::Answer(slot) => slot.lines.len() + 1,
        }
    }
}

/// A `#` or `##` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    level: usize,
    heading: String,
    id: String,
    heading_line: String,
    line: usize,
    blocks: Vec<Block>,
    automation: Option<AutomatedMarker>,
}

impl Section {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn heading(&self) -> &str {
        &self.heading
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 1-based line of the heading.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn automation(&self) -> Option<&AutomatedMarker> {
        self.automation.as_ref()
    }

    pub fn is_automated(&self) -> bool {
        self.automation.is_some()
    }

    pub fn answer_slots(&self) -> impl Iterator<Item = &AnswerSlot> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Answer(slot) => Some(slot),
            Block::Prose(_) => None,
        })
    }

    /// The heading line as written.
    pub fn heading_line(&self) -> &str {
        &self.heading_line
    }

    /// Every line after the heading, in order.
    pub fn body_lines(&self) -> Vec<&str> {
        let mut lines = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Prose(prose) => lines.extend(prose.iter().map(String::as_str)),
                Block::Answer(slot) => {
                    lines.push(slot.heading_line.as_str());
                    lines.extend(slot.lines.iter().map(String::as_str));
                }
            }
        }
        lines
    }

    fn body_len(&self) -> usize {
        self.blocks.iter().map(Block::line_count).sum()
    }

    fn push_content(&mut self, line: &str) {
        match self.blocks.last_mut() {
            Some(Block::Answer(slot)) => slot.lines.push(line.to_string()),
            _ => self.push_prose(line),
        }
    }

    fn push_prose(&mut self, line: &str) {
        match self.blocks.last_mut() {
            Some(Block::Prose(lines)) => lines.push(line.to_string()),
            _ => self.blocks.push(Block::Prose(vec![line.to_string()])),
        }
    }
}

/// Answer slot totals outside automated sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionStatus {
    pub total_slots: usize,
    pub answered_slots: usize,
}

impl CompletionStatus {
    pub fn unanswered_slots(&self) -> usize {
        self.total_slots - self.answered_slots
    }

    /// Share of answered slots; 1.0 when there are none.
    pub fn ratio(&self) -> f64 {
        if self.total_slots == 0 {
            1.0
        } else {
            self.answered_slots as f64 / self.total_slots as f64
        }
    }
}

/// A parsed datasheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDocument {
    preamble: Vec<String>,
    sections: Vec<Section>,
    trailing_newline: bool,
}

impl TemplateDocument {
    /// Splits markdown into sections.
    ///
    /// Fails when the input has no section heading, a heading without text,
    /// a `#` run directly followed by text, an unterminated code fence, or an
    /// automated marker that is malformed or outside any section.
    pub fn parse(input: &str) -> Result<Self> {
        let normalized = input.replace("\r\n", "\n");
        let trailing_newline = normalized.ends_with('\n');
        let body = normalized.strip_suffix('\n').unwrap_or(&normalized);

        let mut parser = Parser::default();
        let mut last_line = 0;
        for (index, line) in body.split('\n').enumerate() {
            last_line = index + 1;
            parser.line(last_line, line)?;
        }
        parser.finish(last_line, trailing_newline)
    }

    /// Renders the document back to markdown.
    pub fn serialize(&self) -> String {
        let mut lines: Vec<&str> = self.preamble.iter().map(String::as_str).collect();
        for section in &self.sections {
            lines.push(&section.heading_line);
            lines.extend(section.body_lines());
        }
        let mut out = lines.join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    /// Lines before the first section.
    pub fn preamble(&self) -> &[String] {
        &self.preamble
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn ends_with_newline(&self) -> bool {
        self.trailing_newline
    }

    /// Writes `text` into an unanswered slot.
    ///
    /// Returns `false` and leaves the slot alone when it is already answered.
    /// Unknown sections and questions, and slots in automated sections, are
    /// configuration errors.
    pub fn fill_answer(&mut self, section_id: &str, question: &str, text: &str) -> Result<bool> {
        let section = self
            .sections
            .iter_mut()
            .find(|s| s.id == section_id)
            .ok_or_else(|| {
                DatasheetError::configuration(format!("no section with id '{section_id}'"))
            })?;
        if section.automation.is_some() {
            return Err(DatasheetError::configuration(format!(
                "section '{section_id}' is automated and cannot hold answers"
            )));
        }
        let wanted = question.trim();
        let slot = section
            .blocks
            .iter_mut()
            .find_map(|block| match block {
                Block::Answer(slot) if slot.question == wanted => Some(slot),
                _ => None,
            })
            .ok_or_else(|| {
                DatasheetError::configuration(format!(
                    "section '{section_id}' has no question '{wanted}'"
                ))
            })?;

        if slot.is_answered() {
            return Ok(false);
        }
        slot.fill(text);
        Ok(true)
    }

    /// Slot totals over sections without an automated marker.
    pub fn completion(&self) -> CompletionStatus {
        let mut status = CompletionStatus::default();
        for slot in self
            .sections
            .iter()
            .filter(|s| !s.is_automated())
            .flat_map(Section::answer_slots)
        {
            status.total_slots += 1;
            if slot.is_answered() {
                status.answered_slots += 1;
            }
        }
        status
    }

    /// Ids of automated sections, in document order.
    pub fn automated_sections(&self) -> Vec<String> {
        self.sections
            .iter()
            .filter(|s| s.is_automated())
            .map(|s| s.id.clone())
            .collect()
    }

    /// Ids of `##` sections the schema does not define, in document order.
    pub fn custom_sections(&self, schema: &QuestionnaireSchema) -> Vec<String> {
        let known = schema.section_ids();
        self.sections
            .iter()
            .filter(|s| s.level == 2 && !known.contains(&s.id))
            .map(|s| s.id.clone())
            .collect()
    }
}

impl fmt::Display for TemplateDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

struct Fence {
    marker: char,
    len: usize,
    line: usize,
}

impl Fence {
    fn closed_by(&self, line: &str) -> bool {
        let Some(stripped) = strip_indent(line) else {
            return false;
        };
        let run = stripped.chars().take_while(|c| *c == self.marker).count();
        run >= self.len && stripped[run * self.marker.len_utf8()..].trim().is_empty()
    }
}

#[derive(Default)]
struct Parser {
    preamble: Vec<String>,
    sections: Vec<Section>,
    fence: Option<Fence>,
}

impl Parser {
    fn error(&self, line: usize, reason: impl Into<String>) -> DatasheetError {
        let section = self.sections.last().map(|s| s.heading.as_str());
        DatasheetError::template_parse(line, section, reason)
    }

    fn push_content(&mut self, line: &str) {
        match self.sections.last_mut() {
            Some(section) => section.push_content(line),
            None => self.preamble.push(line.to_string()),
        }
    }

    fn line(&mut self, number: usize, line: &str) -> Result<()> {
        if let Some(fence) = &self.fence {
            if fence.closed_by(line) {
                self.fence = None;
            }
            self.push_content(line);
            return Ok(());
        }
        if let Some((marker, len)) = opening_fence(line) {
            self.fence = Some(Fence {
                marker,
                len,
                line: number,
            });
            self.push_content(line);
            return Ok(());
        }

        match scan_heading(line) {
            HeadingScan::Unspaced(level) if level <= 3 => {
                warn!(
                    line = number,
                    "'{}' directly followed by text is kept as prose, not a heading",
                    "#".repeat(level)
                );
            }
            HeadingScan::Heading(level, text) if level <= 3 => {
                if text.is_empty() {
                    return Err(self.error(number, "heading has no text"));
                }
                return self.heading(number, line, level, text);
            }
            _ => {}
        }

        if let Some(scan) = scan_marker(line) {
            let categories = scan.map_err(|reason| self.error(number, reason))?;
            if self.sections.is_empty() {
                return Err(self.error(number, "automated marker outside any section"));
            }
            if self.sections.last().is_some_and(Section::is_automated) {
                return Err(self.error(number, "section has more than one automated marker"));
            }
            if let Some(section) = self.sections.last_mut() {
                section.automation = Some(AutomatedMarker {
                    line: number,
                    body_index: section.body_len(),
                    categories,
                });
                section.push_content(line);
            }
            return Ok(());
        }

        if is_thematic_break(line) {
            match self.sections.last_mut() {
                Some(section) => section.push_prose(line),
                None => self.preamble.push(line.to_string()),
            }
            return Ok(());
        }

        self.push_content(line);
        Ok(())
    }

    fn heading(&mut self, number: usize, line: &str, level: usize, text: &str) -> Result<()> {
        if level <= 2 {
            let id = section_id(text);
            if id.is_empty() {
                return Err(self.error(number, "heading has no letters or digits"));
            }
            self.sections.push(Section {
                level,
                heading: text.to_string(),
                id,
                heading_line: line.to_string(),
                line: number,
                blocks: Vec::new(),
                automation: None,
            });
            return Ok(());
        }

        match self.sections.last_mut() {
            Some(section) => section.blocks.push(Block::Answer(AnswerSlot {
                question: text.to_string(),
                heading_line: line.to_string(),
                line: number,
                lines: Vec::new(),
            })),
            None => self.preamble.push(line.to_string()),
        }
        Ok(())
    }

    fn finish(self, last_line: usize, trailing_newline: bool) -> Result<TemplateDocument> {
        if let Some(fence) = &self.fence {
            let section = self
                .sections
                .iter()
                .rev()
                .find(|s| s.line < fence.line)
                .map(|s| s.heading.as_str());
            return Err(DatasheetError::template_parse(
                fence.line,
                section,
                "unterminated code fence",
            ));
        }
        if self.sections.is_empty() {
            return Err(DatasheetError::template_parse(
                last_line.max(1),
                None,
                "no section headings found",
            ));
        }
        Ok(TemplateDocument {
            preamble: self.preamble,
            sections: self.sections,
            trailing_newline,
        })
    }
}

/// Strips up to three leading spaces; more means an indented code line.
fn strip_indent(line: &str) -> Option<&str> {
    let spaces = line.len() - line.trim_start_matches(' ').len();
    (spaces <= 3).then(|| &line[spaces..])
}

fn opening_fence(line: &str) -> Option<(char, usize)> {
    let stripped = strip_indent(line)?;
    let marker = stripped.chars().next()?;
    if marker != '`' && marker != '~' {
        return None;
    }
    let len = stripped.chars().take_while(|c| *c == marker).count();
    (len >= 3).then_some((marker, len))
}

enum HeadingScan<'a> {
    Heading(usize, &'a str),
    /// `#` run directly followed by a letter or digit, e.g. `#1` or `##Uses`.
    Unspaced(usize),
    NotHeading,
}

fn scan_heading(line: &str) -> HeadingScan<'_> {
    let Some(stripped) = strip_indent(line) else {
        return HeadingScan::NotHeading;
    };
    let level = stripped.bytes().take_while(|b| *b == b'#').count();
    if level == 0 || level > 6 {
        return HeadingScan::NotHeading;
    }
    let rest = &stripped[level..];
    match rest.chars().next() {
        None => HeadingScan::Heading(level, ""),
        Some(' ') | Some('\t') => HeadingScan::Heading(level, heading_text(rest)),
        Some(c) if c.is_alphanumeric() => HeadingScan::Unspaced(level),
        Some(_) => HeadingScan::NotHeading,
    }
}

/// Heading text without the optional closing `#` sequence.
fn heading_text(rest: &str) -> &str {
    let text = rest.trim();
    let without_closing = text.trim_end_matches('#');
    if without_closing.is_empty() {
        ""
    } else if without_closing.len() < text.len()
        && without_closing.ends_with(|c: char| c == ' ' || c == '\t')
    {
        without_closing.trim_end()
    } else {
        text
    }
}

pub(crate) fn is_thematic_break(line: &str) -> bool {
    let Some(stripped) = strip_indent(line) else {
        return false;
    };
    let mut chars = stripped.chars().filter(|c| !c.is_whitespace());
    let Some(first) = chars.next() else {
        return false;
    };
    if !matches!(first, '-' | '*' | '_') {
        return false;
    }
    let mut count = 1;
    for c in chars {
        if c != first {
            return false;
        }
        count += 1;
    }
    count >= 3
}

type MarkerScan = std::result::Result<Vec<AutomationCategory>, String>;

fn scan_marker(line: &str) -> Option<MarkerScan> {
    let trimmed = line.trim();
    let rest = trimmed
        .strip_prefix(MARKER_OPEN)?
        .trim_start()
        .strip_prefix(MARKER_KEYWORD)?;
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace) || rest.starts_with(MARKER_CLOSE))
    {
        return None;
    }
    let Some(body) = rest.strip_suffix(MARKER_CLOSE) else {
        return Some(Err(format!(
            "automated marker must close with '{MARKER_CLOSE}' on the same line"
        )));
    };

    let mut categories = Vec::new();
    for token in body.split_whitespace() {
        match AutomationCategory::from_token(token) {
            Some(category) if !categories.contains(&category) => categories.push(category),
            Some(_) => {}
            None => return Some(Err(format!("unknown automated category '{token}'"))),
        }
    }
    Some(Ok(categories))
}
