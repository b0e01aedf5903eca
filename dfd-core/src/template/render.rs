//! Rendering statistics into automated sections.

use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analyzers::types::{ColumnStatistics, DataTypeTag};
use crate::error::Result;
use crate::template::document::{
    is_thematic_break, AutomatedMarker, AutomationCategory, TemplateDocument,
};

/// Shown in automated sections when there are no statistics.
pub const NOT_ANALYZED: &str =
    "*Not yet analyzed. Compile this datasheet against a dataset to fill in this section.*";

/// Descriptive metadata printed in the dataset overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_on: Option<NaiveDate>,
}

impl Default for DatasetMetadata {
    fn default() -> Self {
        Self {
            name: "Unnamed dataset".to_string(),
            version: "1.0".to_string(),
            generated_on: None,
        }
    }
}

impl DatasetMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            generated_on: None,
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.generated_on = Some(date);
        self
    }
}

/// Produces the automated content of a document.
pub trait Layout {
    /// Returns `document` with every automated section rewritten from
    /// `statistics`. Other sections must come back unchanged.
    fn render(
        &self,
        document: &TemplateDocument,
        statistics: &[ColumnStatistics],
        metadata: &DatasetMetadata,
    ) -> Result<TemplateDocument>;
}

/// Default markdown layout: overview list plus numeric, missing data and top
/// value tables.
#[derive(Debug, Clone, Default)]
pub struct DatasheetLayout;

impl Layout for DatasheetLayout {
    fn render(
        &self,
        document: &TemplateDocument,
        statistics: &[ColumnStatistics],
        metadata: &DatasetMetadata,
    ) -> Result<TemplateDocument> {
        let mut lines: Vec<String> = document.preamble().to_vec();
        for section in document.sections() {
            lines.push(section.heading_line().to_string());
            let body = section.body_lines();
            let Some(marker) = section.automation() else {
                lines.extend(body.iter().map(|l| l.to_string()));
                continue;
            };

            let index = marker.body_index();
            lines.extend(body[..=index].iter().map(|l| l.to_string()));
            lines.push(String::new());
            let content = self.content(marker, statistics, metadata)?;
            lines.extend(content.lines().map(str::to_string));

            let after = &body[index + 1..];
            if let Some(start) = after.iter().rposition(|l| is_thematic_break(l)) {
                lines.push(String::new());
                lines.extend(after[start..].iter().map(|l| l.to_string()));
            }
        }

        let mut text = lines.join("\n");
        if document.ends_with_newline() {
            text.push('\n');
        }
        TemplateDocument::parse(&text)
    }
}

impl DatasheetLayout {
    pub fn new() -> Self {
        Self
    }

    /// Markdown for one automated section, without surrounding blank lines.
    pub fn content(
        &self,
        marker: &AutomatedMarker,
        statistics: &[ColumnStatistics],
        metadata: &DatasetMetadata,
    ) -> Result<String> {
        if statistics.is_empty() {
            return Ok(NOT_ANALYZED.to_string());
        }

        let mut parts = Vec::new();
        for category in AutomationCategory::ALL {
            if !marker.includes(category) {
                continue;
            }
            let mut out = String::new();
            match category {
                AutomationCategory::Overview => overview(&mut out, statistics, metadata)?,
                AutomationCategory::Numeric => numeric_summary(&mut out, statistics)?,
                AutomationCategory::Missing => missing_data(&mut out, statistics)?,
                AutomationCategory::TopValues => top_values(&mut out, statistics)?,
            }
            parts.push(out.trim_end().to_string());
        }
        Ok(parts.join("\n\n"))
    }
}

fn overview(
    out: &mut String,
    statistics: &[ColumnStatistics],
    metadata: &DatasetMetadata,
) -> std::fmt::Result {
    writeln!(out, "### Dataset Overview")?;
    writeln!(out)?;
    writeln!(out, "- **Dataset Name:** {}", inline(&metadata.name))?;
    writeln!(out, "- **Version:** {}", inline(&metadata.version))?;
    if let Some(date) = metadata.generated_on {
        writeln!(out, "- **Date:** {}", date.format("%Y-%m-%d"))?;
    }
    let rows = statistics.first().map_or(0, ColumnStatistics::total_rows);
    writeln!(out, "- **Rows:** {}", group_thousands(rows))?;
    writeln!(out, "- **Columns:** {}", statistics.len())?;

    let breakdown: Vec<String> = DataTypeTag::ALL
        .iter()
        .filter_map(|tag| {
            let n = statistics.iter().filter(|s| s.dtype == *tag).count();
            (n > 0).then(|| format!("{n} {tag}"))
        })
        .collect();
    writeln!(out, "- **Column Types:** {}", breakdown.join(", "))
}

fn numeric_summary(out: &mut String, statistics: &[ColumnStatistics]) -> std::fmt::Result {
    writeln!(out, "### Numeric Summary")?;
    writeln!(out)?;
    let numeric: Vec<&ColumnStatistics> = statistics
        .iter()
        .filter(|s| s.dtype == DataTypeTag::Numeric)
        .collect();
    if numeric.is_empty() {
        return writeln!(out, "*No numeric columns.*");
    }

    writeln!(out, "| Column | Count | Mean | Std | Min | 25% | 50% | 75% | Max |")?;
    writeln!(out, "| :-- | --: | --: | --: | --: | --: | --: | --: | --: |")?;
    for s in numeric {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            cell(&s.column_name),
            s.count,
            number(s.mean_val),
            number(s.std_val),
            number(s.min_val),
            number(s.lower_quartile),
            number(s.median),
            number(s.upper_quartile),
            number(s.max_val),
        )?;
    }
    Ok(())
}

fn missing_data(out: &mut String, statistics: &[ColumnStatistics]) -> std::fmt::Result {
    writeln!(out, "### Missing Data")?;
    writeln!(out)?;
    writeln!(out, "| Column | Type | Missing | Missing % |")?;
    writeln!(out, "| :-- | :-- | --: | --: |")?;
    for s in statistics {
        writeln!(
            out,
            "| {} | {} | {} | {:.2}% |",
            cell(&s.column_name),
            s.dtype,
            s.missing_count,
            s.missing_ratio() * 100.0
        )?;
    }
    Ok(())
}

fn top_values(out: &mut String, statistics: &[ColumnStatistics]) -> std::fmt::Result {
    writeln!(out, "### Top Values")?;
    let discrete: Vec<&ColumnStatistics> = statistics
        .iter()
        .filter(|s| s.distinct_count.is_some())
        .collect();
    if discrete.is_empty() {
        writeln!(out)?;
        return writeln!(out, "*No categorical columns.*");
    }

    for s in discrete {
        writeln!(out)?;
        writeln!(out, "#### {}", inline(&s.column_name))?;
        writeln!(out)?;
        match &s.top_values {
            Some(values) if !values.is_empty() => {
                writeln!(out, "| Value | Frequency |")?;
                writeln!(out, "| :-- | --: |")?;
                for v in values {
                    writeln!(out, "| {} | {} |", cell(&v.value), v.frequency)?;
                }
            }
            Some(_) => writeln!(out, "*No values present.*")?,
            None => writeln!(
                out,
                "*{} distinct values, too many to list.*",
                group_thousands(s.distinct_count.unwrap_or_default())
            )?,
        }
    }
    Ok(())
}

/// Single-line text.
fn inline(text: &str) -> String {
    text.replace(['\r', '\n'], " ").trim().to_string()
}

/// Table cell text with pipes escaped.
fn cell(text: &str) -> String {
    let text = inline(text).replace('|', "\\|");
    if text.is_empty() {
        "*(empty)*".to_string()
    } else {
        text
    }
}

fn number(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::ValueFrequency;

    fn people_stats() -> Vec<ColumnStatistics> {
        let mut age = ColumnStatistics::counts_only("age", DataTypeTag::Numeric, 2, 1);
        age.mean_val = Some(27.5);
        age.std_val = Some(2.5);
        age.min_val = Some(25.0);
        age.max_val = Some(30.0);
        age.lower_quartile = Some(26.25);
        age.median = Some(27.5);
        age.upper_quartile = Some(28.75);

        let mut city = ColumnStatistics::counts_only("city", DataTypeTag::Categorical, 3, 0);
        city.distinct_count = Some(2);
        city.top_values = Some(vec![ValueFrequency::new("A", 2), ValueFrequency::new("B", 1)]);
        vec![age, city]
    }

    fn render(template: &str, stats: &[ColumnStatistics]) -> String {
        let document = TemplateDocument::parse(template).unwrap();
        let metadata = DatasetMetadata::new("People", "2.1")
            .with_date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        DatasheetLayout::new()
            .render(&document, stats, &metadata)
            .unwrap()
            .serialize()
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_cells_are_escaped() {
        assert_eq!(cell("a|b"), "a\\|b");
        assert_eq!(cell("two\nlines"), "two lines");
        assert_eq!(cell("  "), "*(empty)*");
    }

    #[test]
    fn test_full_render() {
        let out = render("## Stats\n\n<!-- dfd:automated -->\n\nold\n", &people_stats());
        println!("{out}");
        let expected = "\
## Stats

<!-- dfd:automated -->

### Dataset Overview

- **Dataset Name:** People
- **Version:** 2.1
- **Date:** 2024-01-15
- **Rows:** 3
- **Columns:** 2
- **Column Types:** 1 numeric, 1 categorical

### Numeric Summary

| Column | Count | Mean | Std | Min | 25% | 50% | 75% | Max |
| :-- | --: | --: | --: | --: | --: | --: | --: | --: |
| age | 2 | 27.5000 | 2.5000 | 25.0000 | 26.2500 | 27.5000 | 28.7500 | 30.0000 |

### Missing Data

| Column | Type | Missing | Missing % |
| :-- | :-- | --: | --: |
| age | numeric | 1 | 33.33% |
| city | categorical | 0 | 0.00% |

### Top Values

#### city

| Value | Frequency |
| :-- | --: |
| A | 2 |
| B | 1 |
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_categories_restrict_content() {
        let out = render("## Stats\n<!-- dfd:automated missing -->\n", &people_stats());
        assert!(out.contains("### Missing Data"));
        assert!(!out.contains("### Dataset Overview"));
        assert!(!out.contains("### Numeric Summary"));
        assert!(!out.contains("### Top Values"));
    }

    #[test]
    fn test_trailing_break_is_kept() {
        let template = "## Stats\n<!-- dfd:automated overview -->\nold\n\n---\n\n## Uses\n\ntext\n";
        let out = render(template, &people_stats());
        assert!(out.contains("- **Column Types:** 1 numeric, 1 categorical\n\n---\n\n## Uses\n\ntext\n"));
        assert!(!out.contains("old"));
    }

    #[test]
    fn test_empty_statistics_placeholder() {
        let out = render("## Stats\n<!-- dfd:automated -->\n", &[]);
        assert_eq!(out, format!("## Stats\n<!-- dfd:automated -->\n\n{NOT_ANALYZED}\n"));
    }

    #[test]
    fn test_high_cardinality_note() {
        let mut names = ColumnStatistics::counts_only("name", DataTypeTag::Text, 5000, 0);
        names.distinct_count = Some(4200);
        let out = render("## Stats\n<!-- dfd:automated top-values -->\n", &[names]);
        assert!(out.contains("#### name\n\n*4,200 distinct values, too many to list.*"));
    }

    #[test]
    fn test_render_is_stable() {
        let once = render("# T\n## Stats\n<!-- dfd:automated -->\n---\n## Uses\n", &people_stats());
        let twice = render(&once, &people_stats());
        assert_eq!(once, twice);
    }
}
