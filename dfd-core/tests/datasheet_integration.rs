//! End-to-end datasheet generation and compilation.

#![cfg(feature = "arrow-backend")]

use dfd_core::prelude::*;
use dfd_core::template::{AUTOMATED_MARKER, NOT_ANALYZED, PLACEHOLDER};
use dfd_core::test_fixtures::{mixed_types_table, people_table, write_file};
use tempfile::TempDir;

fn arrow_config(name: &str) -> DatasheetConfig {
    DatasheetConfig::new(name).with_backend(BackendKind::Arrow)
}

#[test]
fn test_people_scenario() {
    let output = build_datasheet(
        &arrow_config("People"),
        DataSource::arrow(people_table()),
        None,
    )
    .unwrap();
    println!("{}", output.document);

    let age = output.analysis.column("age").unwrap();
    assert_eq!(age.dtype, DataTypeTag::Numeric);
    assert_eq!((age.count, age.missing_count), (2, 1));
    assert_eq!(age.mean_val, Some(27.5));
    assert_eq!(age.std_val, Some(2.5));

    let city = output.analysis.column("city").unwrap();
    assert_eq!(city.dtype, DataTypeTag::Categorical);
    assert_eq!(city.distinct_count, Some(2));
    let top = city.top_values.as_ref().unwrap();
    assert_eq!(
        top.iter()
            .map(|v| (v.value.as_str(), v.frequency))
            .collect::<Vec<_>>(),
        vec![("A", 2), ("B", 1)]
    );

    assert!(output.document.contains("- **Rows:** 3"));
    assert!(output.document.contains("| age | numeric | 1 | 33.33% |"));
    assert!(output.document.contains("#### city\n\n| Value | Frequency |"));
    assert_eq!(output.compile.automated_sections, vec!["automated-analysis"]);
    assert!(output.compile.warnings.is_empty());
}

#[test]
fn test_edit_and_recompile_keeps_answers() {
    let dir = TempDir::new().unwrap();
    let schema = QuestionnaireSchema::datasheets_for_datasets();
    let blank = generate_template(&schema).unwrap();

    // A human answers one question and adds a section of their own.
    let edited = blank
        .replacen(
            &format!("### Who created the dataset?\n\n{PLACEHOLDER}"),
            "### Who created the dataset?\n\nThe *data* team.\n\n| owner | since |\n| --- | --- |\n| ana | 2020 |",
            1,
        )
        .replacen(
            "## Uses",
            "## Licensing Notes\n\nCC-BY 4.0, see LICENSE.\n\n---\n\n## Uses",
            1,
        );
    let template_path = write_file(dir.path(), "DATASHEET.md", &edited);
    let template = std::fs::read_to_string(&template_path).unwrap();

    let config = arrow_config("People");
    let first = build_datasheet(&config, DataSource::arrow(people_table()), Some(&template))
        .unwrap();
    assert!(first
        .document
        .contains("The *data* team.\n\n| owner | since |\n| --- | --- |\n| ana | 2020 |"));
    assert_eq!(first.compile.custom_sections, vec!["licensing-notes"]);
    assert_eq!(first.compile.completion.answered_slots, 1);
    assert_eq!(first.compile.completion.total_slots, 25);

    // The custom section stays where it was written.
    let licensing = first.document.find("## Licensing Notes").unwrap();
    let preprocessing = first.document.find("## Preprocessing").unwrap();
    let uses = first.document.find("## Uses").unwrap();
    assert!(preprocessing < licensing && licensing < uses);

    // Everything before the automated section is untouched.
    let cut = edited.find(AUTOMATED_MARKER).unwrap();
    assert_eq!(&first.document[..cut], &edited[..cut]);

    // Compiling the output again changes nothing.
    let second = build_datasheet(&config, DataSource::arrow(people_table()), Some(&first.document))
        .unwrap();
    assert_eq!(second.document, first.document);
}

#[test]
fn test_empty_statistics_render_placeholder() {
    let compiler = TemplateCompiler::default();
    let template = compiler.generate().unwrap();
    let compiled = compiler
        .compile(&template, &[], &DatasetMetadata::default())
        .unwrap();
    assert!(compiled.document.contains(NOT_ANALYZED));
    assert!(compiled.document.contains(AUTOMATED_MARKER));
    assert_eq!(compiled.report.completion.answered_slots, 0);
}

#[test]
fn test_all_missing_and_unsupported_columns() {
    let output = build_datasheet(
        &arrow_config("Mixed"),
        DataSource::arrow(mixed_types_table()),
        None,
    )
    .unwrap();

    let empty = output.analysis.column("empty").unwrap();
    assert_eq!(empty.count, 0);
    assert_eq!(empty.missing_count, 5);
    assert!(empty.mean_val.is_none());
    assert!(empty.std_val.is_none());
    assert!(empty.min_val.is_none());
    assert!(empty.max_val.is_none());
    assert!(output.document.contains("| empty | 0 | n/a |"));

    assert_eq!(output.compile.warnings.len(), 1);
    assert_eq!(output.compile.warnings[0].column, "payload");
    assert!(output.document.contains("| payload | unknown | 1 | 20.00% |"));
}

#[test]
fn test_invalid_templates_are_fatal() {
    let config = arrow_config("People");
    for template in [
        "no headings at all\n",
        "## Uses\n```\nunterminated\n",
        "<!-- dfd:automated -->\n## Stats\n",
        "## Uses\n##\n",
    ] {
        let err = build_datasheet(&config, DataSource::arrow(people_table()), Some(template))
            .unwrap_err();
        assert!(
            matches!(err, DatasheetError::TemplateParse { .. }),
            "expected parse error for {template:?}, got {err}"
        );
    }
}

#[test]
fn test_answers_starting_with_hash_recompile() {
    let schema = QuestionnaireSchema::datasheets_for_datasets();
    let edited = generate_template(&schema).unwrap().replacen(
        &format!("### Who created the dataset?\n\n{PLACEHOLDER}"),
        "### Who created the dataset?\n\n#1 priority was fraud detection, see #42.",
        1,
    );

    let config = arrow_config("People");
    let first = build_datasheet(&config, DataSource::arrow(people_table()), Some(&edited))
        .unwrap();
    assert!(first
        .document
        .contains("### Who created the dataset?\n\n#1 priority was fraud detection, see #42.\n"));
    assert_eq!(first.compile.completion.answered_slots, 1);

    let second = build_datasheet(&config, DataSource::arrow(people_table()), Some(&first.document))
        .unwrap();
    assert_eq!(second.document, first.document);
}

#[test]
fn test_missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.csv");
    let err = build_datasheet(&arrow_config("Absent"), DataSource::path(&missing), None)
        .unwrap_err();
    assert!(err.to_string().contains("absent.csv"));
}

#[test]
fn test_custom_schema_from_json() {
    let dir = TempDir::new().unwrap();
    let schema_path = write_file(
        dir.path(),
        "schema.json",
        r#"{
            "title": "Sensor Log",
            "sections": [
                {"heading": "Provenance", "questions": ["Which devices recorded the data?"]},
                {"heading": "Profile", "automated": true}
            ],
            "required": ["provenance"]
        }"#,
    );
    let schema = QuestionnaireSchema::from_json_file(&schema_path).unwrap();
    let output = Pipeline::new(arrow_config("Sensors"))
        .with_schema(schema)
        .build(DataSource::arrow(people_table()), None)
        .unwrap();

    assert!(output.document.starts_with("# Sensor Log\n"));
    assert!(output.document.contains("### Which devices recorded the data?"));
    assert_eq!(output.compile.automated_sections, vec!["profile"]);
    assert_eq!(output.compile.completion.total_slots, 1);
}
