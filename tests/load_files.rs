mod common;

use std::fs;

use omr_sheet_reader::rectify::WarpInterpolation;
use omr_sheet_reader::{
    AnswerKey, ConfigurationError, GraderConfig, KeySource, SectionKind, Template, TemplateError,
};

#[test]
fn template_round_trips_through_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("template.json");
    fs::write(&path, common::template_json().to_string()).expect("write template");

    let loaded = Template::load(&path).expect("loads");
    assert_eq!(loaded, common::template());
    assert_eq!(loaded.page_size, common::PAGE);
    assert_eq!(loaded.markers.len(), 8);
    assert_eq!(loaded.question_count(), common::QUESTIONS);
    let quiz = loaded.identifier(SectionKind::Quiz).expect("quiz grid");
    assert_eq!(quiz.columns.len(), 3);
    assert!(loaded.sections.contains_key("answer_area"));
    assert!(loaded.sections.contains_key("student_id_section"));
}

#[test]
fn legacy_template_file_loads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("legacy.json");
    fs::write(
        &path,
        r#"{
            "aruco_marker": [
                {"id": 0, "position": [80, 80]}, {"id": 1, "position": [2400, 80]},
                {"id": 2, "position": [2400, 3420]}, {"id": 3, "position": [80, 3420]}
            ],
            "answer_area": {
                "position": [400, 800, 600, 200],
                "questions": [
                    {"question": 2, "bubbles": [{"position": [450, 850], "radius": 22},
                                               {"position": [520, 850], "radius": 22}]},
                    {"question": 1, "bubbles": [{"position": [450, 800], "radius": 22},
                                               {"position": [520, 800], "radius": 22}]}
                ]
            },
            "class_id_section": {
                "position": [1800, 300, 200, 400],
                "columns": [{"bubbles": [{"position": [1850, 320], "radius": 18, "value": "3"}]}]
            }
        }"#,
    )
    .expect("write template");

    let t = Template::load(&path).expect("legacy layout loads");
    assert_eq!(t.page_size, (2481, 3508));
    assert_eq!(t.answer_area.questions[0].number, 2);
    assert_eq!(t.answer_area.questions[0].key_index(), 1);
    assert_eq!(t.sections["answer_area"].w, 600.0);
    let class = t.identifier(SectionKind::Class).expect("class grid");
    assert_eq!(class.columns[0].bubbles[0].value, Some(3));
    assert!(t.identifier(SectionKind::Student).is_none());
}

#[test]
fn missing_template_reports_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.json");
    match Template::load(&path) {
        Err(TemplateError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected an io error, got {other:?}"),
    }
}

#[test]
fn key_files_in_both_shapes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let list = dir.path().join("list.json");
    let map = dir.path().join("map.json");
    let book = dir.path().join("book.json");
    fs::write(&list, "[1, 3, 0, 4, 2]").expect("write");
    fs::write(&map, r#"{"0": 1, "1": 3, "2": 0, "3": 4, "4": 2}"#).expect("write");
    fs::write(
        &book,
        r#"{"keys": {"042": [1, 3, 0, 4, 2]}, "default": [0, 0, 0, 0, 0]}"#,
    )
    .expect("write");

    let template = common::template();
    let from_list = KeySource::load(&list).expect("list key");
    let from_map = KeySource::load(&map).expect("map key");
    assert_eq!(from_list, from_map);
    assert_eq!(from_list, KeySource::Single(common::key()));
    from_list.validate_against(&template).expect("fits the template");

    let book = KeySource::load(&book).expect("book");
    assert!(book.needs_exam_code());
    assert_eq!(book.resolve(Some("042")).expect("known code").get(1), Some(3));
    assert_eq!(book.resolve(Some("999")).expect("falls back").get(1), Some(0));
    assert_eq!(book.resolve(None).expect("falls back").get(4), Some(0));
}

#[test]
fn key_must_match_the_template() {
    let template = common::template();
    let short = KeySource::from(AnswerKey::from_choices([1, 3, 0]));
    assert!(matches!(
        short.validate_against(&template),
        Err(ConfigurationError::MissingQuestion { question: 4 })
    ));
    let wide = KeySource::from(AnswerKey::from_choices([1, 3, 0, 4, 9]));
    assert!(matches!(
        wide.validate_against(&template),
        Err(ConfigurationError::ChoiceOutOfRange {
            question: 5,
            choice: 9,
            choices: 5
        })
    ));
}

#[test]
fn config_file_overrides_selected_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"fill": {"answer": 350, "quiz": 250}, "interpolation": "nearest",
            "marker": {"blur_sigma": 0.0}}"#,
    )
    .expect("write");

    let config = GraderConfig::load(&path).expect("loads");
    assert_eq!(config.fill.answer, 350);
    assert_eq!(config.fill.quiz, 250);
    assert_eq!(config.fill.student, GraderConfig::default().fill.student);
    assert_eq!(config.interpolation, WarpInterpolation::Nearest);
    assert_eq!(config.marker.blur_sigma, 0.0);
}
