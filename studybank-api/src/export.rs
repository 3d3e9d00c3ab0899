//! CSV and ZIP export of studies and tests
//!
//! Test exports are one row per question for the sequence-shaped results and
//! one row per test for the single-record shapes. Each row joins the test's
//! own fields, the per-question result fields for that test type, and the
//! fields of the study the test was submitted against.
//!
//! Column order is fixed here rather than derived from any map iteration, so
//! two exports of the same data always diff clean. Export files are staged
//! in temp locations and removed best-effort once the response bytes are
//! read.

use sqlx::SqlitePool;
use std::io::Write;

use studybank_common::model::{Study, Test, TestResult, TestType};
use studybank_common::{Error, Result};

use crate::db;

/// Test columns common to every export, in order. The result payload and the
/// study linkage are replaced by their flattened fields.
pub const TEST_COLUMNS: &[&str] = &[
    "time_started",
    "time_elapsed_milliseconds",
    "device_info",
    "notes",
    "test_id",
    "test_type",
];

/// Study columns appended to every test row, and the full column set of the
/// studies export
pub const STUDY_COLUMNS: &[&str] = &["study_id", "participant_id", "url", "study_type"];

/// Per-question columns for one test type
pub fn result_columns(test_type: TestType) -> &'static [&'static str] {
    match test_type {
        TestType::ImmediateRecall => &["ir_rt_first", "ir_rt_second", "ir_score"],
        TestType::DelayedRecall => &["dr_rt", "dr_score"],
        TestType::ChoiceReactionTime => &["crt_rt", "crt_correct", "crt_response", "crt_dwell"],
        TestType::VisualPairedAssociates => &["vpa_rt", "vpa_correct", "vpa_response"],
        TestType::DigitSymbolMatching => &["dsm_rt", "dsm_correct", "dsm_response"],
        TestType::SpatialMemory => &["sm_rt", "sm_correct"],
    }
}

/// Full header for one test type's CSV
pub fn columns(test_type: TestType) -> Vec<&'static str> {
    TEST_COLUMNS
        .iter()
        .chain(result_columns(test_type))
        .chain(STUDY_COLUMNS)
        .copied()
        .collect()
}

fn test_fields(test: &Test) -> Vec<String> {
    vec![
        test.time_started.to_rfc3339(),
        test.time_elapsed_milliseconds.to_string(),
        test.device_info.clone(),
        test.notes.clone().unwrap_or_default(),
        test.test_id.clone(),
        test.test_type.to_string(),
    ]
}

fn study_fields(study: &Study) -> Vec<String> {
    vec![
        study.study_id.clone(),
        study.participant_id.clone(),
        study.url.clone(),
        study.study_type.to_string(),
    ]
}

/// Flatten a result into per-question field rows, matching
/// [`result_columns`] for its test type
fn question_rows(result: &TestResult) -> Vec<Vec<String>> {
    match result {
        TestResult::ImmediateRecall(r) => vec![vec![
            r.ir_rt_first.to_string(),
            r.ir_rt_second.map(|v| v.to_string()).unwrap_or_default(),
            r.ir_score.to_string(),
        ]],
        TestResult::DelayedRecall(r) => {
            vec![vec![r.dr_rt.to_string(), r.dr_score.to_string()]]
        }
        TestResult::VisualPairedAssociates(qs) => qs
            .iter()
            .map(|q| {
                vec![
                    q.vpa_rt.to_string(),
                    q.vpa_correct.to_string(),
                    q.vpa_response.clone(),
                ]
            })
            .collect(),
        TestResult::ChoiceReactionTime(qs) => qs
            .iter()
            .map(|q| {
                vec![
                    q.crt_rt.to_string(),
                    q.crt_correct.to_string(),
                    q.crt_response.as_str().to_string(),
                    q.crt_dwell.to_string(),
                ]
            })
            .collect(),
        TestResult::DigitSymbolMatching(qs) => qs
            .iter()
            .map(|q| {
                vec![
                    q.dsm_rt.to_string(),
                    q.dsm_correct.to_string(),
                    q.dsm_response.to_string(),
                ]
            })
            .collect(),
        TestResult::SpatialMemory(qs) => qs
            .iter()
            .map(|q| vec![q.sm_rt.to_string(), q.sm_correct.to_string()])
            .collect(),
    }
}

/// Write one test type's rows as CSV
///
/// All fields are quoted. A type with no matching tests still gets its
/// header row, so downstream tooling sees a stable schema.
pub async fn write_test_type_csv<W: Write>(
    pool: &SqlitePool,
    test_type: TestType,
    participant_id: Option<&str>,
    writer: W,
) -> Result<()> {
    let rows = db::tests_with_studies(pool, test_type, participant_id).await?;

    let mut csv_writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);
    csv_writer.write_record(columns(test_type)).map_err(csv_err)?;

    for (test, study) in &rows {
        let test_cols = test_fields(test);
        let study_cols = study_fields(study);
        for question in question_rows(&test.result) {
            let record = test_cols
                .iter()
                .chain(question.iter())
                .chain(study_cols.iter());
            csv_writer.write_record(record).map_err(csv_err)?;
        }
    }
    csv_writer.flush()?;
    Ok(())
}

/// One test type as a CSV file, returned as response bytes
pub async fn single_test_type_csv(
    pool: &SqlitePool,
    test_type: TestType,
    participant_id: Option<&str>,
) -> Result<Vec<u8>> {
    let mut file = tempfile::NamedTempFile::new()?;
    write_test_type_csv(pool, test_type, participant_id, &mut file).await?;
    let bytes = std::fs::read(file.path())?;
    Ok(bytes)
}

/// All six test types, one CSV each, bundled into a ZIP archive
pub async fn all_tests_zip(pool: &SqlitePool, participant_id: Option<&str>) -> Result<Vec<u8>> {
    let staging = tempfile::tempdir()?;
    let zip_path = staging.path().join("all-tests.zip");

    let zip_file = std::fs::File::create(&zip_path)?;
    let mut zip = zip::ZipWriter::new(zip_file);
    let options = zip::write::SimpleFileOptions::default();

    for test_type in TestType::ALL {
        let csv_name = format!("{}.csv", test_type);
        let csv_path = staging.path().join(&csv_name);
        let csv_file = std::fs::File::create(&csv_path)?;
        write_test_type_csv(pool, test_type, participant_id, csv_file).await?;

        zip.start_file(csv_name, options).map_err(zip_err)?;
        zip.write_all(&std::fs::read(&csv_path)?)?;
    }
    zip.finish().map_err(zip_err)?;

    let bytes = std::fs::read(&zip_path)?;
    Ok(bytes)
}

/// The full studies table as CSV
pub async fn studies_csv(pool: &SqlitePool) -> Result<Vec<u8>> {
    let studies = db::all_studies(pool).await?;

    let mut file = tempfile::NamedTempFile::new()?;
    {
        let mut csv_writer = csv::Writer::from_writer(&mut file);
        csv_writer.write_record(STUDY_COLUMNS).map_err(csv_err)?;
        for study in &studies {
            csv_writer.write_record(study_fields(study)).map_err(csv_err)?;
        }
        csv_writer.flush()?;
    }
    let bytes = std::fs::read(file.path())?;
    Ok(bytes)
}

fn csv_err(e: csv::Error) -> Error {
    Error::Internal(format!("CSV write failed: {}", e))
}

fn zip_err(e: zip::result::ZipError) -> Error {
    Error::Internal(format!("ZIP write failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::{Cursor, Read};
    use studybank_common::model::{
        ImmediateRecallResult, StudyType, VisualPairedAssociatesResult,
    };

    async fn setup() -> (SqlitePool, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let pool = db::init_database(&dir.path().join("studybank.db"))
            .await
            .expect("Should initialize database");
        (pool, dir)
    }

    async fn seed_study(pool: &SqlitePool, code: &str, participant: &str) {
        db::insert_studies(
            pool,
            &[Study {
                study_id: code.to_string(),
                participant_id: participant.to_string(),
                url: format!("https://studies.test/{}", code),
                study_type: StudyType::Baseline,
            }],
        )
        .await
        .unwrap();
    }

    async fn seed_test(pool: &SqlitePool, test_id: &str, study_id: &str, result: TestResult) {
        let test = Test {
            test_id: test_id.to_string(),
            study_id: study_id.to_string(),
            time_started: Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
            time_elapsed_milliseconds: 60_000,
            device_info: "Mozilla/5.0".to_string(),
            test_type: result.test_type(),
            result,
            notes: None,
        };
        db::insert_test(pool, &test).await.unwrap();
    }

    fn vpa_result(questions: usize) -> TestResult {
        TestResult::VisualPairedAssociates(
            (0..questions)
                .map(|i| VisualPairedAssociatesResult {
                    vpa_rt: 800 + i as i64,
                    vpa_correct: i % 2 == 0,
                    vpa_response: format!("img{}.png", i),
                })
                .collect(),
        )
    }

    #[test]
    fn column_order_is_fixed() {
        assert_eq!(
            columns(TestType::SpatialMemory),
            vec![
                "time_started",
                "time_elapsed_milliseconds",
                "device_info",
                "notes",
                "test_id",
                "test_type",
                "sm_rt",
                "sm_correct",
                "study_id",
                "participant_id",
                "url",
                "study_type",
            ]
        );
        // Every type shares the test/study framing around its own fields
        for test_type in TestType::ALL {
            let cols = columns(test_type);
            assert_eq!(&cols[..TEST_COLUMNS.len()], TEST_COLUMNS);
            assert_eq!(&cols[cols.len() - STUDY_COLUMNS.len()..], STUDY_COLUMNS);
        }
    }

    #[tokio::test]
    async fn list_result_exports_one_row_per_question() {
        let (pool, _dir) = setup().await;
        seed_study(&pool, "abcd", "p1").await;
        seed_test(&pool, "t-1", "abcd", vpa_result(3)).await;

        let bytes = single_test_type_csv(&pool, TestType::VisualPairedAssociates, None)
            .await
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4, "header plus one row per question");
        for line in &lines[1..] {
            // Joined test and study fields repeat on every question row
            assert!(line.contains("\"t-1\""));
            assert!(line.contains("\"abcd\""));
            assert!(line.contains("\"p1\""));
            assert!(line.contains("\"https://studies.test/abcd\""));
        }
        assert!(lines[1].contains("\"img0.png\""));
        assert!(lines[3].contains("\"img2.png\""));
    }

    #[tokio::test]
    async fn single_record_result_exports_one_row_with_optional_field_blank() {
        let (pool, _dir) = setup().await;
        seed_study(&pool, "abcd", "p1").await;
        seed_test(
            &pool,
            "t-1",
            "abcd",
            TestResult::ImmediateRecall(ImmediateRecallResult {
                ir_rt_first: 1200,
                ir_rt_second: None,
                ir_score: 0,
            }),
        )
        .await;

        let bytes = single_test_type_csv(&pool, TestType::ImmediateRecall, None)
            .await
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        // ir_rt_second was not supplied; its cell is empty, not omitted
        assert!(lines[1].contains("\"1200\",\"\",\"0\""));
    }

    #[tokio::test]
    async fn zero_match_export_is_header_only() {
        let (pool, _dir) = setup().await;

        let bytes = single_test_type_csv(&pool, TestType::DelayedRecall, None)
            .await
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            "\"time_started\",\"time_elapsed_milliseconds\",\"device_info\",\"notes\",\
             \"test_id\",\"test_type\",\"dr_rt\",\"dr_score\",\"study_id\",\
             \"participant_id\",\"url\",\"study_type\""
        );
    }

    #[tokio::test]
    async fn participant_filter_excludes_other_participants() {
        let (pool, _dir) = setup().await;
        seed_study(&pool, "abcd", "p1").await;
        seed_study(&pool, "efgh", "p2").await;
        seed_test(&pool, "t-1", "abcd", vpa_result(1)).await;
        seed_test(&pool, "t-2", "efgh", vpa_result(1)).await;

        let bytes = single_test_type_csv(&pool, TestType::VisualPairedAssociates, Some("p2"))
            .await
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("\"p2\""));
        assert!(!text.contains("\"p1\""));
    }

    #[tokio::test]
    async fn zip_contains_one_csv_per_test_type() {
        let (pool, _dir) = setup().await;
        seed_study(&pool, "abcd", "p1").await;
        seed_test(&pool, "t-1", "abcd", vpa_result(2)).await;

        let bytes = all_tests_zip(&pool, None).await.unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

        assert_eq!(archive.len(), 6);
        for test_type in TestType::ALL {
            let mut entry = archive
                .by_name(&format!("{}.csv", test_type))
                .expect("archive should contain every test type");
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();

            let lines = content.lines().count();
            if test_type == TestType::VisualPairedAssociates {
                assert_eq!(lines, 3, "header plus two question rows");
            } else {
                assert_eq!(lines, 1, "header only for types with no tests");
            }
        }
    }

    #[tokio::test]
    async fn studies_csv_lists_every_study() {
        let (pool, _dir) = setup().await;
        seed_study(&pool, "abcd", "p1").await;
        seed_study(&pool, "efgh", "p2").await;

        let bytes = studies_csv(&pool).await.unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "study_id,participant_id,url,study_type");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("abcd,p1,"));
        assert!(lines[2].ends_with("baseline"));
    }
}
