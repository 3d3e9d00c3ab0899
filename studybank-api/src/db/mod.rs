//! Database access layer
//!
//! Two tables back the service: `studies` and `tests`. Rows are logically
//! keyed by `study_id`/`test_id`; the per-test result payload is stored as a
//! JSON column so each shape keeps its own fields without per-type tables.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

use studybank_common::model::{Study, StudyType, Test, TestResult, TestType};
use studybank_common::{Error, Result};

/// Open the connection pool and create tables if needed
///
/// The pool is created once at startup, injected into handlers through the
/// application state, and closed at shutdown.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_studies_table(&pool).await?;
    create_tests_table(&pool).await?;

    Ok(pool)
}

/// The primary key on `study_id` backs the allocator's uniqueness guarantee:
/// even if two concurrent batches race past the pre-check, the insert fails
/// instead of silently duplicating a code.
async fn create_studies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS studies (
            study_id TEXT PRIMARY KEY,
            participant_id TEXT NOT NULL,
            url TEXT NOT NULL,
            study_type TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_tests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tests (
            test_id TEXT PRIMARY KEY,
            study_id TEXT NOT NULL,
            time_started TEXT NOT NULL,
            time_elapsed_milliseconds INTEGER NOT NULL,
            device_info TEXT NOT NULL,
            test_type TEXT NOT NULL,
            result TEXT NOT NULL,
            notes TEXT
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tests_test_type ON tests (test_type)")
        .execute(pool)
        .await?;
    Ok(())
}

/// Whether a study code is already taken
pub async fn study_exists(pool: &SqlitePool, study_id: &str) -> Result<bool> {
    let exists: i64 =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM studies WHERE study_id = ?)")
            .bind(study_id)
            .fetch_one(pool)
            .await?;
    Ok(exists != 0)
}

/// Look up one study by its code
pub async fn find_study(pool: &SqlitePool, study_id: &str) -> Result<Option<Study>> {
    let row = sqlx::query_as::<_, (String, String, String, String)>(
        "SELECT study_id, participant_id, url, study_type FROM studies WHERE study_id = ?",
    )
    .bind(study_id)
    .fetch_optional(pool)
    .await?;

    row.map(study_from_row).transpose()
}

/// All studies, oldest batch first
pub async fn all_studies(pool: &SqlitePool) -> Result<Vec<Study>> {
    let rows = sqlx::query_as::<_, (String, String, String, String)>(
        "SELECT study_id, participant_id, url, study_type FROM studies ORDER BY rowid",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(study_from_row).collect()
}

/// Number of persisted studies
pub async fn count_studies(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM studies")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Insert a whole batch of studies in one transaction
///
/// All-or-nothing: if any insert fails the transaction rolls back and no
/// study from the batch is persisted.
pub async fn insert_studies(pool: &SqlitePool, studies: &[Study]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for study in studies {
        sqlx::query(
            "INSERT INTO studies (study_id, participant_id, url, study_type)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&study.study_id)
        .bind(&study.participant_id)
        .bind(&study.url)
        .bind(study.study_type.as_str())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Insert one completed test
pub async fn insert_test(pool: &SqlitePool, test: &Test) -> Result<()> {
    let result_json = serde_json::to_string(&test.result)
        .map_err(|e| Error::Internal(format!("Failed to encode result payload: {}", e)))?;

    sqlx::query(
        "INSERT INTO tests
            (test_id, study_id, time_started, time_elapsed_milliseconds,
             device_info, test_type, result, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&test.test_id)
    .bind(&test.study_id)
    .bind(test.time_started.to_rfc3339())
    .bind(test.time_elapsed_milliseconds)
    .bind(&test.device_info)
    .bind(test.test_type.as_str())
    .bind(result_json)
    .bind(&test.notes)
    .execute(pool)
    .await?;
    Ok(())
}

/// Number of persisted tests
pub async fn count_tests(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tests")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// All tests of one type, each joined with its study
///
/// The optional participant filter applies to the joined study row.
pub async fn tests_with_studies(
    pool: &SqlitePool,
    test_type: TestType,
    participant_id: Option<&str>,
) -> Result<Vec<(Test, Study)>> {
    type Row = (
        String,         // test_id
        String,         // study_id
        String,         // time_started
        i64,            // time_elapsed_milliseconds
        String,         // device_info
        String,         // result JSON
        Option<String>, // notes
        String,         // participant_id
        String,         // url
        String,         // study_type
    );

    let rows = sqlx::query_as::<_, Row>(
        "SELECT t.test_id, t.study_id, t.time_started, t.time_elapsed_milliseconds,
                t.device_info, t.result, t.notes,
                s.participant_id, s.url, s.study_type
         FROM tests t
         JOIN studies s ON s.study_id = t.study_id
         WHERE t.test_type = ?
           AND (? IS NULL OR s.participant_id = ?)
         ORDER BY t.rowid",
    )
    .bind(test_type.as_str())
    .bind(participant_id)
    .bind(participant_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let (
                test_id,
                study_id,
                time_started,
                time_elapsed_milliseconds,
                device_info,
                result,
                notes,
                participant_id,
                url,
                study_type,
            ) = row;

            let result: TestResult = serde_json::from_str(&result).map_err(|e| {
                Error::Internal(format!("Corrupt result payload for test {}: {}", test_id, e))
            })?;
            let time_started = chrono::DateTime::parse_from_rfc3339(&time_started)
                .map_err(|e| {
                    Error::Internal(format!("Corrupt timestamp for test {}: {}", test_id, e))
                })?
                .with_timezone(&chrono::Utc);

            let study = Study {
                study_id: study_id.clone(),
                participant_id,
                url,
                study_type: study_type.parse::<StudyType>()?,
            };
            let test = Test {
                test_id,
                study_id,
                time_started,
                time_elapsed_milliseconds,
                device_info,
                test_type,
                result,
                notes,
            };
            Ok((test, study))
        })
        .collect()
}

fn study_from_row(row: (String, String, String, String)) -> Result<Study> {
    let (study_id, participant_id, url, study_type) = row;
    Ok(Study {
        study_id,
        participant_id,
        url,
        study_type: study_type.parse::<StudyType>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use studybank_common::model::SpatialMemoryResult;

    async fn temp_pool() -> (SqlitePool, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let pool = init_database(&dir.path().join("studybank.db"))
            .await
            .expect("Should initialize database");
        (pool, dir)
    }

    fn study(code: &str, participant: &str) -> Study {
        Study {
            study_id: code.to_string(),
            participant_id: participant.to_string(),
            url: format!("https://studies.test/{}", code),
            study_type: StudyType::Baseline,
        }
    }

    #[tokio::test]
    async fn studies_roundtrip() {
        let (pool, _dir) = temp_pool().await;

        insert_studies(&pool, &[study("abcd", "p1"), study("efgh", "p2")])
            .await
            .unwrap();

        assert!(study_exists(&pool, "abcd").await.unwrap());
        assert!(!study_exists(&pool, "zzzz").await.unwrap());
        assert_eq!(count_studies(&pool).await.unwrap(), 2);

        let found = find_study(&pool, "efgh").await.unwrap().unwrap();
        assert_eq!(found.participant_id, "p2");
        assert!(find_study(&pool, "zzzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_study_id_rolls_back_the_whole_batch() {
        let (pool, _dir) = temp_pool().await;

        insert_studies(&pool, &[study("abcd", "p1")]).await.unwrap();

        let batch = [study("wxyz", "p2"), study("abcd", "p3")];
        assert!(insert_studies(&pool, &batch).await.is_err());

        // Nothing from the failed batch is persisted
        assert_eq!(count_studies(&pool).await.unwrap(), 1);
        assert!(!study_exists(&pool, "wxyz").await.unwrap());
    }

    #[tokio::test]
    async fn tests_join_their_study_and_filter_by_participant() {
        let (pool, _dir) = temp_pool().await;

        insert_studies(&pool, &[study("abcd", "p1"), study("efgh", "p2")])
            .await
            .unwrap();

        let result = TestResult::SpatialMemory(vec![SpatialMemoryResult {
            sm_rt: 700,
            sm_correct: true,
        }]);
        for (test_id, study_id) in [("t-1", "abcd"), ("t-2", "efgh")] {
            let test = Test {
                test_id: test_id.to_string(),
                study_id: study_id.to_string(),
                time_started: Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
                time_elapsed_milliseconds: 45_000,
                device_info: "Mozilla/5.0".to_string(),
                test_type: result.test_type(),
                result: result.clone(),
                notes: None,
            };
            insert_test(&pool, &test).await.unwrap();
        }

        let all = tests_with_studies(&pool, TestType::SpatialMemory, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].1.participant_id, "p1");

        let filtered = tests_with_studies(&pool, TestType::SpatialMemory, Some("p2"))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].0.study_id, "efgh");

        let none = tests_with_studies(&pool, TestType::DelayedRecall, None)
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
