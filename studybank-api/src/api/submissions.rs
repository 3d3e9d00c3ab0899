//! Test result submission

use axum::extract::State;
use axum::Json;
use tracing::info;
use uuid::Uuid;

use studybank_common::model::{Test, TestSubmission};
use studybank_common::Error;

use crate::api::ApiError;
use crate::{db, AppState};

/// POST /tests
///
/// Record one completed test. The test type is inferred from the result
/// payload's shape, never taken from the caller. The study code must resolve
/// to an existing study; a repeated submission for the same study is
/// accepted (the server does not check for an existing result of this type).
pub async fn submit_test(
    State(state): State<AppState>,
    Json(submission): Json<TestSubmission>,
) -> Result<Json<Test>, ApiError> {
    submission.result.validate()?;

    if !db::study_exists(&state.db, &submission.study_id).await? {
        return Err(Error::InvalidInput(format!(
            "Could not find study with id {}",
            submission.study_id
        ))
        .into());
    }

    let test = Test::from_submission(submission, Uuid::new_v4().to_string());
    db::insert_test(&state.db, &test).await?;
    info!(
        test_id = %test.test_id,
        test_type = %test.test_type,
        questions = test.result.question_count(),
        "Recorded test submission"
    );
    Ok(Json(test))
}
