//! Researcher test-data downloads

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;
use tracing::info;

use studybank_common::model::TestType;

use crate::api::{auth, ApiError};
use crate::{export, AppState};

/// Form fields for the all-types ZIP download
#[derive(Debug, Deserialize)]
pub struct ZipDownloadForm {
    pub password: String,
    #[serde(default)]
    pub participant_id: Option<String>,
}

/// Form fields for the single-type CSV download
#[derive(Debug, Deserialize)]
pub struct SingleTypeForm {
    pub password: String,
    pub test_type: TestType,
    #[serde(default)]
    pub participant_id: Option<String>,
}

/// POST /tests/single-test-type/download-file
///
/// Download results for one test type as CSV. With `participant_id`,
/// restrict rows to that participant's studies. With no matching tests the
/// file still contains the header row.
pub async fn download_single_test_type(
    State(state): State<AppState>,
    Form(form): Form<SingleTypeForm>,
) -> Result<Response, ApiError> {
    auth::require_admin(&state, &form.password)?;

    let participant = normalize_filter(form.participant_id);
    let bytes =
        export::single_test_type_csv(&state.db, form.test_type, participant.as_deref()).await?;
    info!(test_type = %form.test_type, bytes = bytes.len(), "Exported single-type CSV");
    Ok(file_response("text/csv", "test.csv", bytes))
}

/// POST /tests/zip-archive/download-file
///
/// Download results for all test types, one CSV per type, combined into one
/// ZIP archive. Types with no matching tests still get a header-only CSV.
pub async fn download_all_tests_zip(
    State(state): State<AppState>,
    Form(form): Form<ZipDownloadForm>,
) -> Result<Response, ApiError> {
    auth::require_admin(&state, &form.password)?;

    let participant = normalize_filter(form.participant_id);
    let bytes = export::all_tests_zip(&state.db, participant.as_deref()).await?;
    info!(bytes = bytes.len(), "Exported all-tests ZIP archive");
    Ok(file_response("application/zip", "all-tests.zip", bytes))
}

/// Build a file-download response
pub(crate) fn file_response(content_type: &str, filename: &str, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

// Browsers submit unfilled form fields as empty strings; treat those as no
// filter rather than filtering on "".
fn normalize_filter(participant_id: Option<String>) -> Option<String> {
    participant_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
