//! Study creation and lookup endpoints

use axum::extract::multipart::{Field, Multipart};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

use studybank_common::model::{Study, StudyType};
use studybank_common::Error;

use crate::api::downloads::file_response;
use crate::api::{auth, ApiError};
use crate::{batch, db, export, AppState};

fn default_per_participant() -> i64 {
    1
}

/// Form fields for study creation from a pasted participant list
#[derive(Debug, Deserialize)]
pub struct CreateStudiesForm {
    pub password: String,
    /// Newline-separated alphanumeric participant IDs
    pub participant_ids: String,
    #[serde(default = "default_per_participant")]
    pub baselines_per_participant: i64,
    #[serde(default = "default_per_participant")]
    pub followups_per_participant: i64,
}

/// POST /studies
///
/// Given a newline-separated list of alphanumeric participant IDs, generate
/// and return studies with freshly allocated codes and URLs,
/// `baselines_per_participant` baseline and `followups_per_participant`
/// followup studies per participant (default 1 each).
///
/// NB: calling this twice generates additional studies (not idempotent).
pub async fn create_studies_from_list(
    State(state): State<AppState>,
    Form(form): Form<CreateStudiesForm>,
) -> Result<Json<Vec<Study>>, ApiError> {
    auth::require_admin(&state, &form.password)?;

    let lines: Vec<String> = form.participant_ids.lines().map(str::to_string).collect();
    let studies = batch::create_studies(
        &state.db,
        &state.settings,
        &lines,
        form.baselines_per_participant,
        form.followups_per_participant,
    )
    .await?;
    Ok(Json(studies))
}

/// POST /studies/upload-file
///
/// Like `POST /studies`, but the participant IDs arrive as an uploaded file
/// (`participant_ids_file`), one ID per line, blank lines ignored.
pub async fn create_studies_from_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<Study>>, ApiError> {
    let mut password: Option<String> = None;
    let mut file_contents: Option<String> = None;
    let mut baselines = default_per_participant();
    let mut followups = default_per_participant();

    while let Some(field) = multipart.next_field().await.map_err(multipart_err)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "password" => password = Some(read_text(field).await?),
            "participant_ids_file" => {
                let bytes = field.bytes().await.map_err(multipart_err)?;
                let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                    Error::InvalidInput(
                        "Could not read file; make sure it is a .txt or .csv file containing \
                         a newline-separated list of alphanumeric participant IDs"
                            .to_string(),
                    )
                })?;
                file_contents = Some(text);
            }
            "baselines_per_participant" => {
                baselines = parse_count(&read_text(field).await?, "baselines_per_participant")?;
            }
            "followups_per_participant" => {
                followups = parse_count(&read_text(field).await?, "followups_per_participant")?;
            }
            _ => {}
        }
    }

    let password =
        password.ok_or_else(|| Error::InvalidInput("Missing password field".to_string()))?;
    auth::require_admin(&state, &password)?;

    let contents = file_contents
        .ok_or_else(|| Error::InvalidInput("Missing participant_ids_file field".to_string()))?;
    let lines: Vec<String> = contents.lines().map(str::to_string).collect();

    let studies =
        batch::create_studies(&state.db, &state.settings, &lines, baselines, followups).await?;
    Ok(Json(studies))
}

/// Study lookup projection: just enough for the front-end to tell a valid
/// code (and which session it opens) from a typo
#[derive(Debug, Serialize)]
pub struct StudyTypeResponse {
    pub study_type: StudyType,
}

/// GET /studies/:study_id
///
/// Used by the front-end to check that a study code is valid. Does not list
/// study IDs or expose other studies' fields.
pub async fn get_study(
    State(state): State<AppState>,
    Path(study_id): Path<String>,
) -> Result<Json<StudyTypeResponse>, ApiError> {
    let study = db::find_study(&state.db, &study_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("study_id {} does not exist", study_id)))?;
    Ok(Json(StudyTypeResponse {
        study_type: study.study_type,
    }))
}

/// Password-only form for the studies download
#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    pub password: String,
}

/// POST /studies/download-file
///
/// Download every study as one CSV file.
pub async fn download_studies_csv(
    State(state): State<AppState>,
    Form(form): Form<PasswordForm>,
) -> Result<Response, ApiError> {
    auth::require_admin(&state, &form.password)?;

    let bytes = export::studies_csv(&state.db).await?;
    Ok(file_response("text/csv", "studies.csv", bytes))
}

async fn read_text(field: Field<'_>) -> Result<String, Error> {
    field
        .text()
        .await
        .map_err(|e| Error::InvalidInput(format!("Could not read form field: {}", e)))
}

fn parse_count(value: &str, name: &str) -> Result<i64, Error> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::InvalidInput(format!("{} must be an integer", name)))
}

fn multipart_err(e: axum::extract::multipart::MultipartError) -> Error {
    Error::InvalidInput(format!("Could not read upload: {}", e))
}
