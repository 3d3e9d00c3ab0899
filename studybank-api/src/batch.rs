//! Study batch creation
//!
//! Researchers hand in a participant list plus per-participant baseline and
//! followup counts; every slot gets a freshly allocated code and the whole
//! batch is inserted in one transaction. Calling this twice with the same
//! input creates a second, disjoint batch: creation is intentionally not
//! idempotent, and researchers are told as much in the admin UI.

use sqlx::SqlitePool;
use tracing::info;

use studybank_common::config::Settings;
use studybank_common::model::{Study, StudyType};
use studybank_common::{Error, Result};

use crate::allocator::{self, MAX_STUDIES_PER_REQUEST};
use crate::db;

/// Create studies for every participant in the list
///
/// Validation is fail-fast, first violation wins: counts nonnegative, at
/// least one count nonzero, list nonempty once blank lines are dropped,
/// total within the request cap, every id alphanumeric. Only then are codes
/// allocated and rows written.
pub async fn create_studies(
    pool: &SqlitePool,
    settings: &Settings,
    participant_ids: &[String],
    baselines_per_participant: i64,
    followups_per_participant: i64,
) -> Result<Vec<Study>> {
    if baselines_per_participant < 0 || followups_per_participant < 0 {
        return Err(Error::InvalidInput(
            "baselines_per_participant and followups_per_participant must be nonnegative"
                .to_string(),
        ));
    }
    if baselines_per_participant == 0 && followups_per_participant == 0 {
        return Err(Error::InvalidInput(
            "At least one of baselines_per_participant and followups_per_participant must be nonzero"
                .to_string(),
        ));
    }

    // Blank lines are expected at the end of uploaded files; skip them.
    let ids: Vec<&str> = participant_ids
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if ids.is_empty() {
        return Err(Error::InvalidInput(
            "Received empty participant list".to_string(),
        ));
    }

    // Saturating math: absurd counts just land over the cap.
    let per_participant =
        baselines_per_participant.saturating_add(followups_per_participant) as usize;
    let total = ids.len().saturating_mul(per_participant);
    if total > MAX_STUDIES_PER_REQUEST {
        return Err(Error::InvalidInput(format!(
            "Too many studies requested: {} exceeds the per-request limit of {}",
            total, MAX_STUDIES_PER_REQUEST
        )));
    }

    for id in &ids {
        if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidInput(
                "Non-alphanumeric participant IDs are not allowed".to_string(),
            ));
        }
    }

    // The whole batch of codes is allocated up front; see allocator docs.
    let codes = allocator::allocate(pool, total).await?;

    let mut slots = Vec::with_capacity(total);
    for id in &ids {
        for _ in 0..baselines_per_participant {
            slots.push((*id, StudyType::Baseline));
        }
        for _ in 0..followups_per_participant {
            slots.push((*id, StudyType::Followup));
        }
    }

    let studies: Vec<Study> = slots
        .into_iter()
        .zip(codes)
        .map(|((participant_id, study_type), study_id)| Study {
            url: allocator::study_url(&settings.study_url_prefix, &study_id),
            study_id,
            participant_id: participant_id.to_string(),
            study_type,
        })
        .collect();

    db::insert_studies(pool, &studies).await?;
    info!(
        participants = ids.len(),
        studies = studies.len(),
        "Created study batch"
    );

    Ok(studies)
}
