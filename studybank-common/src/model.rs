//! Domain model: studies, tests and the six result shapes
//!
//! A `Study` is a researcher-issued, participant-bound access code granting
//! one assessment session. A `Test` is one completed submission tied to a
//! study, carrying a type-specific result payload. The result payload is
//! untagged on the wire; `TestResult::test_type` is the single mapping from
//! result shape to test type, used by both ingest and export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Whether a study covers the participant's baseline or followup session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyType {
    Baseline,
    Followup,
}

impl StudyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyType::Baseline => "baseline",
            StudyType::Followup => "followup",
        }
    }
}

impl fmt::Display for StudyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "baseline" => Ok(StudyType::Baseline),
            "followup" => Ok(StudyType::Followup),
            other => Err(Error::Internal(format!("Unknown study type: {}", other))),
        }
    }
}

/// The six cognitive test types administered by the front-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    ImmediateRecall,
    DelayedRecall,
    ChoiceReactionTime,
    VisualPairedAssociates,
    DigitSymbolMatching,
    SpatialMemory,
}

impl TestType {
    /// All test types, in the order export archives are laid out
    pub const ALL: [TestType; 6] = [
        TestType::ImmediateRecall,
        TestType::DelayedRecall,
        TestType::ChoiceReactionTime,
        TestType::VisualPairedAssociates,
        TestType::DigitSymbolMatching,
        TestType::SpatialMemory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::ImmediateRecall => "immediate_recall",
            TestType::DelayedRecall => "delayed_recall",
            TestType::ChoiceReactionTime => "choice_reaction_time",
            TestType::VisualPairedAssociates => "visual_paired_associates",
            TestType::DigitSymbolMatching => "digit_symbol_matching",
            TestType::SpatialMemory => "spatial_memory",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TestType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::Internal(format!("Unknown test type: {}", s)))
    }
}

/// A researcher-issued access code bound to one participant
///
/// Studies are created in batches and immutable afterwards. `study_id` is
/// globally unique; the database enforces this with a primary key, and the
/// allocator additionally pre-checks candidates so batches come back clean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub study_id: String,
    pub participant_id: String,
    pub url: String,
    pub study_type: StudyType,
}

/// One question of a Visual Paired Associates test
///
/// - `vpa_rt`: time-to-answer, in milliseconds
/// - `vpa_correct`: true if the participant answered correctly
/// - `vpa_response`: the participant's response (image filename)
///
/// A test holds at most [`MAX_VPA_QUESTIONS`] of these; there are 20
/// questions, but the participant may time out before finishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualPairedAssociatesResult {
    pub vpa_rt: i64,
    pub vpa_correct: bool,
    pub vpa_response: String,
}

/// One question of a Choice Reaction Time test
///
/// - `crt_rt`: reaction time, in milliseconds
/// - `crt_correct`: true if the participant answered correctly
/// - `crt_response`: which key the participant pressed
/// - `crt_dwell`: how long the response key was held, in milliseconds
///
/// The question count varies with how many the participant attempts in the
/// 90 seconds allotted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceReactionTimeResult {
    pub crt_rt: i64,
    pub crt_correct: bool,
    pub crt_response: RightOrLeft,
    pub crt_dwell: i64,
}

/// Response key for a Choice Reaction Time question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RightOrLeft {
    Right,
    Left,
}

impl RightOrLeft {
    pub fn as_str(&self) -> &'static str {
        match self {
            RightOrLeft::Right => "right",
            RightOrLeft::Left => "left",
        }
    }
}

/// One question of a Digit Symbol Matching test
///
/// - `dsm_rt`: reaction time, in milliseconds
/// - `dsm_correct`: true if the participant answered correctly
/// - `dsm_response`: the participant's response (1, 2, or 3)
///
/// The question count varies with how many the participant attempts in the
/// 90 seconds allotted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitSymbolMatchingResult {
    pub dsm_rt: i64,
    pub dsm_correct: bool,
    pub dsm_response: i64,
}

/// The sole question of an Immediate Recall test, at which the participant
/// gets two attempts
///
/// - `ir_rt_first`: time-to-answer for the first attempt, in milliseconds
/// - `ir_rt_second`: time-to-answer for the second attempt, when one was made
/// - `ir_score`: 2 points for correct on the first attempt, 1 on the second,
///   0 for failing both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImmediateRecallResult {
    pub ir_rt_first: i64,
    #[serde(default)]
    pub ir_rt_second: Option<i64>,
    pub ir_score: i64,
}

/// The sole question of a Delayed Recall test
///
/// - `dr_rt`: time-to-answer, in milliseconds
/// - `dr_score`: 1 to 5 points, the number of animals correctly recalled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayedRecallResult {
    pub dr_rt: i64,
    pub dr_score: i64,
}

/// One question of a Spatial Memory test
///
/// - `sm_rt`: time-to-answer, in milliseconds
/// - `sm_correct`: true if the participant answered correctly
///
/// A test holds at most [`MAX_SM_QUESTIONS`] of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialMemoryResult {
    pub sm_rt: i64,
    pub sm_correct: bool,
}

/// Maximum questions in a Visual Paired Associates test
pub const MAX_VPA_QUESTIONS: usize = 20;
/// Maximum questions in a Spatial Memory test
pub const MAX_SM_QUESTIONS: usize = 5;

/// A test's result payload, one of six fixed shapes
///
/// On the wire the payload carries no discriminant; deserialization matches
/// the field names of exactly one variant (the prefixes `vpa_`, `crt_`,
/// `dsm_`, `ir_`, `dr_`, `sm_` keep the shapes disjoint). Two shapes are
/// single records, four are per-question sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestResult {
    ImmediateRecall(ImmediateRecallResult),
    DelayedRecall(DelayedRecallResult),
    VisualPairedAssociates(Vec<VisualPairedAssociatesResult>),
    ChoiceReactionTime(Vec<ChoiceReactionTimeResult>),
    DigitSymbolMatching(Vec<DigitSymbolMatchingResult>),
    SpatialMemory(Vec<SpatialMemoryResult>),
}

impl TestResult {
    /// The test type implied by this result's shape
    pub fn test_type(&self) -> TestType {
        match self {
            TestResult::ImmediateRecall(_) => TestType::ImmediateRecall,
            TestResult::DelayedRecall(_) => TestType::DelayedRecall,
            TestResult::VisualPairedAssociates(_) => TestType::VisualPairedAssociates,
            TestResult::ChoiceReactionTime(_) => TestType::ChoiceReactionTime,
            TestResult::DigitSymbolMatching(_) => TestType::DigitSymbolMatching,
            TestResult::SpatialMemory(_) => TestType::SpatialMemory,
        }
    }

    /// Number of per-question records (1 for the single-record shapes)
    pub fn question_count(&self) -> usize {
        match self {
            TestResult::ImmediateRecall(_) | TestResult::DelayedRecall(_) => 1,
            TestResult::VisualPairedAssociates(qs) => qs.len(),
            TestResult::ChoiceReactionTime(qs) => qs.len(),
            TestResult::DigitSymbolMatching(qs) => qs.len(),
            TestResult::SpatialMemory(qs) => qs.len(),
        }
    }

    /// Check score ranges and question-count bounds
    ///
    /// An empty question list is rejected here: it carries no information,
    /// and with no fields present the payload's shape would be ambiguous
    /// anyway.
    pub fn validate(&self) -> Result<()> {
        match self {
            TestResult::ImmediateRecall(r) => {
                if !(0..=2).contains(&r.ir_score) {
                    return Err(Error::InvalidInput(format!(
                        "ir_score must be 0, 1 or 2, got {}",
                        r.ir_score
                    )));
                }
            }
            TestResult::DelayedRecall(r) => {
                if !(1..=5).contains(&r.dr_score) {
                    return Err(Error::InvalidInput(format!(
                        "dr_score must be between 1 and 5, got {}",
                        r.dr_score
                    )));
                }
            }
            TestResult::VisualPairedAssociates(qs) => {
                require_nonempty(qs.len())?;
                if qs.len() > MAX_VPA_QUESTIONS {
                    return Err(Error::InvalidInput(format!(
                        "A visual_paired_associates test has at most {} questions, got {}",
                        MAX_VPA_QUESTIONS,
                        qs.len()
                    )));
                }
            }
            TestResult::ChoiceReactionTime(qs) => require_nonempty(qs.len())?,
            TestResult::DigitSymbolMatching(qs) => {
                require_nonempty(qs.len())?;
                for q in qs {
                    if !(1..=3).contains(&q.dsm_response) {
                        return Err(Error::InvalidInput(format!(
                            "dsm_response must be 1, 2 or 3, got {}",
                            q.dsm_response
                        )));
                    }
                }
            }
            TestResult::SpatialMemory(qs) => {
                require_nonempty(qs.len())?;
                if qs.len() > MAX_SM_QUESTIONS {
                    return Err(Error::InvalidInput(format!(
                        "A spatial_memory test has at most {} questions, got {}",
                        MAX_SM_QUESTIONS,
                        qs.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The subset of test fields the participant front-end supplies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSubmission {
    pub study_id: String,
    pub time_started: DateTime<Utc>,
    pub time_elapsed_milliseconds: i64,
    pub device_info: String,
    pub result: TestResult,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A completed test submission as persisted and exported
///
/// `test_id` and `test_type` are assigned server-side; the type comes from
/// the result shape, never from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Test {
    pub test_id: String,
    pub study_id: String,
    pub time_started: DateTime<Utc>,
    pub time_elapsed_milliseconds: i64,
    pub device_info: String,
    pub test_type: TestType,
    pub result: TestResult,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Test {
    /// Promote a submission into a full record with a server-assigned id
    pub fn from_submission(submission: TestSubmission, test_id: String) -> Self {
        let test_type = submission.result.test_type();
        Test {
            test_id,
            study_id: submission.study_id,
            time_started: submission.time_started,
            time_elapsed_milliseconds: submission.time_elapsed_milliseconds,
            device_info: submission.device_info,
            test_type,
            result: submission.result,
            notes: submission.notes,
        }
    }
}

fn require_nonempty(len: usize) -> Result<()> {
    if len == 0 {
        return Err(Error::InvalidInput(
            "Result contains no question records".to_string(),
        ));
    }
    Ok(())
}
