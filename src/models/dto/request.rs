use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::errors::{AppError, AppResult};
use crate::models::domain::{Difficulty, EquipSlot, LeaderboardPeriod, LeaderboardType, SubmittedAnswer};
use crate::repositories::QuestionFilter;
use crate::services::answer_service::AnswerSubmission;
use crate::services::leaderboard_service::LeaderboardQuery;
use crate::services::session_service::ReportedCounts;

fn validate_reference_id(id: &str) -> Result<(), ValidationError> {
    let well_formed = !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_id_format"))
    }
}

fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub answer: SubmittedAnswer,

    #[serde(default)]
    #[validate(range(min = 0.0, max = 86400.0))]
    pub time_spent_seconds: f64,

    #[validate(custom(function = "validate_reference_id"))]
    pub stage_id: Option<String>,
}

impl SubmitAnswerRequest {
    pub fn into_submission(self, question_id: String) -> AnswerSubmission {
        AnswerSubmission {
            question_id,
            answer: self.answer,
            time_spent_seconds: self.time_spent_seconds,
            stage_id: self.stage_id,
        }
    }
}

/// Client-side counts are optional and only cross-checked against the server counters.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSessionRequest {
    #[validate(range(min = 0))]
    pub correct_count: Option<i64>,

    #[validate(range(min = 0))]
    pub total_count: Option<i64>,
}

impl From<CompleteSessionRequest> for ReportedCounts {
    fn from(request: CompleteSessionRequest) -> Self {
        ReportedCounts {
            correct_count: request.correct_count,
            total_count: request.total_count,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RandomQuestionQuery {
    #[validate(custom(function = "validate_reference_id"))]
    pub subject_id: Option<String>,

    /// Comma separated unit ids.
    pub unit_ids: Option<String>,

    #[validate(length(min = 1, max = 50))]
    pub subject: Option<String>,

    pub difficulty: Option<Difficulty>,

    #[validate(custom(function = "validate_reference_id"))]
    pub category_id: Option<String>,
}

impl RandomQuestionQuery {
    pub fn into_filter(self) -> AppResult<QuestionFilter> {
        self.validate()?;
        if self.subject_id.is_none() && self.subject.is_none() {
            return Err(AppError::ValidationError(
                "either subjectId or subject is required".to_string(),
            ));
        }

        Ok(QuestionFilter {
            unit_ids: self.unit_ids.as_deref().map(split_ids).unwrap_or_default(),
            subject_id: self.subject_id,
            subject: self.subject,
            difficulty: self.difficulty,
            category_id: self.category_id,
            exclude_ids: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuizItemQuery {
    #[validate(custom(function = "validate_reference_id"))]
    pub stage_id: Option<String>,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PurchaseRequest {
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 99))]
    pub quantity: i64,
}

impl Default for PurchaseRequest {
    fn default() -> Self {
        Self {
            quantity: default_quantity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EquipRequest {
    #[validate(length(min = 1, max = 32))]
    pub slot: String,
}

impl EquipRequest {
    pub fn slot(&self) -> AppResult<EquipSlot> {
        self.validate()?;
        self.slot.parse().map_err(AppError::ValidationError)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LeaderboardParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,

    pub period: Option<String>,

    #[serde(rename = "classId")]
    #[validate(custom(function = "validate_reference_id"))]
    pub class_id: Option<String>,

    #[validate(range(min = 1))]
    pub limit: Option<i64>,
}

impl LeaderboardParams {
    /// Missing values fall back to the all-time exp board with the default page size.
    pub fn into_query(self, default_limit: i64) -> AppResult<LeaderboardQuery> {
        self.validate()?;
        let kind = match self.kind.as_deref() {
            Some(raw) => raw.parse().map_err(AppError::ValidationError)?,
            None => LeaderboardType::Exp,
        };
        let period = match self.period.as_deref() {
            Some(raw) => raw.parse().map_err(AppError::ValidationError)?,
            None => LeaderboardPeriod::All,
        };

        Ok(LeaderboardQuery {
            kind,
            period,
            class_id: self.class_id,
            limit: self.limit.unwrap_or(default_limit),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_accepts_single_and_multi_answers() {
        let single: SubmitAnswerRequest =
            serde_json::from_str(r#"{"answer":"B","timeSpentSeconds":12.5}"#).unwrap();
        assert_eq!(single.answer, SubmittedAnswer::One("B".into()));
        assert!(single.validate().is_ok());

        let multi: SubmitAnswerRequest =
            serde_json::from_str(r#"{"answer":["A","C"],"stageId":"stage-1"}"#).unwrap();
        assert_eq!(multi.answer, SubmittedAnswer::Many(vec!["A".into(), "C".into()]));
        assert_eq!(multi.time_spent_seconds, 0.0);

        let submission = multi.into_submission("q-1".into());
        assert_eq!(submission.stage_id.as_deref(), Some("stage-1"));
    }

    #[test]
    fn negative_time_is_rejected() {
        let request: SubmitAnswerRequest =
            serde_json::from_str(r#"{"answer":"B","timeSpentSeconds":-1}"#).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn random_query_splits_unit_ids() {
        let query = RandomQuestionQuery {
            subject_id: Some("math".into()),
            unit_ids: Some("u-1, u-2,,".into()),
            ..Default::default()
        };

        let filter = query.into_filter().unwrap();
        assert_eq!(filter.unit_ids, vec!["u-1".to_string(), "u-2".to_string()]);
    }

    #[test]
    fn random_query_needs_a_subject() {
        let result = RandomQuestionQuery::default().into_filter();
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn leaderboard_params_default_to_all_time_exp() {
        let query = LeaderboardParams::default().into_query(20).unwrap();
        assert_eq!(query.kind, LeaderboardType::Exp);
        assert_eq!(query.period, LeaderboardPeriod::All);
        assert_eq!(query.limit, 20);
    }

    #[test]
    fn leaderboard_params_reject_bad_values() {
        let bad_type = LeaderboardParams {
            kind: Some("speed".into()),
            ..Default::default()
        };
        assert!(matches!(bad_type.into_query(20), Err(AppError::ValidationError(_))));

        let bad_class = LeaderboardParams {
            class_id: Some("class 1; drop".into()),
            ..Default::default()
        };
        assert!(matches!(bad_class.into_query(20), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn equip_slot_must_be_known() {
        let request = EquipRequest { slot: "hat".into() };
        assert!(matches!(request.slot(), Err(AppError::ValidationError(_))));

        let request = EquipRequest { slot: "title".into() };
        assert_eq!(request.slot().unwrap(), EquipSlot::Title);
    }

    #[test]
    fn purchase_quantity_defaults_to_one() {
        let request: PurchaseRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.quantity, 1);
        assert!(PurchaseRequest { quantity: 0 }.validate().is_err());
    }
}
