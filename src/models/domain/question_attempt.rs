use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::timestamps;
use crate::models::domain::answer::SubmittedAnswer;

/// Immutable log entry, one per answer submission.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct QuestionAttempt {
    pub id: String,
    pub student_id: String,
    pub question_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
    pub submitted_answer: SubmittedAnswer,
    pub is_correct: bool,
    pub time_spent_seconds: f64,
    pub exp_gained: i64,
    pub gold_gained: i64,
    #[serde(with = "timestamps::required")]
    pub created_at: DateTime<Utc>,
}

impl QuestionAttempt {
    pub fn new(
        student_id: &str,
        question_id: &str,
        stage_id: Option<&str>,
        submitted_answer: SubmittedAnswer,
        is_correct: bool,
        time_spent_seconds: f64,
        reward: (i64, i64),
    ) -> Self {
        QuestionAttempt {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            question_id: question_id.to_string(),
            stage_id: stage_id.map(str::to_string),
            submitted_answer,
            is_correct,
            time_spent_seconds: time_spent_seconds.max(0.0),
            exp_gained: reward.0,
            gold_gained: reward.1,
            created_at: Utc::now(),
        }
    }
}

/// Per-student totals over a window of attempts.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct AttemptTotals {
    #[serde(rename = "_id")]
    pub student_id: String,
    pub exp: i64,
    pub gold: i64,
    pub attempts: i64,
    pub corrects: i64,
}

impl AttemptTotals {
    pub fn correct_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.corrects as f64 / self.attempts as f64 * 100.0
        }
    }
}
