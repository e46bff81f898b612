use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::timestamps;
use crate::errors::{AppError, AppResult};
use crate::models::domain::stage::{RewardBundle, Stage};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    NotStarted,
    InSession,
    Completed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InSession => "in_session",
            SessionStatus::Completed => "completed",
        }
    }
}

/// One record per student and stage. Session counters reset on every start;
/// `best_score`, `is_completed` and `total_attempts` only ever grow.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StageProgress {
    pub id: String,
    pub student_id: String,
    pub stage_id: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub session_correct: i64,
    #[serde(default)]
    pub session_total: i64,
    /// Questions already counted in the running session.
    #[serde(default)]
    pub answered_question_ids: Vec<String>,
    #[serde(default)]
    pub best_score: f64,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default, with = "timestamps::optional", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_attempts: i64,
    #[serde(with = "timestamps::required")]
    pub updated_at: DateTime<Utc>,
}

/// Outcome of closing a session, computed from the server-side counters.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionResult {
    pub session_id: String,
    pub correct_count: i64,
    pub total_count: i64,
    pub correct_rate: f64,
    pub is_passed: bool,
    pub is_first_clear: bool,
    pub rewards: RewardBundle,
}

impl StageProgress {
    pub fn new(student_id: &str, stage_id: &str) -> Self {
        StageProgress {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            stage_id: stage_id.to_string(),
            status: SessionStatus::NotStarted,
            session_id: None,
            session_correct: 0,
            session_total: 0,
            answered_question_ids: Vec::new(),
            best_score: 0.0,
            is_completed: false,
            completed_at: None,
            total_attempts: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn is_in_session(&self) -> bool {
        self.status == SessionStatus::InSession
    }

    /// Resets the session counters for a fresh play-through. Legal from any state.
    pub fn restarted(&self, session_id: &str, now: DateTime<Utc>) -> Self {
        StageProgress {
            status: SessionStatus::InSession,
            session_id: Some(session_id.to_string()),
            session_correct: 0,
            session_total: 0,
            answered_question_ids: Vec::new(),
            updated_at: now,
            ..self.clone()
        }
    }

    /// Whether an answer to `question_id` may still advance the counters.
    pub fn accepts_answer(&self, session_id: &str, question_id: &str, limit: i64) -> bool {
        self.is_in_session()
            && self.session_id.as_deref() == Some(session_id)
            && self.session_total < limit
            && !self.answered_question_ids.iter().any(|q| q == question_id)
    }

    pub fn evaluate_completion(&self, stage: &Stage, pass_threshold: f64) -> AppResult<SessionResult> {
        let session_id = match (&self.status, &self.session_id) {
            (SessionStatus::InSession, Some(id)) => id.clone(),
            _ => {
                return Err(AppError::Conflict(format!(
                    "no session in progress for stage '{}'",
                    stage.id
                )))
            }
        };

        if self.session_total == 0 || self.session_total < stage.questions_per_session {
            return Err(AppError::Conflict(format!(
                "session has {} of {} questions answered",
                self.session_total, stage.questions_per_session
            )));
        }

        let correct_rate = self.session_correct as f64 / self.session_total as f64 * 100.0;
        let is_passed = correct_rate >= pass_threshold;
        let is_first_clear = is_passed && !self.is_completed;

        let mut rewards = RewardBundle::default();
        if is_passed {
            rewards.exp += stage.rewards.bonus_exp;
            rewards.gold += stage.rewards.bonus_gold;
        }
        if is_first_clear {
            if let Some(bonus) = &stage.rewards.first_clear_bonus {
                rewards.exp += bonus.exp;
                rewards.gold += bonus.gold;
            }
        }

        Ok(SessionResult {
            session_id,
            correct_count: self.session_correct,
            total_count: self.session_total,
            correct_rate,
            is_passed,
            is_first_clear,
            rewards,
        })
    }

    /// State after the session closes. Never lowers `best_score` or unsets completion.
    pub fn completed(&self, result: &SessionResult, now: DateTime<Utc>) -> Self {
        StageProgress {
            status: SessionStatus::Completed,
            best_score: self.best_score.max(result.correct_rate),
            is_completed: self.is_completed || result.is_passed,
            completed_at: if result.is_first_clear {
                Some(now)
            } else {
                self.completed_at
            },
            total_attempts: self.total_attempts + 1,
            updated_at: now,
            ..self.clone()
        }
    }
}
