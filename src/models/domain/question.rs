use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::timestamps;
use crate::errors::{AppError, AppResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Reward granted when a question does not carry its own `base_exp`/`base_gold`.
    pub fn default_rewards(self) -> (i64, i64) {
        match self {
            Difficulty::Easy => (10, 5),
            Difficulty::Medium => (20, 10),
            Difficulty::Hard => (30, 15),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    FillBlank,
    TrueFalse,
}

impl QuestionType {
    pub fn is_choice(self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultipleChoice)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::FillBlank => "fill_blank",
            QuestionType::TrueFalse => "true_false",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct QuestionContent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}

/// Stored correct answer. Legacy documents hold a plain string, multi-select
/// questions an array, and some true/false questions a raw boolean.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    One(String),
    Many(Vec<String>),
    Flag(bool),
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AnswerSpec {
    pub correct: CorrectAnswer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct QuestionStats {
    #[serde(default)]
    pub total_attempts: i64,
    #[serde(default)]
    pub correct_count: i64,
    #[serde(default)]
    pub avg_time_seconds: f64,
}

impl QuestionStats {
    /// Folds one attempt into the running totals.
    pub fn record(&self, is_correct: bool, time_spent_seconds: f64) -> QuestionStats {
        let total = self.total_attempts + 1;
        QuestionStats {
            total_attempts: total,
            correct_count: self.correct_count + i64::from(is_correct),
            avg_time_seconds: (self.avg_time_seconds * self.total_attempts as f64 + time_spent_seconds)
                / total as f64,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Question {
    pub id: String,
    /// Legacy flat subject tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    pub difficulty: Difficulty,
    pub question_type: QuestionType,
    pub content: QuestionContent,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    pub answer: AnswerSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_gold: Option<i64>,
    #[serde(default)]
    pub stats: QuestionStats,
    pub is_active: bool,
    #[serde(with = "timestamps::required")]
    pub created_at: DateTime<Utc>,
}

impl Question {
    /// `(exp, gold)` before any boost, falling back to the difficulty table.
    pub fn base_rewards(&self) -> (i64, i64) {
        let (default_exp, default_gold) = self.difficulty.default_rewards();
        (
            self.base_exp.unwrap_or(default_exp),
            self.base_gold.unwrap_or(default_gold),
        )
    }

    pub fn option_text(&self, option_id: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.id == option_id)
            .map(|o| o.text.as_str())
    }

    /// Choice questions are unusable with fewer than two options.
    pub fn is_playable(&self) -> bool {
        !self.question_type.is_choice() || self.options.len() >= 2
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.content.text.trim().is_empty() {
            return Err(AppError::ValidationError(
                "question text must not be empty".to_string(),
            ));
        }
        if !self.is_playable() {
            return Err(AppError::ValidationError(format!(
                "{} question needs at least 2 options",
                self.question_type.as_str()
            )));
        }
        Ok(())
    }

    /// Human readable form of the correct answer: option text for choice
    /// questions, 正確/錯誤 for true/false, and the raw value for fill-in.
    pub fn correct_answer_text(&self) -> String {
        let values: Vec<String> = match &self.answer.correct {
            CorrectAnswer::One(v) => vec![v.clone()],
            CorrectAnswer::Many(vs) => vs.clone(),
            CorrectAnswer::Flag(b) => vec![b.to_string()],
        };

        match self.question_type {
            QuestionType::SingleChoice | QuestionType::MultipleChoice => values
                .iter()
                .map(|id| self.option_text(id.trim()).unwrap_or(id).to_string())
                .collect::<Vec<_>>()
                .join("、"),
            QuestionType::TrueFalse => {
                let truthy = values
                    .first()
                    .map(|v| v.trim().eq_ignore_ascii_case("true"))
                    .unwrap_or(false);
                if truthy { "正確" } else { "錯誤" }.to_string()
            }
            QuestionType::FillBlank => values.join("、"),
        }
    }

    /// Option ids that are not part of the correct answer.
    pub fn wrong_option_ids(&self) -> Vec<&str> {
        let correct: Vec<&str> = match &self.answer.correct {
            CorrectAnswer::One(v) => vec![v.trim()],
            CorrectAnswer::Many(vs) => vs.iter().map(|v| v.trim()).collect(),
            CorrectAnswer::Flag(_) => vec![],
        };
        self.options
            .iter()
            .map(|o| o.id.as_str())
            .filter(|id| !correct.contains(&id.trim()))
            .collect()
    }
}
