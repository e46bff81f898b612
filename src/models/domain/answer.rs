use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::models::domain::question::{CorrectAnswer, Question, QuestionType};

/// What a student sent: one value, or a list for multi-select.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SubmittedAnswer {
    One(String),
    Many(Vec<String>),
}

impl SubmittedAnswer {
    pub fn values(&self) -> Vec<&str> {
        match self {
            SubmittedAnswer::One(v) => vec![v.trim()],
            SubmittedAnswer::Many(vs) => vs.iter().map(|v| v.trim()).collect(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.values().iter().all(|v| v.is_empty())
    }

    fn single(&self) -> Option<&str> {
        match self.values().as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}

/// Grading strategy derived from a question's type and stored answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnswerKey {
    Single(String),
    /// Exact set match: order and duplicates are ignored, extras and omissions are not.
    Set(BTreeSet<String>),
    Boolean(bool),
    FillBlank(String),
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

impl AnswerKey {
    pub fn for_question(question: &Question) -> AppResult<Self> {
        let key = match (&question.question_type, &question.answer.correct) {
            (QuestionType::TrueFalse, CorrectAnswer::Flag(b)) => AnswerKey::Boolean(*b),
            (QuestionType::TrueFalse, CorrectAnswer::One(v)) => {
                AnswerKey::Boolean(parse_bool(v).ok_or_else(|| invalid_key(question))?)
            }
            (QuestionType::TrueFalse, CorrectAnswer::Many(vs)) => AnswerKey::Boolean(
                vs.first()
                    .and_then(|v| parse_bool(v))
                    .ok_or_else(|| invalid_key(question))?,
            ),
            (_, CorrectAnswer::Many(vs)) => {
                AnswerKey::Set(vs.iter().map(|v| v.trim().to_string()).collect())
            }
            (QuestionType::MultipleChoice, CorrectAnswer::One(v)) => {
                AnswerKey::Set(BTreeSet::from([v.trim().to_string()]))
            }
            (QuestionType::FillBlank, CorrectAnswer::One(v)) => {
                AnswerKey::FillBlank(v.trim().to_string())
            }
            (_, CorrectAnswer::One(v)) => AnswerKey::Single(v.trim().to_string()),
            (_, CorrectAnswer::Flag(b)) => AnswerKey::Single(b.to_string()),
        };
        Ok(key)
    }

    pub fn matches(&self, submitted: &SubmittedAnswer) -> bool {
        match self {
            AnswerKey::Single(expected) | AnswerKey::FillBlank(expected) => {
                submitted.single() == Some(expected.as_str())
            }
            AnswerKey::Set(expected) => {
                let given: BTreeSet<&str> = submitted.values().into_iter().collect();
                given.len() == expected.len()
                    && expected.iter().all(|v| given.contains(v.as_str()))
            }
            AnswerKey::Boolean(expected) => submitted
                .single()
                .and_then(parse_bool)
                .map(|b| b == *expected)
                .unwrap_or(false),
        }
    }
}

fn invalid_key(question: &Question) -> AppError {
    AppError::InternalError(format!(
        "question '{}' has an unreadable true/false answer",
        question.id
    ))
}
