//! Multi-document writes that must land together: an answer's attempt log,
//! question stats, profile and session counters; a session's completion and
//! its bonus rewards.

use async_trait::async_trait;
use chrono::Utc;
use mongodb::{
    bson::{doc, Document},
    options::ReturnDocument,
    ClientSession, Collection,
};

use crate::{
    db::{self, finish_transaction, Database},
    errors::{AppError, AppResult},
    models::domain::{Question, QuestionAttempt, StageProgress, User},
    repositories::{
        stage_progress_repository::{completion_filter, completion_update, SessionIncrement},
        user_repository::ProfileWrite,
    },
};

#[derive(Clone, Debug, PartialEq)]
pub struct AnswerSettlement {
    pub attempt: QuestionAttempt,
    pub profile: ProfileWrite,
    /// Present when the answer counts toward a stage session.
    pub session: Option<SessionIncrement>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettlement {
    pub before: StageProgress,
    pub after: StageProgress,
    /// Absent when the session earned nothing.
    pub profile: Option<ProfileWrite>,
}

/// Running-average update evaluated server-side, so concurrent attempts never
/// overwrite each other.
pub fn stats_pipeline(is_correct: bool, time_spent_seconds: f64) -> Vec<Document> {
    let attempts = doc! { "$ifNull": ["$stats.total_attempts", 0_i64] };
    let corrects = doc! { "$ifNull": ["$stats.correct_count", 0_i64] };
    let average = doc! { "$ifNull": ["$stats.avg_time_seconds", 0.0] };

    vec![doc! {
        "$set": {
            "stats.avg_time_seconds": {
                "$divide": [
                    { "$add": [{ "$multiply": [average, attempts.clone()] }, time_spent_seconds] },
                    { "$add": [attempts.clone(), 1_i64] },
                ]
            },
            "stats.total_attempts": { "$add": [attempts, 1_i64] },
            "stats.correct_count": { "$add": [corrects, if is_correct { 1_i64 } else { 0_i64 }] },
        }
    }]
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettlementRepository: Send + Sync {
    /// Returns the advanced progress when the answer counted toward a session.
    async fn settle_answer(&self, settlement: AnswerSettlement) -> AppResult<Option<StageProgress>>;
    async fn settle_session(&self, settlement: SessionSettlement) -> AppResult<StageProgress>;
}

pub struct MongoSettlementRepository {
    db: Database,
    attempts: Collection<QuestionAttempt>,
    questions: Collection<Question>,
    users: Collection<User>,
    progress: Collection<StageProgress>,
}

impl MongoSettlementRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            attempts: db.get_collection(db::QUESTION_ATTEMPTS),
            questions: db.get_collection(db::QUESTIONS),
            users: db.get_collection(db::USERS),
            progress: db.get_collection(db::STAGE_PROGRESS),
        }
    }

    async fn write_profile(&self, session: &mut ClientSession, write: &ProfileWrite) -> AppResult<()> {
        let result = self
            .users
            .update_one(write.filter(), write.update()?)
            .session(&mut *session)
            .await?;
        if result.matched_count == 0 {
            return Err(write.conflict());
        }
        Ok(())
    }

    async fn answer_in(
        &self,
        session: &mut ClientSession,
        settlement: &AnswerSettlement,
    ) -> AppResult<Option<StageProgress>> {
        let attempt = &settlement.attempt;

        self.attempts.insert_one(attempt).session(&mut *session).await?;

        self.questions
            .update_one(
                doc! { "id": &attempt.question_id },
                stats_pipeline(attempt.is_correct, attempt.time_spent_seconds),
            )
            .session(&mut *session)
            .await?;

        self.write_profile(session, &settlement.profile).await?;

        let Some(increment) = &settlement.session else {
            return Ok(None);
        };

        let advanced = self
            .progress
            .find_one_and_update(increment.filter(), increment.update(Utc::now()))
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await?
            .ok_or_else(|| {
                AppError::Conflict(format!(
                    "question '{}' was already counted or the session is closed",
                    increment.question_id
                ))
            })?;

        Ok(Some(advanced))
    }

    async fn session_in(
        &self,
        session: &mut ClientSession,
        settlement: &SessionSettlement,
    ) -> AppResult<StageProgress> {
        let closed = self
            .progress
            .find_one_and_update(
                completion_filter(&settlement.before),
                completion_update(&settlement.after),
            )
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await?
            .ok_or_else(|| {
                AppError::Conflict(format!(
                    "session for stage '{}' is no longer in progress",
                    settlement.before.stage_id
                ))
            })?;

        if let Some(write) = &settlement.profile {
            self.write_profile(session, write).await?;
        }

        Ok(closed)
    }
}

#[async_trait]
impl SettlementRepository for MongoSettlementRepository {
    async fn settle_answer(&self, settlement: AnswerSettlement) -> AppResult<Option<StageProgress>> {
        let mut session = self.db.begin_transaction().await?;
        let outcome = self.answer_in(&mut session, &settlement).await;
        finish_transaction(&mut session, outcome).await
    }

    async fn settle_session(&self, settlement: SessionSettlement) -> AppResult<StageProgress> {
        let mut session = self.db.begin_transaction().await?;
        let outcome = self.session_in(&mut session, &settlement).await;
        finish_transaction(&mut session, outcome).await
    }
}
