use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, Document},
    options::{IndexOptions, ReturnDocument},
    Collection, IndexModel,
};
use uuid::Uuid;

use crate::{
    db::{self, timestamps, Database},
    errors::{AppError, AppResult},
    models::domain::{SessionStatus, StageProgress},
};

/// One answer counted toward a running session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionIncrement {
    pub student_id: String,
    pub stage_id: String,
    pub session_id: String,
    pub question_id: String,
    pub correct: bool,
    pub limit: i64,
}

impl SessionIncrement {
    pub fn applies_to(&self, progress: &StageProgress) -> bool {
        progress.student_id == self.student_id
            && progress.stage_id == self.stage_id
            && progress.accepts_answer(&self.session_id, &self.question_id, self.limit)
    }

    pub fn apply(&self, progress: &StageProgress, now: DateTime<Utc>) -> StageProgress {
        let mut next = progress.clone();
        next.session_total += 1;
        if self.correct {
            next.session_correct += 1;
        }
        next.answered_question_ids.push(self.question_id.clone());
        next.updated_at = now;
        next
    }

    /// Matches only while the session is open, below its limit, and the
    /// question has not been counted yet.
    pub fn filter(&self) -> Document {
        doc! {
            "student_id": &self.student_id,
            "stage_id": &self.stage_id,
            "status": SessionStatus::InSession.as_str(),
            "session_id": &self.session_id,
            "session_total": { "$lt": self.limit },
            "answered_question_ids": { "$ne": &self.question_id },
        }
    }

    pub fn update(&self, now: DateTime<Utc>) -> Document {
        doc! {
            "$inc": {
                "session_total": 1_i64,
                "session_correct": if self.correct { 1_i64 } else { 0_i64 },
            },
            "$push": { "answered_question_ids": &self.question_id },
            "$set": { "updated_at": timestamps::to_bson(now) },
        }
    }
}

/// Compare-and-swap guard for closing a session: the counters must still be
/// the ones the result was computed from.
pub fn completion_filter(before: &StageProgress) -> Document {
    doc! {
        "student_id": &before.student_id,
        "stage_id": &before.stage_id,
        "status": SessionStatus::InSession.as_str(),
        "session_id": before.session_id.clone(),
        "session_total": before.session_total,
        "session_correct": before.session_correct,
    }
}

pub fn completion_update(after: &StageProgress) -> Document {
    let completed_at = after.completed_at.map(timestamps::to_bson);
    doc! {
        "$set": {
            "status": after.status.as_str(),
            "best_score": after.best_score,
            "is_completed": after.is_completed,
            "completed_at": completed_at,
            "total_attempts": after.total_attempts,
            "updated_at": timestamps::to_bson(after.updated_at),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StageProgressRepository: Send + Sync {
    async fn find(&self, student_id: &str, stage_id: &str) -> AppResult<Option<StageProgress>>;
    /// Opens a fresh session, creating the record on first play.
    async fn start_session(
        &self,
        student_id: &str,
        stage_id: &str,
        session_id: &str,
    ) -> AppResult<StageProgress>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoStageProgressRepository {
    collection: Collection<StageProgress>,
}

impl MongoStageProgressRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(db::STAGE_PROGRESS);
        Self { collection }
    }
}

#[async_trait]
impl StageProgressRepository for MongoStageProgressRepository {
    async fn find(&self, student_id: &str, stage_id: &str) -> AppResult<Option<StageProgress>> {
        let progress = self
            .collection
            .find_one(doc! { "student_id": student_id, "stage_id": stage_id })
            .await?;
        Ok(progress)
    }

    async fn start_session(
        &self,
        student_id: &str,
        stage_id: &str,
        session_id: &str,
    ) -> AppResult<StageProgress> {
        let now = timestamps::to_bson(Utc::now());
        let update = doc! {
            "$set": {
                "status": SessionStatus::InSession.as_str(),
                "session_id": session_id,
                "session_correct": 0_i64,
                "session_total": 0_i64,
                "answered_question_ids": [],
                "updated_at": now,
            },
            "$setOnInsert": {
                "id": Uuid::new_v4().to_string(),
                "best_score": 0.0,
                "is_completed": false,
                "total_attempts": 0_i64,
            },
        };

        self.collection
            .find_one_and_update(doc! { "student_id": student_id, "stage_id": stage_id }, update)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| {
                AppError::InternalError(format!(
                    "stage progress upsert returned nothing for stage '{}'",
                    stage_id
                ))
            })
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for stage_progress collection");

        let owner_index = IndexModel::builder()
            .keys(doc! { "student_id": 1, "stage_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("student_stage_unique".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(owner_index).await?;

        log::info!("Successfully created indexes for stage_progress collection");
        Ok(())
    }
}
