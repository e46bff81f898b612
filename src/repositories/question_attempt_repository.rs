use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document},
    options::IndexOptions,
    Collection, IndexModel,
};

use crate::{
    db::{self, timestamps, Database},
    errors::AppResult,
    models::domain::{AttemptTotals, QuestionAttempt},
};

/// Groups attempts since `since` per student, optionally restricted to a set of students.
pub fn totals_pipeline(since: DateTime<Utc>, student_ids: Option<&[String]>) -> Vec<Document> {
    let mut matcher = doc! { "created_at": { "$gte": timestamps::to_bson(since) } };
    if let Some(ids) = student_ids {
        matcher.insert("student_id", doc! { "$in": ids.to_vec() });
    }

    vec![
        doc! { "$match": matcher },
        doc! {
            "$group": {
                "_id": "$student_id",
                "exp": { "$sum": "$exp_gained" },
                "gold": { "$sum": "$gold_gained" },
                "attempts": { "$sum": 1_i64 },
                "corrects": { "$sum": { "$cond": ["$is_correct", 1_i64, 0_i64] } },
            }
        },
    ]
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionAttemptRepository: Send + Sync {
    async fn totals_since(
        &self,
        since: DateTime<Utc>,
        student_ids: Option<Vec<String>>,
    ) -> AppResult<Vec<AttemptTotals>>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoQuestionAttemptRepository {
    collection: Collection<QuestionAttempt>,
}

impl MongoQuestionAttemptRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(db::QUESTION_ATTEMPTS);
        Self { collection }
    }
}

#[async_trait]
impl QuestionAttemptRepository for MongoQuestionAttemptRepository {
    async fn totals_since(
        &self,
        since: DateTime<Utc>,
        student_ids: Option<Vec<String>>,
    ) -> AppResult<Vec<AttemptTotals>> {
        let pipeline = totals_pipeline(since, student_ids.as_deref());
        let grouped: Vec<Document> = self.collection.aggregate(pipeline).await?.try_collect().await?;

        grouped
            .into_iter()
            .map(|document| bson::from_document(document).map_err(Into::into))
            .collect()
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for question_attempts collection");

        let window_index = IndexModel::builder()
            .keys(doc! { "created_at": -1, "student_id": 1 })
            .options(IndexOptions::builder().name("created_student".to_string()).build())
            .build();

        let student_index = IndexModel::builder()
            .keys(doc! { "student_id": 1, "created_at": -1 })
            .options(IndexOptions::builder().name("student_created".to_string()).build())
            .build();

        self.collection.create_index(window_index).await?;
        self.collection.create_index(student_index).await?;

        log::info!("Successfully created indexes for question_attempts collection");
        Ok(())
    }
}
