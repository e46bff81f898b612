use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document},
    options::IndexOptions,
    Collection, IndexModel,
};

use crate::{
    db::{self, Database},
    errors::AppResult,
    models::domain::{question::QuestionType, Difficulty, Question},
};

/// Candidate pool for question selection. Empty fields do not restrict.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuestionFilter {
    pub unit_ids: Vec<String>,
    pub subject_id: Option<String>,
    pub subject: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub category_id: Option<String>,
    pub exclude_ids: Vec<String>,
}

impl QuestionFilter {
    pub fn without_exclusions(&self) -> Self {
        QuestionFilter {
            exclude_ids: Vec::new(),
            ..self.clone()
        }
    }

    pub fn to_document(&self) -> Document {
        let mut filter = doc! {
            "is_active": true,
            "$or": [
                { "question_type": { "$in": [
                    QuestionType::FillBlank.as_str(),
                    QuestionType::TrueFalse.as_str(),
                ] } },
                { "options.1": { "$exists": true } },
            ],
        };

        if !self.unit_ids.is_empty() {
            filter.insert("unit_id", doc! { "$in": self.unit_ids.clone() });
        }
        if let Some(subject_id) = &self.subject_id {
            filter.insert("subject_id", subject_id.clone());
        }
        if let Some(subject) = &self.subject {
            filter.insert("subject", subject.clone());
        }
        if let Some(difficulty) = self.difficulty {
            filter.insert("difficulty", difficulty.as_str());
        }
        if let Some(category_id) = &self.category_id {
            filter.insert("category_id", category_id.clone());
        }
        if !self.exclude_ids.is_empty() {
            filter.insert("id", doc! { "$nin": self.exclude_ids.clone() });
        }
        filter
    }

    /// In-process equivalent of [`QuestionFilter::to_document`].
    pub fn matches(&self, question: &Question) -> bool {
        question.is_active
            && question.is_playable()
            && (self.unit_ids.is_empty()
                || question
                    .unit_id
                    .as_ref()
                    .map(|u| self.unit_ids.contains(u))
                    .unwrap_or(false))
            && optional_eq(&self.subject_id, &question.subject_id)
            && optional_eq(&self.subject, &question.subject)
            && self.difficulty.map(|d| d == question.difficulty).unwrap_or(true)
            && optional_eq(&self.category_id, &question.category_id)
            && !self.exclude_ids.contains(&question.id)
    }
}

fn optional_eq(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        Some(w) => actual.as_deref() == Some(w.as_str()),
        None => true,
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Question>>;
    /// Uniformly random active question from the pool, if any.
    async fn sample_active(&self, filter: QuestionFilter) -> AppResult<Option<Question>>;
    async fn create(&self, question: Question) -> AppResult<Question>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoQuestionRepository {
    collection: Collection<Question>,
}

impl MongoQuestionRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(db::QUESTIONS);
        Self { collection }
    }
}

#[async_trait]
impl QuestionRepository for MongoQuestionRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Question>> {
        let question = self.collection.find_one(doc! { "id": id }).await?;
        Ok(question)
    }

    async fn sample_active(&self, filter: QuestionFilter) -> AppResult<Option<Question>> {
        let pipeline = vec![
            doc! { "$match": filter.to_document() },
            doc! { "$sample": { "size": 1 } },
        ];

        let sampled: Vec<Document> = self.collection.aggregate(pipeline).await?.try_collect().await?;

        match sampled.into_iter().next() {
            Some(document) => Ok(Some(bson::from_document(document)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, question: Question) -> AppResult<Question> {
        question.validate()?;
        self.collection.insert_one(&question).await?;
        Ok(question)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for questions collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let unit_index = IndexModel::builder()
            .keys(doc! { "unit_id": 1, "difficulty": 1, "is_active": 1 })
            .options(IndexOptions::builder().name("unit_difficulty".to_string()).build())
            .build();

        let subject_index = IndexModel::builder()
            .keys(doc! { "subject": 1, "difficulty": 1, "category_id": 1 })
            .options(IndexOptions::builder().name("legacy_subject".to_string()).build())
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(unit_index).await?;
        self.collection.create_index(subject_index).await?;

        log::info!("Successfully created indexes for questions collection");
        Ok(())
    }
}
