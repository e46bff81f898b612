use async_trait::async_trait;
use mongodb::{bson::doc, options::IndexOptions, Collection, IndexModel};

use crate::{
    db::{self, Database},
    errors::AppResult,
    models::domain::Classroom,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClassroomRepository: Send + Sync {
    async fn create(&self, classroom: Classroom) -> AppResult<Classroom>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Classroom>>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoClassroomRepository {
    collection: Collection<Classroom>,
}

impl MongoClassroomRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(db::CLASSROOMS);
        Self { collection }
    }
}

#[async_trait]
impl ClassroomRepository for MongoClassroomRepository {
    async fn create(&self, classroom: Classroom) -> AppResult<Classroom> {
        self.collection.insert_one(&classroom).await?;
        Ok(classroom)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Classroom>> {
        let classroom = self.collection.find_one(doc! { "id": id }).await?;
        Ok(classroom)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        let model = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.collection.create_index(model).await?;
        log::info!("Created unique index on classrooms.id");

        Ok(())
    }
}
