use async_trait::async_trait;
use mongodb::{
    bson::doc,
    options::{FindOneOptions, IndexOptions},
    Collection, IndexModel,
};

use crate::{
    db::{self, Database},
    errors::AppResult,
    models::domain::Stage,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StageRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Stage>>;
    /// Active stage with the highest `order` below the given one.
    async fn find_previous(&self, order: i32) -> AppResult<Option<Stage>>;
    async fn create(&self, stage: Stage) -> AppResult<Stage>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoStageRepository {
    collection: Collection<Stage>,
}

impl MongoStageRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(db::STAGES);
        Self { collection }
    }
}

#[async_trait]
impl StageRepository for MongoStageRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Stage>> {
        let stage = self
            .collection
            .find_one(doc! { "id": id, "is_active": true })
            .await?;
        Ok(stage)
    }

    async fn find_previous(&self, order: i32) -> AppResult<Option<Stage>> {
        let options = FindOneOptions::builder().sort(doc! { "order": -1 }).build();
        let stage = self
            .collection
            .find_one(doc! { "order": { "$lt": order }, "is_active": true })
            .with_options(options)
            .await?;
        Ok(stage)
    }

    async fn create(&self, stage: Stage) -> AppResult<Stage> {
        self.collection.insert_one(&stage).await?;
        Ok(stage)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for stages collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let order_index = IndexModel::builder()
            .keys(doc! { "order": 1 })
            .options(IndexOptions::builder().name("order".to_string()).build())
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(order_index).await?;

        log::info!("Successfully created indexes for stages collection");
        Ok(())
    }
}
