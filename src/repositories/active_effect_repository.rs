use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::IndexOptions,
    Collection, IndexModel,
};

use crate::{
    db::{self, timestamps, Database},
    errors::AppResult,
    models::domain::{ActiveEffect, EffectGrant},
};

pub fn effect_key(player_id: &str, grant: &EffectGrant) -> Document {
    doc! { "player_id": player_id, "effect_type": grant.effect_type.as_str() }
}

/// Pipeline update that pushes an unexpired `expires_at` further out, or
/// restarts it from `now`. Safe to run as an upsert.
pub fn extend_pipeline(player_id: &str, grant: &EffectGrant, now: DateTime<Utc>) -> Vec<Document> {
    let now = timestamps::to_bson(now);
    let millis = grant.duration.num_milliseconds();

    vec![doc! {
        "$set": {
            "player_id": player_id,
            "effect_type": grant.effect_type.as_str(),
            "item_id": &grant.item_id,
            "value": grant.value,
            "expires_at": {
                "$cond": [
                    { "$gt": ["$expires_at", now] },
                    { "$add": ["$expires_at", millis] },
                    { "$add": [now, millis] },
                ]
            },
        }
    }]
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActiveEffectRepository: Send + Sync {
    /// Unexpired effects only. Expired rows are never deleted, just ignored.
    async fn find_active(&self, player_id: &str, now: DateTime<Utc>) -> AppResult<Vec<ActiveEffect>>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoActiveEffectRepository {
    collection: Collection<ActiveEffect>,
}

impl MongoActiveEffectRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(db::ACTIVE_EFFECTS);
        Self { collection }
    }
}

#[async_trait]
impl ActiveEffectRepository for MongoActiveEffectRepository {
    async fn find_active(&self, player_id: &str, now: DateTime<Utc>) -> AppResult<Vec<ActiveEffect>> {
        let cursor = self
            .collection
            .find(doc! {
                "player_id": player_id,
                "expires_at": { "$gt": timestamps::to_bson(now) },
            })
            .await?;
        let effects: Vec<ActiveEffect> = cursor.try_collect().await?;
        Ok(effects)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for active_effects collection");

        let key_index = IndexModel::builder()
            .keys(doc! { "player_id": 1, "effect_type": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("player_effect_unique".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(key_index).await?;

        log::info!("Successfully created indexes for active_effects collection");
        Ok(())
    }
}
