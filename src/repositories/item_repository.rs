use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{IndexOptions, ReturnDocument},
    ClientSession, Collection, IndexModel,
};

use crate::{
    db::{self, finish_transaction, timestamps, Database},
    errors::{AppError, AppResult},
    models::domain::{ActiveEffect, EffectGrant, Item, PlayerItem, StageProgress, User},
    repositories::{
        active_effect_repository::{effect_key, extend_pipeline},
        stage_progress_repository::SessionIncrement,
        user_repository::ProfileWrite,
    },
};

/// Result of spending one unit of a consumable.
#[derive(Clone, Debug, PartialEq)]
pub struct Consumption {
    pub remaining_quantity: i64,
    pub effects: Vec<ActiveEffect>,
    /// Session after the spend counted a question, `None` when nothing was counted.
    pub session: Option<StageProgress>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Purchase {
    pub player_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub max_stack: i64,
    /// Profile with the price already deducted.
    pub profile: ProfileWrite,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn create(&self, item: Item) -> AppResult<Item>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Item>>;
    async fn find_by_ids(&self, ids: Vec<String>) -> AppResult<Vec<Item>>;
    async fn find_player_item(&self, player_id: &str, item_id: &str) -> AppResult<Option<PlayerItem>>;
    async fn list_player_items(&self, player_id: &str) -> AppResult<Vec<PlayerItem>>;
    /// Takes one unit, applies every grant and counts the session question,
    /// all or nothing. Fails with `ValidationError` when the player holds none.
    /// A session increment whose guard no longer matches is dropped; the unit
    /// is still spent.
    async fn consume(
        &self,
        player_id: &str,
        item_id: &str,
        grants: Vec<EffectGrant>,
        session: Option<SessionIncrement>,
        now: DateTime<Utc>,
    ) -> AppResult<Consumption>;
    /// Charges gold and adds quantity, all or nothing.
    async fn purchase(&self, purchase: Purchase) -> AppResult<PlayerItem>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoItemRepository {
    db: Database,
    items: Collection<Item>,
    player_items: Collection<PlayerItem>,
    effects: Collection<ActiveEffect>,
    users: Collection<User>,
    progress: Collection<StageProgress>,
}

impl MongoItemRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            items: db.get_collection(db::ITEMS),
            player_items: db.get_collection(db::PLAYER_ITEMS),
            effects: db.get_collection(db::ACTIVE_EFFECTS),
            users: db.get_collection(db::USERS),
            progress: db.get_collection(db::STAGE_PROGRESS),
        }
    }

    async fn consume_in(
        &self,
        session: &mut ClientSession,
        player_id: &str,
        item_id: &str,
        grants: &[EffectGrant],
        increment: Option<&SessionIncrement>,
        now: DateTime<Utc>,
    ) -> AppResult<Consumption> {
        let owned = doc! { "player_id": player_id, "item_id": item_id };

        let mut guarded = owned.clone();
        guarded.insert("quantity", doc! { "$gte": 1_i64 });

        let remaining = self
            .player_items
            .find_one_and_update(guarded, doc! { "$inc": { "quantity": -1_i64 } })
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await?
            .ok_or_else(|| {
                AppError::ValidationError(format!("item '{}' is not in the inventory", item_id))
            })?
            .quantity;

        if remaining <= 0 {
            self.player_items
                .delete_one(owned)
                .session(&mut *session)
                .await?;
        }

        let mut effects = Vec::with_capacity(grants.len());
        for grant in grants {
            let effect = self
                .effects
                .find_one_and_update(effect_key(player_id, grant), extend_pipeline(player_id, grant, now))
                .upsert(true)
                .return_document(ReturnDocument::After)
                .session(&mut *session)
                .await?
                .ok_or_else(|| {
                    AppError::InternalError(format!(
                        "effect upsert returned nothing for '{}'",
                        grant.effect_type.as_str()
                    ))
                })?;
            effects.push(effect);
        }

        let advanced = match increment {
            Some(increment) => {
                self.progress
                    .find_one_and_update(increment.filter(), increment.update(now))
                    .return_document(ReturnDocument::After)
                    .session(&mut *session)
                    .await?
            }
            None => None,
        };

        Ok(Consumption {
            remaining_quantity: remaining.max(0),
            effects,
            session: advanced,
        })
    }

    async fn purchase_in(&self, session: &mut ClientSession, purchase: &Purchase) -> AppResult<PlayerItem> {
        let charged = self
            .users
            .update_one(purchase.profile.filter(), purchase.profile.update()?)
            .session(&mut *session)
            .await?;
        if charged.matched_count == 0 {
            return Err(purchase.profile.conflict());
        }

        let owned = doc! { "player_id": &purchase.player_id, "item_id": &purchase.item_id };
        let held = self
            .player_items
            .find_one(owned.clone())
            .session(&mut *session)
            .await?
            .map(|p| p.quantity)
            .unwrap_or(0);

        if held + purchase.quantity > purchase.max_stack {
            return Err(AppError::ValidationError(format!(
                "item '{}' stacks to {}, already holding {}",
                purchase.item_id, purchase.max_stack, held
            )));
        }

        self.player_items
            .find_one_and_update(
                owned,
                doc! {
                    "$inc": { "quantity": purchase.quantity },
                    "$setOnInsert": { "acquired_at": timestamps::to_bson(Utc::now()) },
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await?
            .ok_or_else(|| {
                AppError::InternalError(format!("inventory upsert returned nothing for '{}'", purchase.item_id))
            })
    }
}

#[async_trait]
impl ItemRepository for MongoItemRepository {
    async fn create(&self, item: Item) -> AppResult<Item> {
        self.items.insert_one(&item).await?;
        Ok(item)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Item>> {
        let item = self.items.find_one(doc! { "id": id }).await?;
        Ok(item)
    }

    async fn find_by_ids(&self, ids: Vec<String>) -> AppResult<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self.items.find(doc! { "id": { "$in": ids } }).await?;
        let items: Vec<Item> = cursor.try_collect().await?;
        Ok(items)
    }

    async fn find_player_item(&self, player_id: &str, item_id: &str) -> AppResult<Option<PlayerItem>> {
        let owned = self
            .player_items
            .find_one(doc! { "player_id": player_id, "item_id": item_id })
            .await?;
        Ok(owned)
    }

    async fn list_player_items(&self, player_id: &str) -> AppResult<Vec<PlayerItem>> {
        let cursor = self.player_items.find(doc! { "player_id": player_id }).await?;
        let owned: Vec<PlayerItem> = cursor.try_collect().await?;
        Ok(owned)
    }

    async fn consume(
        &self,
        player_id: &str,
        item_id: &str,
        grants: Vec<EffectGrant>,
        increment: Option<SessionIncrement>,
        now: DateTime<Utc>,
    ) -> AppResult<Consumption> {
        let mut session = self.db.begin_transaction().await?;
        let outcome = self
            .consume_in(&mut session, player_id, item_id, &grants, increment.as_ref(), now)
            .await;
        finish_transaction(&mut session, outcome).await
    }

    async fn purchase(&self, purchase: Purchase) -> AppResult<PlayerItem> {
        let mut session = self.db.begin_transaction().await?;
        let outcome = self.purchase_in(&mut session, &purchase).await;
        finish_transaction(&mut session, outcome).await
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for items and player_items collections");

        let item_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();
        self.items.create_index(item_index).await?;

        let owner_index = IndexModel::builder()
            .keys(doc! { "player_id": 1, "item_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("player_item_unique".to_string())
                    .build(),
            )
            .build();
        self.player_items.create_index(owner_index).await?;

        log::info!("Successfully created indexes for items and player_items collections");
        Ok(())
    }
}
