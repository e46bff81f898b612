use std::sync::Arc;

use chrono::Utc;

use crate::{
    errors::{AppError, AppResult},
    models::domain::{ActiveEffect, PlayerItem, User},
    repositories::{ActiveEffectRepository, ItemRepository, UserRepository},
};

pub struct ProfileService {
    users: Arc<dyn UserRepository>,
    items: Arc<dyn ItemRepository>,
    effects: Arc<dyn ActiveEffectRepository>,
}

impl ProfileService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        items: Arc<dyn ItemRepository>,
        effects: Arc<dyn ActiveEffectRepository>,
    ) -> Self {
        Self {
            users,
            items,
            effects,
        }
    }

    pub async fn get_user(&self, user_id: &str) -> AppResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id '{}' not found", user_id)))
    }

    pub async fn inventory(&self, player_id: &str) -> AppResult<Vec<PlayerItem>> {
        self.items.list_player_items(player_id).await
    }

    pub async fn active_effects(&self, player_id: &str) -> AppResult<Vec<ActiveEffect>> {
        self.effects.find_active(player_id, Utc::now()).await
    }
}
