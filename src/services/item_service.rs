use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::{seq::SliceRandom, Rng};

use crate::{
    config::GameRules,
    errors::{AppError, AppResult},
    models::domain::{
        ActiveEffect, EffectGrant, EffectType, EquipSlot, Item, ItemType, PlayerItem, Question,
        StageProgress, StudentProfile,
    },
    repositories::{
        ItemRepository, ProfileWrite, Purchase, QuestionRepository, SessionIncrement,
        StageProgressRepository, StageRepository, UserRepository,
    },
    services::load_student,
};

pub const ENCOURAGEMENT: &str = "仔細讀題，相信自己，你一定可以的！";

#[derive(Clone, Debug, PartialEq)]
pub struct ConsumableUse {
    pub item: Item,
    pub applied_effects: Vec<ActiveEffect>,
    pub remaining_quantity: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QuizItemUse {
    pub item_id: String,
    pub hint: Option<String>,
    pub skip: bool,
    /// Readable answer, only revealed by a skip.
    pub correct_answer: Option<String>,
    pub remaining_quantity: i64,
    /// Session after a skip counted the question.
    pub session: Option<StageProgress>,
}

/// Hint that never gives the answer away: a preview of the explanation, else
/// one wrong option, else encouragement.
pub fn hint_text<R: Rng + ?Sized>(question: &Question, preview_chars: usize, rng: &mut R) -> String {
    let explanation = question
        .answer
        .explanation
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    if let Some(explanation) = explanation {
        if explanation.chars().count() > preview_chars {
            let preview: String = explanation.chars().take(preview_chars).collect();
            return format!("{}...", preview);
        }
        return explanation.to_string();
    }

    if question.question_type.is_choice() {
        let wrong = question.wrong_option_ids();
        if let Some(&option_id) = wrong.choose(rng) {
            let text = question.option_text(option_id).unwrap_or(option_id);
            return format!("選項 {}「{}」不是正確答案", option_id, text);
        }
    }

    ENCOURAGEMENT.to_string()
}

pub struct ItemService {
    items: Arc<dyn ItemRepository>,
    users: Arc<dyn UserRepository>,
    questions: Arc<dyn QuestionRepository>,
    stages: Arc<dyn StageRepository>,
    progress: Arc<dyn StageProgressRepository>,
    rules: Arc<GameRules>,
}

impl ItemService {
    pub fn new(
        items: Arc<dyn ItemRepository>,
        users: Arc<dyn UserRepository>,
        questions: Arc<dyn QuestionRepository>,
        stages: Arc<dyn StageRepository>,
        progress: Arc<dyn StageProgressRepository>,
        rules: Arc<GameRules>,
    ) -> Self {
        Self {
            items,
            users,
            questions,
            stages,
            progress,
            rules,
        }
    }

    async fn load_item(&self, item_id: &str) -> AppResult<Item> {
        self.items
            .find_by_id(item_id)
            .await?
            .filter(|i| i.is_active)
            .ok_or_else(|| AppError::NotFound(format!("Item with id '{}' not found", item_id)))
    }

    async fn load_consumable(&self, item_id: &str) -> AppResult<Item> {
        let item = self.load_item(item_id).await?;
        if item.item_type != ItemType::Consumable {
            return Err(AppError::ValidationError(format!(
                "item '{}' is not a consumable",
                item.name
            )));
        }
        Ok(item)
    }

    pub fn grants_for(&self, item: &Item) -> Vec<EffectGrant> {
        item.timed_effects()
            .map(|effect| EffectGrant {
                effect_type: effect.effect_type,
                item_id: item.id.clone(),
                value: effect.value,
                duration: Duration::minutes(
                    effect
                        .duration_minutes
                        .filter(|m| *m > 0)
                        .unwrap_or(self.rules.effect_default_minutes),
                ),
            })
            .collect()
    }

    /// Spends one unit and starts or extends each timed effect on the item.
    pub async fn use_consumable(&self, player_id: &str, item_id: &str) -> AppResult<ConsumableUse> {
        load_student(self.users.as_ref(), player_id).await?;
        let item = self.load_consumable(item_id).await?;

        let grants = self.grants_for(&item);
        if grants.is_empty() {
            return Err(AppError::ValidationError(format!(
                "item '{}' can only be used during a quiz",
                item.name
            )));
        }

        let consumption = self
            .items
            .consume(player_id, &item.id, grants, None, Utc::now())
            .await?;

        log::info!(
            "player '{}' used '{}', {} left",
            player_id,
            item.id,
            consumption.remaining_quantity
        );
        Ok(ConsumableUse {
            item,
            applied_effects: consumption.effects,
            remaining_quantity: consumption.remaining_quantity,
        })
    }

    /// Resolves the skip side effect on a stage session. Counts the question
    /// as answered wrong, at most once.
    async fn skip_increment(
        &self,
        player_id: &str,
        stage_id: &str,
        question: &Question,
    ) -> AppResult<Option<SessionIncrement>> {
        let stage = self
            .stages
            .find_by_id(stage_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Stage with id '{}' not found", stage_id)))?;

        if !stage.contains(question) {
            return Err(AppError::ValidationError(format!(
                "question '{}' does not belong to stage '{}'",
                question.id, stage_id
            )));
        }

        let Some(progress) = self.progress.find(player_id, stage_id).await? else {
            return Ok(None);
        };

        let increment = SessionIncrement {
            student_id: player_id.to_string(),
            stage_id: stage_id.to_string(),
            session_id: progress.session_id.clone().unwrap_or_default(),
            question_id: question.id.clone(),
            correct: false,
            limit: stage.questions_per_session,
        };
        Ok(increment.applies_to(&progress).then_some(increment))
    }

    /// Hint or skip for the question on screen. The unit is spent whatever the outcome.
    pub async fn use_quiz_item(
        &self,
        player_id: &str,
        item_id: &str,
        question_id: &str,
        stage_id: Option<&str>,
    ) -> AppResult<QuizItemUse> {
        load_student(self.users.as_ref(), player_id).await?;
        let item = self.load_consumable(item_id).await?;

        let gives_hint = item.has_effect(EffectType::Hint);
        let gives_skip = item.has_effect(EffectType::Skip);
        if !gives_hint && !gives_skip {
            return Err(AppError::ValidationError(format!(
                "item '{}' cannot be used in a quiz",
                item.name
            )));
        }

        let question = self
            .questions
            .find_by_id(question_id)
            .await?
            .filter(|q| q.is_active)
            .ok_or_else(|| AppError::NotFound(format!("Question with id '{}' not found", question_id)))?;

        let increment = match (gives_skip, stage_id) {
            (true, Some(stage_id)) => self.skip_increment(player_id, stage_id, &question).await?,
            _ => None,
        };
        let counts_question = increment.is_some();

        let consumption = self
            .items
            .consume(player_id, &item.id, Vec::new(), increment, Utc::now())
            .await?;
        if counts_question && consumption.session.is_none() {
            log::debug!("skip on '{}' was not counted, session moved on", question.id);
        }

        let hint = gives_hint
            .then(|| hint_text(&question, self.rules.hint_preview_chars, &mut rand::thread_rng()));

        log::info!(
            "player '{}' used quiz item '{}' on '{}' (hint={}, skip={})",
            player_id,
            item.id,
            question.id,
            gives_hint,
            gives_skip
        );

        Ok(QuizItemUse {
            item_id: item.id,
            hint,
            skip: gives_skip,
            correct_answer: gives_skip.then(|| question.correct_answer_text()),
            remaining_quantity: consumption.remaining_quantity,
            session: consumption.session,
        })
    }

    pub async fn purchase(&self, player_id: &str, item_id: &str, quantity: i64) -> AppResult<PlayerItem> {
        if quantity < 1 {
            return Err(AppError::ValidationError("quantity must be at least 1".to_string()));
        }

        let (_, profile) = load_student(self.users.as_ref(), player_id).await?;
        let item = self.load_item(item_id).await?;

        let cost = item.price.checked_mul(quantity).ok_or_else(|| {
            AppError::ValidationError(format!("quantity {} is too large", quantity))
        })?;
        let charged = profile.spend_gold(cost)?;

        let owned = self
            .items
            .purchase(Purchase {
                player_id: player_id.to_string(),
                item_id: item.id.clone(),
                quantity,
                max_stack: item.max_stack,
                profile: ProfileWrite {
                    user_id: player_id.to_string(),
                    expected_version: profile.version,
                    profile: charged,
                },
            })
            .await?;

        log::info!(
            "player '{}' bought {} x '{}' for {} gold",
            player_id,
            quantity,
            item.id,
            cost
        );
        Ok(owned)
    }

    /// Puts an owned item into its slot and returns the updated profile.
    pub async fn equip(&self, player_id: &str, item_id: &str, slot: EquipSlot) -> AppResult<StudentProfile> {
        let (_, profile) = load_student(self.users.as_ref(), player_id).await?;
        let item = self.load_item(item_id).await?;

        if !item.is_equippable() || item.slot != Some(slot) {
            return Err(AppError::ValidationError(format!(
                "item '{}' cannot be equipped in that slot",
                item.name
            )));
        }

        let owned = self
            .items
            .find_player_item(player_id, &item.id)
            .await?
            .map(|p| p.quantity > 0)
            .unwrap_or(false);
        if !owned {
            return Err(AppError::ValidationError(format!(
                "item '{}' is not in the inventory",
                item.name
            )));
        }

        let next = profile.with_equipped(slot, Some(item.id.clone()));
        self.users
            .update_profile(ProfileWrite {
                user_id: player_id.to_string(),
                expected_version: profile.version,
                profile: next,
            })
            .await
    }
}
