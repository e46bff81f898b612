#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use adventure_server::{
    app_state::{AppState, Repositories},
    config::{Config, GameRules},
    errors::{AppError, AppResult},
    models::domain::{
        item::{ItemEffect, Rarity},
        question::{AnswerSpec, CorrectAnswer, QuestionContent, QuestionOption, QuestionStats},
        stage::{RewardBundle, StageRewards},
        ActiveEffect, AttemptTotals, Classroom, Difficulty, EffectGrant, EffectType, EquipSlot,
        Item, ItemType, LeaderboardType, PlayerItem, Question, QuestionAttempt, QuestionType,
        RankKey, Stage, StageProgress, StudentProfile, UnlockCondition, User, UserRole,
    },
    repositories::{
        ActiveEffectRepository, AnswerSettlement, ClassroomRepository, Consumption, ItemRepository,
        ProfileWrite, Purchase, QuestionAttemptRepository, QuestionFilter, QuestionRepository,
        SessionIncrement, SessionSettlement, SettlementRepository, StageProgressRepository,
        StageRepository, UserRepository,
    },
    services::answer_service::MilestoneNotifier,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;

#[derive(Clone, Default)]
pub struct Tables {
    pub questions: Vec<Question>,
    pub stages: Vec<Stage>,
    pub progress: Vec<StageProgress>,
    pub attempts: Vec<QuestionAttempt>,
    pub users: Vec<User>,
    pub classrooms: Vec<Classroom>,
    pub items: Vec<Item>,
    pub player_items: Vec<PlayerItem>,
    pub effects: Vec<ActiveEffect>,
}

impl Tables {
    fn write_profile(&mut self, write: &ProfileWrite) -> AppResult<StudentProfile> {
        let user = self
            .users
            .iter_mut()
            .find(|u| {
                u.id == write.user_id
                    && u.profile.as_ref().map(|p| p.version) == Some(write.expected_version)
            })
            .ok_or_else(|| write.conflict())?;
        user.profile = Some(write.profile.clone());
        Ok(write.profile.clone())
    }

    fn advance(&mut self, increment: &SessionIncrement) -> Option<StageProgress> {
        let progress = self
            .progress
            .iter_mut()
            .find(|p| increment.applies_to(p))?;
        *progress = increment.apply(&*progress, Utc::now());
        Some(progress.clone())
    }

    fn ranked_students<'a>(
        &'a self,
        scope: Option<&'a [String]>,
    ) -> impl Iterator<Item = (&'a User, &'a StudentProfile)> + 'a {
        self.users.iter().filter_map(move |u| {
            let in_scope = scope.map(|ids| ids.contains(&u.id)).unwrap_or(true);
            match (&u.profile, u.role) {
                (Some(profile), UserRole::Student) if in_scope => Some((u, profile)),
                _ => None,
            }
        })
    }
}

/// Every repository trait over one shared set of tables. Multi-record writes
/// run on a draft that is committed only when the whole unit succeeds.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.tables.lock().unwrap())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        f(&mut self.tables.lock().unwrap())
    }

    fn transact<R>(&self, f: impl FnOnce(&mut Tables) -> AppResult<R>) -> AppResult<R> {
        let mut tables = self.tables.lock().unwrap();
        let mut draft = tables.clone();
        let result = f(&mut draft)?;
        *tables = draft;
        Ok(result)
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            questions: Arc::new(self.clone()),
            stages: Arc::new(self.clone()),
            progress: Arc::new(self.clone()),
            attempts: Arc::new(self.clone()),
            users: Arc::new(self.clone()),
            classrooms: Arc::new(self.clone()),
            items: Arc::new(self.clone()),
            effects: Arc::new(self.clone()),
            settlement: Arc::new(self.clone()),
        }
    }

    pub fn app_state(&self) -> AppState {
        self.app_state_with(GameRules::default())
    }

    pub fn app_state_with(&self, rules: GameRules) -> AppState {
        let mut config = Config::test_config();
        config.game = rules;
        AppState::from_repositories(self.repositories(), Arc::new(MilestoneNotifier), config)
    }

    pub fn profile(&self, user_id: &str) -> StudentProfile {
        self.read(|t| {
            t.users
                .iter()
                .find(|u| u.id == user_id)
                .and_then(|u| u.profile.clone())
                .expect("student with profile")
        })
    }

    pub fn progress(&self, student_id: &str, stage_id: &str) -> Option<StageProgress> {
        self.read(|t| {
            t.progress
                .iter()
                .find(|p| p.student_id == student_id && p.stage_id == stage_id)
                .cloned()
        })
    }

    pub fn quantity(&self, player_id: &str, item_id: &str) -> Option<i64> {
        self.read(|t| {
            t.player_items
                .iter()
                .find(|p| p.player_id == player_id && p.item_id == item_id)
                .map(|p| p.quantity)
        })
    }

    pub fn insert_question(&self, question: Question) {
        self.write(|t| t.questions.push(question));
    }

    pub fn insert_stage(&self, stage: Stage) {
        self.write(|t| t.stages.push(stage));
    }

    pub fn insert_user(&self, user: User) {
        self.write(|t| t.users.push(user));
    }

    pub fn insert_item(&self, item: Item) {
        self.write(|t| t.items.push(item));
    }

    pub fn insert_attempt(&self, attempt: QuestionAttempt) {
        self.write(|t| t.attempts.push(attempt));
    }

    pub fn insert_classroom(&self, classroom: Classroom) {
        self.write(|t| t.classrooms.push(classroom));
    }

    pub fn give_item(&self, player_id: &str, item_id: &str, quantity: i64) {
        self.write(|t| {
            t.player_items.push(PlayerItem {
                player_id: player_id.to_string(),
                item_id: item_id.to_string(),
                quantity,
                acquired_at: Utc::now(),
            })
        });
    }

    pub fn set_profile(&self, user_id: &str, edit: impl FnOnce(&mut StudentProfile)) {
        self.write(|t| {
            if let Some(profile) = t
                .users
                .iter_mut()
                .find(|u| u.id == user_id)
                .and_then(|u| u.profile.as_mut())
            {
                edit(profile);
            }
        });
    }
}

#[async_trait]
impl QuestionRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Question>> {
        Ok(self.read(|t| t.questions.iter().find(|q| q.id == id).cloned()))
    }

    async fn sample_active(&self, filter: QuestionFilter) -> AppResult<Option<Question>> {
        Ok(self.read(|t| {
            let pool: Vec<&Question> = t.questions.iter().filter(|q| filter.matches(q)).collect();
            pool.choose(&mut rand::thread_rng()).map(|q| (*q).clone())
        }))
    }

    async fn create(&self, question: Question) -> AppResult<Question> {
        question.validate()?;
        self.insert_question(question.clone());
        Ok(question)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl StageRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Stage>> {
        Ok(self.read(|t| t.stages.iter().find(|s| s.id == id && s.is_active).cloned()))
    }

    async fn find_previous(&self, order: i32) -> AppResult<Option<Stage>> {
        Ok(self.read(|t| {
            t.stages
                .iter()
                .filter(|s| s.is_active && s.order < order)
                .max_by_key(|s| s.order)
                .cloned()
        }))
    }

    async fn create(&self, stage: Stage) -> AppResult<Stage> {
        self.insert_stage(stage.clone());
        Ok(stage)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl StageProgressRepository for InMemoryStore {
    async fn find(&self, student_id: &str, stage_id: &str) -> AppResult<Option<StageProgress>> {
        Ok(self.progress(student_id, stage_id))
    }

    async fn start_session(
        &self,
        student_id: &str,
        stage_id: &str,
        session_id: &str,
    ) -> AppResult<StageProgress> {
        Ok(self.write(|t| {
            let now = Utc::now();
            match t
                .progress
                .iter_mut()
                .find(|p| p.student_id == student_id && p.stage_id == stage_id)
            {
                Some(existing) => {
                    *existing = existing.restarted(session_id, now);
                    existing.clone()
                }
                None => {
                    let fresh = StageProgress::new(student_id, stage_id).restarted(session_id, now);
                    t.progress.push(fresh.clone());
                    fresh
                }
            }
        }))
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl QuestionAttemptRepository for InMemoryStore {
    async fn totals_since(
        &self,
        since: DateTime<Utc>,
        student_ids: Option<Vec<String>>,
    ) -> AppResult<Vec<AttemptTotals>> {
        Ok(self.read(|t| {
            let mut totals: BTreeMap<String, AttemptTotals> = BTreeMap::new();
            for attempt in t.attempts.iter().filter(|a| a.created_at >= since) {
                if let Some(ids) = &student_ids {
                    if !ids.contains(&attempt.student_id) {
                        continue;
                    }
                }
                let entry = totals
                    .entry(attempt.student_id.clone())
                    .or_insert_with(|| AttemptTotals {
                        student_id: attempt.student_id.clone(),
                        ..Default::default()
                    });
                entry.exp += attempt.exp_gained;
                entry.gold += attempt.gold_gained;
                entry.attempts += 1;
                entry.corrects += i64::from(attempt.is_correct);
            }
            totals.into_values().collect()
        }))
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create(&self, user: User) -> AppResult<User> {
        self.insert_user(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.read(|t| t.users.iter().find(|u| u.id == id).cloned()))
    }

    async fn find_by_ids(&self, ids: Vec<String>) -> AppResult<Vec<User>> {
        Ok(self.read(|t| t.users.iter().filter(|u| ids.contains(&u.id)).cloned().collect()))
    }

    async fn update_profile(&self, write: ProfileWrite) -> AppResult<StudentProfile> {
        self.transact(|t| t.write_profile(&write))
    }

    async fn top_students(
        &self,
        scope: Option<Vec<String>>,
        kind: LeaderboardType,
        limit: i64,
    ) -> AppResult<Vec<User>> {
        Ok(self.read(|t| {
            let mut ranked: Vec<(RankKey, &User)> = t
                .ranked_students(scope.as_deref())
                .map(|(u, p)| (kind.profile_key(p), u))
                .collect();
            ranked.sort_by(|a, b| RankKey::descending(&a.0, &b.0));
            ranked
                .into_iter()
                .take(limit.max(0) as usize)
                .map(|(_, u)| u.clone())
                .collect()
        }))
    }

    async fn count_ranked_above(
        &self,
        scope: Option<Vec<String>>,
        kind: LeaderboardType,
        key: RankKey,
    ) -> AppResult<u64> {
        Ok(self.read(|t| {
            t.ranked_students(scope.as_deref())
                .filter(|(_, p)| kind.profile_key(p).beats(&key))
                .count() as u64
        }))
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ClassroomRepository for InMemoryStore {
    async fn create(&self, classroom: Classroom) -> AppResult<Classroom> {
        self.insert_classroom(classroom.clone());
        Ok(classroom)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Classroom>> {
        Ok(self.read(|t| t.classrooms.iter().find(|c| c.id == id).cloned()))
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ActiveEffectRepository for InMemoryStore {
    async fn find_active(&self, player_id: &str, now: DateTime<Utc>) -> AppResult<Vec<ActiveEffect>> {
        Ok(self.read(|t| {
            t.effects
                .iter()
                .filter(|e| e.player_id == player_id && e.is_active(now))
                .cloned()
                .collect()
        }))
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ItemRepository for InMemoryStore {
    async fn create(&self, item: Item) -> AppResult<Item> {
        self.insert_item(item.clone());
        Ok(item)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Item>> {
        Ok(self.read(|t| t.items.iter().find(|i| i.id == id).cloned()))
    }

    async fn find_by_ids(&self, ids: Vec<String>) -> AppResult<Vec<Item>> {
        Ok(self.read(|t| t.items.iter().filter(|i| ids.contains(&i.id)).cloned().collect()))
    }

    async fn find_player_item(&self, player_id: &str, item_id: &str) -> AppResult<Option<PlayerItem>> {
        Ok(self.read(|t| {
            t.player_items
                .iter()
                .find(|p| p.player_id == player_id && p.item_id == item_id)
                .cloned()
        }))
    }

    async fn list_player_items(&self, player_id: &str) -> AppResult<Vec<PlayerItem>> {
        Ok(self.read(|t| {
            t.player_items
                .iter()
                .filter(|p| p.player_id == player_id)
                .cloned()
                .collect()
        }))
    }

    async fn consume(
        &self,
        player_id: &str,
        item_id: &str,
        grants: Vec<EffectGrant>,
        session: Option<SessionIncrement>,
        now: DateTime<Utc>,
    ) -> AppResult<Consumption> {
        self.transact(|t| {
            let held = t
                .player_items
                .iter_mut()
                .find(|p| p.player_id == player_id && p.item_id == item_id && p.quantity >= 1)
                .ok_or_else(|| {
                    AppError::ValidationError(format!("item '{}' is not in the inventory", item_id))
                })?;
            held.quantity -= 1;
            let remaining = held.quantity;
            t.player_items.retain(|p| p.quantity > 0);

            let mut effects = Vec::with_capacity(grants.len());
            for grant in &grants {
                let position = t
                    .effects
                    .iter()
                    .position(|e| e.player_id == player_id && e.effect_type == grant.effect_type);
                let effect = grant.apply_to(player_id, position.map(|i| &t.effects[i]), now);
                match position {
                    Some(i) => t.effects[i] = effect.clone(),
                    None => t.effects.push(effect.clone()),
                }
                effects.push(effect);
            }

            let session = session.as_ref().and_then(|increment| t.advance(increment));

            Ok(Consumption {
                remaining_quantity: remaining.max(0),
                effects,
                session,
            })
        })
    }

    async fn purchase(&self, purchase: Purchase) -> AppResult<PlayerItem> {
        self.transact(|t| {
            t.write_profile(&purchase.profile)?;

            let held = t
                .player_items
                .iter()
                .find(|p| p.player_id == purchase.player_id && p.item_id == purchase.item_id)
                .map(|p| p.quantity)
                .unwrap_or(0);
            if held + purchase.quantity > purchase.max_stack {
                return Err(AppError::ValidationError(format!(
                    "item '{}' stacks to {}, already holding {}",
                    purchase.item_id, purchase.max_stack, held
                )));
            }

            match t
                .player_items
                .iter_mut()
                .find(|p| p.player_id == purchase.player_id && p.item_id == purchase.item_id)
            {
                Some(owned) => {
                    owned.quantity += purchase.quantity;
                    Ok(owned.clone())
                }
                None => {
                    let owned = PlayerItem {
                        player_id: purchase.player_id.clone(),
                        item_id: purchase.item_id.clone(),
                        quantity: purchase.quantity,
                        acquired_at: Utc::now(),
                    };
                    t.player_items.push(owned.clone());
                    Ok(owned)
                }
            }
        })
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl SettlementRepository for InMemoryStore {
    async fn settle_answer(&self, settlement: AnswerSettlement) -> AppResult<Option<StageProgress>> {
        self.transact(|t| {
            let attempt = settlement.attempt.clone();
            if let Some(question) = t.questions.iter_mut().find(|q| q.id == attempt.question_id) {
                question.stats = question.stats.record(attempt.is_correct, attempt.time_spent_seconds);
            }
            t.attempts.push(attempt);
            t.write_profile(&settlement.profile)?;

            match &settlement.session {
                Some(increment) => t.advance(increment).map(Some).ok_or_else(|| {
                    AppError::Conflict(format!(
                        "question '{}' was already counted or the session is closed",
                        increment.question_id
                    ))
                }),
                None => Ok(None),
            }
        })
    }

    async fn settle_session(&self, settlement: SessionSettlement) -> AppResult<StageProgress> {
        self.transact(|t| {
            let before = &settlement.before;
            let current = t
                .progress
                .iter_mut()
                .find(|p| {
                    p.student_id == before.student_id
                        && p.stage_id == before.stage_id
                        && p.is_in_session()
                        && p.session_id == before.session_id
                        && p.session_total == before.session_total
                        && p.session_correct == before.session_correct
                })
                .ok_or_else(|| {
                    AppError::Conflict(format!(
                        "session for stage '{}' is no longer in progress",
                        before.stage_id
                    ))
                })?;
            *current = settlement.after.clone();
            let closed = current.clone();

            if let Some(write) = &settlement.profile {
                t.write_profile(write)?;
            }
            Ok(closed)
        })
    }
}

// Fixtures

pub fn student(username: &str) -> User {
    User::new_student(username, &username.to_uppercase(), &GameRules::default())
}

pub fn teacher(username: &str) -> User {
    let mut user = student(username);
    user.role = UserRole::Teacher;
    user.profile = None;
    user
}

fn options(ids: &[&str]) -> Vec<QuestionOption> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| QuestionOption {
            id: id.to_string(),
            text: format!("option {}", i + 1),
        })
        .collect()
}

pub fn single_choice(id: &str, unit_id: &str, correct: &str) -> Question {
    Question {
        id: id.to_string(),
        subject: Some("math".to_string()),
        subject_id: Some("subject-math".to_string()),
        unit_id: Some(unit_id.to_string()),
        category_id: None,
        difficulty: Difficulty::Easy,
        question_type: QuestionType::SingleChoice,
        content: QuestionContent {
            text: format!("Question {}", id),
            image_url: None,
        },
        options: options(&["A", "B", "C", "D"]),
        answer: AnswerSpec {
            correct: CorrectAnswer::One(correct.to_string()),
            explanation: None,
        },
        base_exp: None,
        base_gold: None,
        stats: QuestionStats::default(),
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn multi_choice(id: &str, unit_id: &str, correct: &[&str]) -> Question {
    Question {
        question_type: QuestionType::MultipleChoice,
        answer: AnswerSpec {
            correct: CorrectAnswer::Many(correct.iter().map(|c| c.to_string()).collect()),
            explanation: Some("pick every prime".to_string()),
        },
        ..single_choice(id, unit_id, "A")
    }
}

pub fn stage(id: &str, unit_id: &str, questions_per_session: i64) -> Stage {
    Stage {
        id: id.to_string(),
        name: format!("Stage {}", id),
        order: 1,
        unit_ids: vec![unit_id.to_string()],
        difficulty: None,
        questions_per_session,
        unlock_condition: UnlockCondition::None,
        rewards: StageRewards {
            bonus_exp: 50,
            bonus_gold: 20,
            first_clear_bonus: Some(RewardBundle { exp: 100, gold: 40 }),
        },
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn consumable(id: &str, effects: Vec<ItemEffect>) -> Item {
    Item {
        id: id.to_string(),
        name: format!("Item {}", id),
        icon: None,
        item_type: ItemType::Consumable,
        rarity: Rarity::Common,
        effects,
        slot: None,
        price: 50,
        max_stack: 10,
        is_active: true,
    }
}

pub fn effect(effect_type: EffectType, value: f64, duration_minutes: Option<i64>) -> ItemEffect {
    ItemEffect {
        effect_type,
        value,
        duration_minutes,
    }
}

pub fn title(id: &str, name: &str) -> Item {
    Item {
        id: id.to_string(),
        name: name.to_string(),
        icon: Some(format!("{}.png", id)),
        item_type: ItemType::Cosmetic,
        rarity: Rarity::Epic,
        effects: Vec::new(),
        slot: Some(EquipSlot::Title),
        price: 0,
        max_stack: 1,
        is_active: true,
    }
}

pub fn attempt_at(student_id: &str, correct: bool, exp: i64, gold: i64, at: DateTime<Utc>) -> QuestionAttempt {
    let mut attempt = QuestionAttempt::new(
        student_id,
        "q-log",
        None,
        adventure_server::models::domain::SubmittedAnswer::One("A".to_string()),
        correct,
        5.0,
        (exp, gold),
    );
    attempt.created_at = at;
    attempt
}
