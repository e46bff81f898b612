use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::GameRules;
use crate::db::timestamps;
use crate::errors::{AppError, AppResult};
use crate::models::domain::item::EquipSlot;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Admin => "admin",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EquippedItems {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_frame: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armor: Option<String>,
}

impl EquippedItems {
    pub fn set(&mut self, slot: EquipSlot, item_id: Option<String>) {
        match slot {
            EquipSlot::Title => self.title = item_id,
            EquipSlot::AvatarFrame => self.avatar_frame = item_id,
            EquipSlot::Weapon => self.weapon = item_id,
            EquipSlot::Armor => self.armor = item_id,
        }
    }
}

/// Denormalised running totals. `version` is bumped on every write and used
/// as the compare-and-swap guard.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StudentProfile {
    pub level: i64,
    /// Progress inside the current level.
    pub exp: i64,
    pub exp_to_next_level: i64,
    /// Lifetime experience, used by the all-time exp leaderboard.
    #[serde(default)]
    pub total_exp: i64,
    pub gold: i64,
    #[serde(default)]
    pub correct_rate: f64,
    #[serde(default)]
    pub total_questions_answered: i64,
    #[serde(default)]
    pub total_correct: i64,
    #[serde(default)]
    pub current_streak: i64,
    #[serde(default)]
    pub best_streak: i64,
    #[serde(default)]
    pub equipped_items: EquippedItems,
    #[serde(default)]
    pub version: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    /// A shield keeps the streak alive through a wrong answer.
    pub shielded: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProfileChange {
    pub exp: i64,
    pub gold: i64,
    pub answer: Option<AnswerOutcome>,
}

/// Threshold for leaving `level`: the base amount grown by the configured
/// percentage once per level already gained.
pub fn exp_threshold(level: i64, rules: &GameRules) -> i64 {
    (1..level.max(1)).fold(rules.level_base_exp, |threshold, _| {
        (threshold * rules.level_growth_percent / 100).max(1)
    })
}

impl StudentProfile {
    pub fn new(rules: &GameRules) -> Self {
        StudentProfile {
            level: 1,
            exp: 0,
            exp_to_next_level: exp_threshold(1, rules),
            total_exp: 0,
            gold: 0,
            correct_rate: 0.0,
            total_questions_answered: 0,
            total_correct: 0,
            current_streak: 0,
            best_streak: 0,
            equipped_items: EquippedItems::default(),
            version: 0,
        }
    }

    /// Returns the next profile version and how many levels were gained.
    pub fn apply(&self, change: &ProfileChange, rules: &GameRules) -> (StudentProfile, i64) {
        let mut next = self.clone();
        next.version += 1;
        next.gold += change.gold.max(0);

        if let Some(answer) = change.answer {
            next.total_questions_answered += 1;
            if answer.is_correct {
                next.total_correct += 1;
                next.current_streak += 1;
                next.best_streak = next.best_streak.max(next.current_streak);
            } else if !answer.shielded {
                next.current_streak = 0;
            }
            next.correct_rate =
                next.total_correct as f64 / next.total_questions_answered as f64 * 100.0;
        }

        let gained = change.exp.max(0);
        next.total_exp += gained;
        next.exp += gained;

        let mut levels = 0;
        while next.exp >= next.exp_to_next_level {
            next.exp -= next.exp_to_next_level;
            next.level += 1;
            levels += 1;
            next.exp_to_next_level = exp_threshold(next.level, rules);
        }

        (next, levels)
    }

    pub fn spend_gold(&self, amount: i64) -> AppResult<StudentProfile> {
        if amount > self.gold {
            return Err(AppError::ValidationError(format!(
                "insufficient gold: need {}, have {}",
                amount, self.gold
            )));
        }
        let mut next = self.clone();
        next.gold -= amount;
        next.version += 1;
        Ok(next)
    }

    pub fn with_equipped(&self, slot: EquipSlot, item_id: Option<String>) -> StudentProfile {
        let mut next = self.clone();
        next.equipped_items.set(slot, item_id);
        next.version += 1;
        next
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<StudentProfile>,
    #[serde(with = "timestamps::required")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new_student(username: &str, display_name: &str, rules: &GameRules) -> Self {
        User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            role: UserRole::Student,
            profile: Some(StudentProfile::new(rules)),
            created_at: Utc::now(),
        }
    }
}
