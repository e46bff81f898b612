use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::domain::{
    question::{CorrectAnswer, QuestionOption},
    stage::RewardBundle,
    user::EquippedItems,
    ActiveEffect, LeaderboardPeriod, LeaderboardType, PlayerItem, Question, Stage, StageProgress,
    StudentProfile, User,
};
use crate::services::answer_service::AnswerReceipt;
use crate::services::item_service::{ConsumableUse, QuizItemUse};
use crate::services::leaderboard_service::{Leaderboard, LeaderboardEntry, TitleBadge};
use crate::services::question_selector::StageQuestion;
use crate::services::session_service::{SessionCompletion, SessionStart};

#[derive(Debug, Clone, Serialize)]
pub struct OptionDto {
    pub id: String,
    pub text: String,
}

impl From<QuestionOption> for OptionDto {
    fn from(option: QuestionOption) -> Self {
        OptionDto {
            id: option.id,
            text: option.text,
        }
    }
}

/// A question as shown to a student. The answer never leaves the server here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDto {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    pub difficulty: &'static str,
    #[serde(rename = "type")]
    pub question_type: &'static str,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub options: Vec<OptionDto>,
    pub base_exp: i64,
    pub base_gold: i64,
}

impl From<Question> for QuestionDto {
    fn from(question: Question) -> Self {
        let (base_exp, base_gold) = question.base_rewards();
        QuestionDto {
            id: question.id,
            subject_id: question.subject_id,
            unit_id: question.unit_id,
            difficulty: question.difficulty.as_str(),
            question_type: question.question_type.as_str(),
            text: question.content.text,
            image_url: question.content.image_url,
            options: question.options.into_iter().map(OptionDto::from).collect(),
            base_exp,
            base_gold,
        }
    }
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct StageProgressDto {
    pub stage_id: String,
    pub status: String,
    pub session_correct: i64,
    pub session_total: i64,
    pub best_score: f64,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub total_attempts: i64,
}

impl From<StageProgress> for StageProgressDto {
    fn from(progress: StageProgress) -> Self {
        StageProgressDto {
            stage_id: progress.stage_id,
            status: progress.status.as_str().to_string(),
            session_correct: progress.session_correct,
            session_total: progress.session_total,
            best_score: progress.best_score,
            is_completed: progress.is_completed,
            completed_at: progress.completed_at,
            total_attempts: progress.total_attempts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgressDto {
    pub session_correct: i64,
    pub session_total: i64,
    pub questions_per_session: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageQuestionResponse {
    pub stage_id: String,
    pub stage_name: String,
    pub question: QuestionDto,
    pub session_progress: SessionProgressDto,
}

impl From<StageQuestion> for StageQuestionResponse {
    fn from(selected: StageQuestion) -> Self {
        StageQuestionResponse {
            session_progress: SessionProgressDto {
                session_correct: selected.progress.session_correct,
                session_total: selected.progress.session_total,
                questions_per_session: selected.stage.questions_per_session,
            },
            stage_id: selected.stage.id,
            stage_name: selected.stage.name,
            question: selected.question.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
pub struct RewardDto {
    pub exp: i64,
    pub gold: i64,
}

impl From<RewardBundle> for RewardDto {
    fn from(bundle: RewardBundle) -> Self {
        RewardDto {
            exp: bundle.exp,
            gold: bundle.gold,
        }
    }
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct EquippedDto {
    pub title: Option<String>,
    pub avatar_frame: Option<String>,
    pub weapon: Option<String>,
    pub armor: Option<String>,
}

impl From<EquippedItems> for EquippedDto {
    fn from(items: EquippedItems) -> Self {
        EquippedDto {
            title: items.title,
            avatar_frame: items.avatar_frame,
            weapon: items.weapon,
            armor: items.armor,
        }
    }
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub level: i64,
    pub exp: i64,
    pub exp_to_next_level: i64,
    pub total_exp: i64,
    pub gold: i64,
    pub correct_rate: f64,
    pub total_questions_answered: i64,
    pub total_correct: i64,
    pub current_streak: i64,
    pub best_streak: i64,
    pub equipped_items: EquippedDto,
}

impl From<StudentProfile> for ProfileDto {
    fn from(profile: StudentProfile) -> Self {
        ProfileDto {
            level: profile.level,
            exp: profile.exp,
            exp_to_next_level: profile.exp_to_next_level,
            total_exp: profile.total_exp,
            gold: profile.gold,
            correct_rate: profile.correct_rate,
            total_questions_answered: profile.total_questions_answered,
            total_correct: profile.total_correct,
            current_streak: profile.current_streak,
            best_streak: profile.best_streak,
            equipped_items: profile.equipped_items.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct MeDto {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub profile: Option<ProfileDto>,
}

impl From<User> for MeDto {
    fn from(user: User) -> Self {
        MeDto {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            role: user.role.as_str().to_string(),
            profile: user.profile.map(ProfileDto::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub is_correct: bool,
    pub correct_answer: CorrectAnswer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub rewards: RewardDto,
    pub level_up: bool,
    pub levels_gained: i64,
    pub profile: ProfileDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<StageProgressDto>,
    pub achievements: Vec<String>,
}

impl From<AnswerReceipt> for AnswerResponse {
    fn from(receipt: AnswerReceipt) -> Self {
        AnswerResponse {
            is_correct: receipt.is_correct,
            correct_answer: receipt.correct_answer,
            explanation: receipt.explanation,
            rewards: receipt.rewards.into(),
            level_up: receipt.levels_gained > 0,
            levels_gained: receipt.levels_gained,
            profile: receipt.profile.into(),
            session: receipt.session.map(StageProgressDto::from),
            achievements: receipt.achievements,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartResponse {
    pub stage_id: String,
    pub stage_name: String,
    pub questions_per_session: i64,
    pub session_id: Option<String>,
    pub progress: StageProgressDto,
}

impl From<SessionStart> for SessionStartResponse {
    fn from(start: SessionStart) -> Self {
        let Stage {
            id,
            name,
            questions_per_session,
            ..
        } = start.stage;
        SessionStartResponse {
            stage_id: id,
            stage_name: name,
            questions_per_session,
            session_id: start.progress.session_id.clone(),
            progress: start.progress.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCompleteResponse {
    pub correct_count: i64,
    pub total_count: i64,
    pub correct_rate: f64,
    pub is_passed: bool,
    pub is_first_clear: bool,
    pub rewards: RewardDto,
    pub levels_gained: i64,
    pub profile: ProfileDto,
    pub progress: StageProgressDto,
}

impl From<SessionCompletion> for SessionCompleteResponse {
    fn from(completion: SessionCompletion) -> Self {
        let result = completion.result;
        SessionCompleteResponse {
            correct_count: result.correct_count,
            total_count: result.total_count,
            correct_rate: result.correct_rate,
            is_passed: result.is_passed,
            is_first_clear: result.is_first_clear,
            rewards: result.rewards.into(),
            levels_gained: completion.levels_gained,
            profile: completion.profile.into(),
            progress: completion.progress.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectDto {
    pub effect_type: &'static str,
    pub item_id: String,
    pub value: f64,
    pub expires_at: DateTime<Utc>,
}

impl From<ActiveEffect> for EffectDto {
    fn from(effect: ActiveEffect) -> Self {
        EffectDto {
            effect_type: effect.effect_type.as_str(),
            item_id: effect.item_id,
            value: effect.value,
            expires_at: effect.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumableUseResponse {
    pub item_id: String,
    pub item_name: String,
    pub applied_effects: Vec<EffectDto>,
    pub remaining_quantity: i64,
}

impl From<ConsumableUse> for ConsumableUseResponse {
    fn from(used: ConsumableUse) -> Self {
        ConsumableUseResponse {
            item_id: used.item.id,
            item_name: used.item.name,
            applied_effects: used.applied_effects.into_iter().map(EffectDto::from).collect(),
            remaining_quantity: used.remaining_quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizItemResponse {
    pub item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub skip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    pub remaining_quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<StageProgressDto>,
}

impl From<QuizItemUse> for QuizItemResponse {
    fn from(used: QuizItemUse) -> Self {
        QuizItemResponse {
            item_id: used.item_id,
            hint: used.hint,
            skip: used.skip,
            correct_answer: used.correct_answer,
            remaining_quantity: used.remaining_quantity,
            session: used.session.map(StageProgressDto::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItemDto {
    pub item_id: String,
    pub quantity: i64,
    pub acquired_at: DateTime<Utc>,
}

impl From<PlayerItem> for InventoryItemDto {
    fn from(item: PlayerItem) -> Self {
        InventoryItemDto {
            item_id: item.item_id,
            quantity: item.quantity,
            acquired_at: item.acquired_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct TitleDto {
    pub item_id: String,
    pub name: String,
    pub icon: Option<String>,
    pub rarity: String,
}

impl From<TitleBadge> for TitleDto {
    fn from(badge: TitleBadge) -> Self {
        TitleDto {
            item_id: badge.item_id,
            name: badge.name,
            icon: badge.icon,
            rarity: badge.rarity.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntryDto {
    pub rank: i64,
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub level: i64,
    pub value: f64,
    pub title: Option<TitleDto>,
}

impl From<LeaderboardEntry> for LeaderboardEntryDto {
    fn from(entry: LeaderboardEntry) -> Self {
        LeaderboardEntryDto {
            rank: entry.rank,
            user_id: entry.user_id,
            username: entry.username,
            display_name: entry.display_name,
            level: entry.level,
            value: entry.value,
            title: entry.title.map(TitleDto::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardDto {
    #[serde(rename = "type")]
    #[graphql(name = "type")]
    pub kind: LeaderboardType,
    pub period: LeaderboardPeriod,
    pub leaderboard: Vec<LeaderboardEntryDto>,
    pub current_user: Option<LeaderboardEntryDto>,
}

impl From<Leaderboard> for LeaderboardDto {
    fn from(board: Leaderboard) -> Self {
        LeaderboardDto {
            kind: board.kind,
            period: board.period,
            leaderboard: board.entries.into_iter().map(LeaderboardEntryDto::from).collect(),
            current_user: board.current_user.map(LeaderboardEntryDto::from),
        }
    }
}

#[derive(Debug, Serialize, SimpleObject)]
pub struct ApiResponse<T: async_graphql::OutputType> {
    pub data: T,
    pub message: String,
}

pub type PurchaseResponse = ApiResponse<InventoryItemDto>;
pub type EquipResponse = ApiResponse<ProfileDto>;
