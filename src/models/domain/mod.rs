pub mod active_effect;
pub mod answer;
pub mod classroom;
pub mod item;
pub mod leaderboard;
pub mod question;
pub mod question_attempt;
pub mod stage;
pub mod stage_progress;
pub mod user;

pub use active_effect::{ActiveEffect, EffectGrant, EffectSnapshot};
pub use answer::{AnswerKey, SubmittedAnswer};
pub use classroom::Classroom;
pub use item::{EffectType, EquipSlot, Item, ItemType, PlayerItem};
pub use leaderboard::{LeaderboardPeriod, LeaderboardType, RankKey};
pub use question::{Difficulty, Question, QuestionType};
pub use question_attempt::{AttemptTotals, QuestionAttempt};
pub use stage::{Stage, UnlockCondition};
pub use stage_progress::{SessionResult, SessionStatus, StageProgress};
pub use user::{StudentProfile, User, UserRole};
