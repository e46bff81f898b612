pub mod active_effect_repository;
pub mod classroom_repository;
pub mod item_repository;
pub mod question_attempt_repository;
pub mod question_repository;
pub mod settlement_repository;
pub mod stage_progress_repository;
pub mod stage_repository;
pub mod user_repository;

pub use active_effect_repository::{ActiveEffectRepository, MongoActiveEffectRepository};
pub use classroom_repository::{ClassroomRepository, MongoClassroomRepository};
pub use item_repository::{Consumption, ItemRepository, MongoItemRepository, Purchase};
pub use question_attempt_repository::{MongoQuestionAttemptRepository, QuestionAttemptRepository};
pub use question_repository::{MongoQuestionRepository, QuestionFilter, QuestionRepository};
pub use settlement_repository::{
    AnswerSettlement, MongoSettlementRepository, SessionSettlement, SettlementRepository,
};
pub use stage_progress_repository::{
    MongoStageProgressRepository, SessionIncrement, StageProgressRepository,
};
pub use stage_repository::{MongoStageRepository, StageRepository};
pub use user_repository::{MongoUserRepository, ProfileWrite, UserRepository};
