use std::sync::Arc;

use crate::{
    config::{Config, GameRules},
    db::Database,
    errors::{AppError, AppResult},
    repositories::{
        ActiveEffectRepository, ClassroomRepository, ItemRepository, MongoActiveEffectRepository,
        MongoClassroomRepository, MongoItemRepository, MongoQuestionAttemptRepository,
        MongoQuestionRepository, MongoSettlementRepository, MongoStageProgressRepository,
        MongoStageRepository, MongoUserRepository, QuestionAttemptRepository, QuestionRepository,
        SettlementRepository, StageProgressRepository, StageRepository, UserRepository,
    },
    services::{
        answer_service::{AchievementNotifier, AnswerService, MilestoneNotifier},
        item_service::ItemService,
        leaderboard_service::LeaderboardService,
        profile_service::ProfileService,
        question_selector::QuestionSelector,
        session_service::SessionService,
    },
};

/// Every storage seam the services depend on.
#[derive(Clone)]
pub struct Repositories {
    pub questions: Arc<dyn QuestionRepository>,
    pub stages: Arc<dyn StageRepository>,
    pub progress: Arc<dyn StageProgressRepository>,
    pub attempts: Arc<dyn QuestionAttemptRepository>,
    pub users: Arc<dyn UserRepository>,
    pub classrooms: Arc<dyn ClassroomRepository>,
    pub items: Arc<dyn ItemRepository>,
    pub effects: Arc<dyn ActiveEffectRepository>,
    pub settlement: Arc<dyn SettlementRepository>,
}

impl Repositories {
    pub fn mongo(db: &Database) -> Self {
        Self {
            questions: Arc::new(MongoQuestionRepository::new(db)),
            stages: Arc::new(MongoStageRepository::new(db)),
            progress: Arc::new(MongoStageProgressRepository::new(db)),
            attempts: Arc::new(MongoQuestionAttemptRepository::new(db)),
            users: Arc::new(MongoUserRepository::new(db)),
            classrooms: Arc::new(MongoClassroomRepository::new(db)),
            items: Arc::new(MongoItemRepository::new(db)),
            effects: Arc::new(MongoActiveEffectRepository::new(db)),
            settlement: Arc::new(MongoSettlementRepository::new(db)),
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        self.questions.ensure_indexes().await?;
        self.stages.ensure_indexes().await?;
        self.progress.ensure_indexes().await?;
        self.attempts.ensure_indexes().await?;
        self.users.ensure_indexes().await?;
        self.classrooms.ensure_indexes().await?;
        self.items.ensure_indexes().await?;
        self.effects.ensure_indexes().await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub question_selector: Arc<QuestionSelector>,
    pub answer_service: Arc<AnswerService>,
    pub session_service: Arc<SessionService>,
    pub item_service: Arc<ItemService>,
    pub leaderboard_service: Arc<LeaderboardService>,
    pub profile_service: Arc<ProfileService>,
    pub config: Arc<Config>,
    db: Option<Database>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let db = Database::connect(&config).await?;

        let repositories = Repositories::mongo(&db);
        repositories.ensure_indexes().await?;

        let mut state = Self::from_repositories(repositories, Arc::new(MilestoneNotifier), config);
        state.db = Some(db);
        Ok(state)
    }

    /// Wires the services over any set of repositories. No database is attached.
    pub fn from_repositories(
        repos: Repositories,
        notifier: Arc<dyn AchievementNotifier>,
        config: Config,
    ) -> Self {
        let rules: Arc<GameRules> = Arc::new(config.game.clone());

        let question_selector = Arc::new(QuestionSelector::new(
            repos.questions.clone(),
            repos.stages.clone(),
            repos.progress.clone(),
        ));
        let answer_service = Arc::new(AnswerService::new(
            repos.questions.clone(),
            repos.stages.clone(),
            repos.progress.clone(),
            repos.effects.clone(),
            repos.users.clone(),
            repos.settlement.clone(),
            notifier,
            rules.clone(),
        ));
        let session_service = Arc::new(SessionService::new(
            repos.stages.clone(),
            repos.progress.clone(),
            repos.users.clone(),
            repos.settlement.clone(),
            rules.clone(),
        ));
        let item_service = Arc::new(ItemService::new(
            repos.items.clone(),
            repos.users.clone(),
            repos.questions.clone(),
            repos.stages.clone(),
            repos.progress.clone(),
            rules.clone(),
        ));
        let leaderboard_service = Arc::new(LeaderboardService::new(
            repos.users.clone(),
            repos.attempts.clone(),
            repos.classrooms.clone(),
            repos.items.clone(),
            rules,
        ));
        let profile_service = Arc::new(ProfileService::new(repos.users, repos.items, repos.effects));

        Self {
            question_selector,
            answer_service,
            session_service,
            item_service,
            leaderboard_service,
            profile_service,
            config: Arc::new(config),
            db: None,
        }
    }

    pub async fn check_database(&self) -> AppResult<()> {
        match &self.db {
            Some(db) => db.health_check().await,
            None => Err(AppError::InternalError("no database attached".to_string())),
        }
    }
}
