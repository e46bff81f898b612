use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    config::GameRules,
    errors::{AppError, AppResult},
    models::domain::{
        question::CorrectAnswer,
        stage::RewardBundle,
        user::{AnswerOutcome, ProfileChange},
        AnswerKey, EffectSnapshot, Question, QuestionAttempt, StageProgress, StudentProfile,
        SubmittedAnswer,
    },
    repositories::{
        ActiveEffectRepository, AnswerSettlement, ProfileWrite, QuestionRepository,
        SessionIncrement, SettlementRepository, StageProgressRepository, StageRepository,
        UserRepository,
    },
    services::{load_student, reward_calculator::RewardCalculator},
};

#[derive(Clone, Debug, PartialEq)]
pub struct AnswerSubmission {
    pub question_id: String,
    pub answer: SubmittedAnswer,
    pub time_spent_seconds: f64,
    /// Set when the answer belongs to a stage session.
    pub stage_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnswerReceipt {
    pub is_correct: bool,
    pub correct_answer: CorrectAnswer,
    pub explanation: Option<String>,
    pub rewards: RewardBundle,
    pub levels_gained: i64,
    pub profile: StudentProfile,
    pub session: Option<StageProgress>,
    pub achievements: Vec<String>,
}

/// What the achievement subsystem is told after an answer has been settled.
#[derive(Clone, Debug, PartialEq)]
pub struct AnswerEvent {
    pub student_id: String,
    pub question_id: String,
    pub is_correct: bool,
    pub current_streak: i64,
    pub level: i64,
    pub levels_gained: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AchievementNotifier: Send + Sync {
    /// Names of achievements unlocked by this answer.
    async fn answer_settled(&self, event: &AnswerEvent) -> AppResult<Vec<String>>;
}

/// Reports streak and level milestones.
pub struct MilestoneNotifier;

impl MilestoneNotifier {
    const STREAKS: [i64; 4] = [5, 10, 20, 50];
}

#[async_trait]
impl AchievementNotifier for MilestoneNotifier {
    async fn answer_settled(&self, event: &AnswerEvent) -> AppResult<Vec<String>> {
        let mut unlocked = Vec::new();
        if event.is_correct && Self::STREAKS.contains(&event.current_streak) {
            unlocked.push(format!("streak_{}", event.current_streak));
        }
        if event.levels_gained > 0 {
            unlocked.push(format!("level_{}", event.level));
        }
        if !unlocked.is_empty() {
            log::info!("student '{}' unlocked {:?}", event.student_id, unlocked);
        }
        Ok(unlocked)
    }
}

pub struct AnswerService {
    questions: Arc<dyn QuestionRepository>,
    stages: Arc<dyn StageRepository>,
    progress: Arc<dyn StageProgressRepository>,
    effects: Arc<dyn ActiveEffectRepository>,
    users: Arc<dyn UserRepository>,
    settlement: Arc<dyn SettlementRepository>,
    notifier: Arc<dyn AchievementNotifier>,
    rules: Arc<GameRules>,
}

impl AnswerService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        stages: Arc<dyn StageRepository>,
        progress: Arc<dyn StageProgressRepository>,
        effects: Arc<dyn ActiveEffectRepository>,
        users: Arc<dyn UserRepository>,
        settlement: Arc<dyn SettlementRepository>,
        notifier: Arc<dyn AchievementNotifier>,
        rules: Arc<GameRules>,
    ) -> Self {
        Self {
            questions,
            stages,
            progress,
            effects,
            users,
            settlement,
            notifier,
            rules,
        }
    }

    async fn load_question(&self, question_id: &str) -> AppResult<Question> {
        self.questions
            .find_by_id(question_id)
            .await?
            .filter(|q| q.is_active)
            .ok_or_else(|| AppError::NotFound(format!("Question with id '{}' not found", question_id)))
    }

    /// Resolves the session counter update for a stage-mode answer.
    async fn session_increment(
        &self,
        student_id: &str,
        stage_id: &str,
        question: &Question,
        is_correct: bool,
    ) -> AppResult<SessionIncrement> {
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

        let progress = self
            .progress
            .find(student_id, stage_id)
            .await?
            .filter(StageProgress::is_in_session)
            .ok_or_else(|| {
                AppError::Conflict(format!("no session in progress for stage '{}'", stage_id))
            })?;

        let increment = SessionIncrement {
            student_id: student_id.to_string(),
            stage_id: stage_id.to_string(),
            session_id: progress.session_id.clone().unwrap_or_default(),
            question_id: question.id.clone(),
            correct: is_correct,
            limit: stage.questions_per_session,
        };

        if !increment.applies_to(&progress) {
            return Err(AppError::Conflict(format!(
                "question '{}' was already counted or the session is full",
                question.id
            )));
        }
        Ok(increment)
    }

    /// Grades an answer and settles its rewards, attempt log, question stats
    /// and session counters in one unit.
    pub async fn submit(&self, student_id: &str, submission: AnswerSubmission) -> AppResult<AnswerReceipt> {
        if submission.answer.is_blank() {
            return Err(AppError::ValidationError("answer is required".to_string()));
        }

        let (_, profile) = load_student(self.users.as_ref(), student_id).await?;
        let question = self.load_question(&submission.question_id).await?;
        let is_correct = AnswerKey::for_question(&question)?.matches(&submission.answer);

        let session = match &submission.stage_id {
            Some(stage_id) => Some(
                self.session_increment(student_id, stage_id, &question, is_correct)
                    .await?,
            ),
            None => None,
        };

        let now = Utc::now();
        let active = self.effects.find_active(student_id, now).await?;
        let snapshot = EffectSnapshot::from_effects(&active, now);
        let rewards = RewardCalculator::compute(&question, is_correct, &snapshot);

        let change = ProfileChange {
            exp: rewards.exp,
            gold: rewards.gold,
            answer: Some(AnswerOutcome {
                is_correct,
                shielded: snapshot.shield,
            }),
        };
        let (next_profile, levels_gained) = profile.apply(&change, &self.rules);

        let attempt = QuestionAttempt::new(
            student_id,
            &question.id,
            submission.stage_id.as_deref(),
            submission.answer,
            is_correct,
            submission.time_spent_seconds,
            (rewards.exp, rewards.gold),
        );

        let session = self
            .settlement
            .settle_answer(AnswerSettlement {
                attempt,
                profile: ProfileWrite {
                    user_id: student_id.to_string(),
                    expected_version: profile.version,
                    profile: next_profile.clone(),
                },
                session,
            })
            .await?;

        log::debug!(
            "student '{}' answered '{}' correct={} exp={} gold={}",
            student_id,
            question.id,
            is_correct,
            rewards.exp,
            rewards.gold
        );
        if levels_gained > 0 {
            log::info!(
                "student '{}' levelled up to {} (+{})",
                student_id,
                next_profile.level,
                levels_gained
            );
        }

        let event = AnswerEvent {
            student_id: student_id.to_string(),
            question_id: question.id.clone(),
            is_correct,
            current_streak: next_profile.current_streak,
            level: next_profile.level,
            levels_gained,
        };
        let achievements = match self.notifier.answer_settled(&event).await {
            Ok(unlocked) => unlocked,
            Err(err) => {
                log::warn!("achievement notification failed for '{}': {}", student_id, err);
                Vec::new()
            }
        };

        Ok(AnswerReceipt {
            is_correct,
            correct_answer: question.answer.correct,
            explanation: question.answer.explanation,
            rewards,
            levels_gained,
            profile: next_profile,
            session,
            achievements,
        })
    }
}
