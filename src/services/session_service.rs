use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::GameRules,
    errors::{AppError, AppResult},
    models::domain::{
        user::ProfileChange, SessionResult, Stage, StageProgress, StudentProfile, UnlockCondition,
    },
    repositories::{
        ProfileWrite, SessionSettlement, SettlementRepository, StageProgressRepository,
        StageRepository, UserRepository,
    },
    services::load_student,
};

#[derive(Clone, Debug, PartialEq)]
pub struct SessionStart {
    pub stage: Stage,
    pub progress: StageProgress,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionCompletion {
    pub result: SessionResult,
    pub progress: StageProgress,
    pub profile: StudentProfile,
    pub levels_gained: i64,
}

/// Counts the client believes it reached. Only compared, never trusted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReportedCounts {
    pub correct_count: Option<i64>,
    pub total_count: Option<i64>,
}

pub struct SessionService {
    stages: Arc<dyn StageRepository>,
    progress: Arc<dyn StageProgressRepository>,
    users: Arc<dyn UserRepository>,
    settlement: Arc<dyn SettlementRepository>,
    rules: Arc<GameRules>,
}

impl SessionService {
    pub fn new(
        stages: Arc<dyn StageRepository>,
        progress: Arc<dyn StageProgressRepository>,
        users: Arc<dyn UserRepository>,
        settlement: Arc<dyn SettlementRepository>,
        rules: Arc<GameRules>,
    ) -> Self {
        Self {
            stages,
            progress,
            users,
            settlement,
            rules,
        }
    }

    async fn load_stage(&self, stage_id: &str) -> AppResult<Stage> {
        self.stages
            .find_by_id(stage_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Stage with id '{}' not found", stage_id)))
    }

    async fn has_cleared(&self, student_id: &str, stage_id: &str) -> AppResult<bool> {
        Ok(self
            .progress
            .find(student_id, stage_id)
            .await?
            .map(|p| p.is_completed)
            .unwrap_or(false))
    }

    /// `ValidationError` naming the unmet condition when the stage is locked.
    pub async fn ensure_unlocked(
        &self,
        student_id: &str,
        profile: &StudentProfile,
        stage: &Stage,
    ) -> AppResult<()> {
        let locked = match &stage.unlock_condition {
            UnlockCondition::None => None,
            UnlockCondition::Level { level } => {
                (profile.level < *level).then(|| format!("requires level {}", level))
            }
            UnlockCondition::Stage { stage_id } => (!self.has_cleared(student_id, stage_id).await?)
                .then(|| format!("requires clearing stage '{}'", stage_id)),
            UnlockCondition::PreviousStage => match self.stages.find_previous(stage.order).await? {
                Some(previous) => (!self.has_cleared(student_id, &previous.id).await?)
                    .then(|| format!("requires clearing stage '{}'", previous.name)),
                None => None,
            },
        };

        match locked {
            Some(reason) => Err(AppError::ValidationError(format!(
                "stage '{}' is locked: {}",
                stage.id, reason
            ))),
            None => Ok(()),
        }
    }

    /// Current progress, or a fresh `NotStarted` record if the stage was never played.
    pub async fn get_progress(&self, student_id: &str, stage_id: &str) -> AppResult<StageProgress> {
        let stage = self.load_stage(stage_id).await?;
        Ok(self
            .progress
            .find(student_id, &stage.id)
            .await?
            .unwrap_or_else(|| StageProgress::new(student_id, &stage.id)))
    }

    /// Opens a session. Legal from any state; replays reset the session counters only.
    pub async fn start_session(&self, student_id: &str, stage_id: &str) -> AppResult<SessionStart> {
        let stage = self.load_stage(stage_id).await?;
        let (_, profile) = load_student(self.users.as_ref(), student_id).await?;
        self.ensure_unlocked(student_id, &profile, &stage).await?;

        let session_id = Uuid::new_v4().to_string();
        let progress = self
            .progress
            .start_session(student_id, &stage.id, &session_id)
            .await?;

        log::info!(
            "student '{}' started session '{}' on stage '{}'",
            student_id,
            session_id,
            stage.id
        );
        Ok(SessionStart { stage, progress })
    }

    /// Closes the running session from the server-side counters. A second call
    /// for the same session is a `Conflict` and grants nothing.
    pub async fn complete_session(
        &self,
        student_id: &str,
        stage_id: &str,
        reported: ReportedCounts,
    ) -> AppResult<SessionCompletion> {
        let stage = self.load_stage(stage_id).await?;
        let (_, profile) = load_student(self.users.as_ref(), student_id).await?;

        let before = self
            .progress
            .find(student_id, &stage.id)
            .await?
            .ok_or_else(|| {
                AppError::Conflict(format!("no session in progress for stage '{}'", stage.id))
            })?;

        let result = before.evaluate_completion(&stage, self.rules.stage_pass_threshold)?;

        let reported_pair = (reported.correct_count, reported.total_count);
        if reported_pair != (None, None)
            && reported_pair != (Some(result.correct_count), Some(result.total_count))
        {
            log::warn!(
                "student '{}' reported {:?}/{:?} for stage '{}', server counted {}/{}",
                student_id,
                reported.correct_count,
                reported.total_count,
                stage.id,
                result.correct_count,
                result.total_count
            );
        }

        let after = before.completed(&result, Utc::now());

        let earned = result.rewards.exp > 0 || result.rewards.gold > 0;
        let (next_profile, levels_gained) = if earned {
            profile.apply(
                &ProfileChange {
                    exp: result.rewards.exp,
                    gold: result.rewards.gold,
                    answer: None,
                },
                &self.rules,
            )
        } else {
            (profile.clone(), 0)
        };

        let progress = self
            .settlement
            .settle_session(SessionSettlement {
                before,
                after,
                profile: earned.then(|| ProfileWrite {
                    user_id: student_id.to_string(),
                    expected_version: profile.version,
                    profile: next_profile.clone(),
                }),
            })
            .await?;

        log::info!(
            "student '{}' completed stage '{}' with {:.1}% (passed={}, first_clear={})",
            student_id,
            stage.id,
            result.correct_rate,
            result.is_passed,
            result.is_first_clear
        );

        Ok(SessionCompletion {
            result,
            progress,
            profile: next_profile,
            levels_gained,
        })
    }
}
