use std::sync::Arc;

use crate::{
    errors::{AppError, AppResult},
    models::domain::{Question, Stage, StageProgress},
    repositories::{QuestionFilter, QuestionRepository, StageProgressRepository, StageRepository},
};

/// A question drawn for a stage together with the caller's running session.
#[derive(Clone, Debug, PartialEq)]
pub struct StageQuestion {
    pub question: Question,
    pub stage: Stage,
    pub progress: StageProgress,
}

pub struct QuestionSelector {
    questions: Arc<dyn QuestionRepository>,
    stages: Arc<dyn StageRepository>,
    progress: Arc<dyn StageProgressRepository>,
}

impl QuestionSelector {
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        stages: Arc<dyn StageRepository>,
        progress: Arc<dyn StageProgressRepository>,
    ) -> Self {
        Self {
            questions,
            stages,
            progress,
        }
    }

    pub fn stage_filter(stage: &Stage) -> QuestionFilter {
        QuestionFilter {
            unit_ids: stage.unit_ids.clone(),
            difficulty: stage.difficulty,
            ..Default::default()
        }
    }

    /// Random question from the pool, `NotFound` when the pool is empty.
    pub async fn select(&self, filter: QuestionFilter) -> AppResult<Question> {
        self.questions
            .sample_active(filter)
            .await?
            .ok_or_else(|| AppError::NotFound("no question available".to_string()))
    }

    /// Draws the next question for a stage. Questions already counted in the
    /// running session are skipped while any other candidate remains.
    pub async fn select_for_stage(&self, student_id: &str, stage_id: &str) -> AppResult<StageQuestion> {
        let stage = self
            .stages
            .find_by_id(stage_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Stage with id '{}' not found", stage_id)))?;

        // An empty unit list would leave the filter unrestricted.
        if stage.unit_ids.is_empty() {
            log::warn!("stage '{}' has no units configured", stage_id);
            return Err(AppError::NotFound("no question available".to_string()));
        }

        let progress = self
            .progress
            .find(student_id, stage_id)
            .await?
            .unwrap_or_else(|| StageProgress::new(student_id, stage_id));

        let mut filter = Self::stage_filter(&stage);
        if progress.is_in_session() {
            filter.exclude_ids = progress.answered_question_ids.clone();
        }

        let fresh = self.questions.sample_active(filter.clone()).await?;
        let question = match fresh {
            Some(question) => question,
            None if !filter.exclude_ids.is_empty() => {
                log::debug!(
                    "stage '{}' pool exhausted for student '{}', allowing repeats",
                    stage_id,
                    student_id
                );
                self.select(filter.without_exclusions()).await?
            }
            None => return Err(AppError::NotFound("no question available".to_string())),
        };

        Ok(StageQuestion {
            question,
            stage,
            progress,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::question::fixtures::choice_question;
    use crate::models::domain::stage_progress::fixtures::{in_session, stage};
    use crate::repositories::question_repository::MockQuestionRepository;
    use crate::repositories::stage_progress_repository::MockStageProgressRepository;
    use crate::repositories::stage_repository::MockStageRepository;

    fn selector(
        questions: MockQuestionRepository,
        stages: MockStageRepository,
        progress: MockStageProgressRepository,
    ) -> QuestionSelector {
        QuestionSelector::new(Arc::new(questions), Arc::new(stages), Arc::new(progress))
    }

    #[tokio::test]
    async fn unknown_stage_is_not_found() {
        let mut stages = MockStageRepository::new();
        stages.expect_find_by_id().returning(|_| Ok(None));

        let result = selector(
            MockQuestionRepository::new(),
            stages,
            MockStageProgressRepository::new(),
        )
        .select_for_stage("student-1", "missing")
        .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn answered_questions_are_excluded_then_allowed_when_exhausted() {
        let mut stages = MockStageRepository::new();
        stages
            .expect_find_by_id()
            .withf(|id| id == "stage-1")
            .returning(|_| Ok(Some(stage("stage-1", 5))));

        let mut progress = MockStageProgressRepository::new();
        progress.expect_find().returning(|_, _| {
            let mut running = in_session(1, 1);
            running.answered_question_ids = vec!["q-1".to_string()];
            Ok(Some(running))
        });

        let mut questions = MockQuestionRepository::new();
        questions
            .expect_sample_active()
            .withf(|f| f.exclude_ids == vec!["q-1".to_string()])
            .times(1)
            .returning(|_| Ok(None));
        questions
            .expect_sample_active()
            .withf(|f| f.exclude_ids.is_empty() && f.unit_ids == vec!["unit-1".to_string()])
            .times(1)
            .returning(|_| Ok(Some(choice_question("q-1", "A"))));

        let drawn = selector(questions, stages, progress)
            .select_for_stage("student-1", "stage-1")
            .await
            .expect("falls back to repeats");

        assert_eq!(drawn.question.id, "q-1");
        assert_eq!(drawn.progress.session_total, 1);
        assert_eq!(drawn.stage.questions_per_session, 5);
    }

    #[tokio::test]
    async fn stage_without_units_never_samples_the_whole_bank() {
        let mut stages = MockStageRepository::new();
        stages.expect_find_by_id().returning(|id| {
            let mut empty = stage(id, 5);
            empty.unit_ids.clear();
            Ok(Some(empty))
        });
        let mut questions = MockQuestionRepository::new();
        questions.expect_sample_active().times(0);

        let result = selector(questions, stages, MockStageProgressRepository::new())
            .select_for_stage("student-1", "stage-empty")
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn empty_pool_is_not_found() {
        let mut questions = MockQuestionRepository::new();
        questions.expect_sample_active().returning(|_| Ok(None));

        let result = selector(
            questions,
            MockStageRepository::new(),
            MockStageProgressRepository::new(),
        )
        .select(QuestionFilter::default())
        .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
