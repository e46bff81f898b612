use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::timestamps;
use crate::models::domain::question::{Difficulty, Question};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnlockCondition {
    #[default]
    None,
    /// The stage immediately before this one (by `order`) must be completed.
    PreviousStage,
    Level { level: i64 },
    Stage { stage_id: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RewardBundle {
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub gold: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StageRewards {
    #[serde(default)]
    pub bonus_exp: i64,
    #[serde(default)]
    pub bonus_gold: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_clear_bonus: Option<RewardBundle>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Stage {
    pub id: String,
    pub name: String,
    /// Position on the map; `PreviousStage` unlocks refer to it.
    pub order: i32,
    pub unit_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    pub questions_per_session: i64,
    #[serde(default)]
    pub unlock_condition: UnlockCondition,
    #[serde(default)]
    pub rewards: StageRewards,
    pub is_active: bool,
    #[serde(with = "timestamps::required")]
    pub created_at: DateTime<Utc>,
}

impl Stage {
    /// A question belongs to a stage when it sits in one of the stage's units
    /// and matches the stage difficulty, if one is set.
    pub fn contains(&self, question: &Question) -> bool {
        let in_unit = question
            .unit_id
            .as_ref()
            .map(|unit| self.unit_ids.contains(unit))
            .unwrap_or(false);
        in_unit && self.difficulty.map(|d| d == question.difficulty).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::question::fixtures::choice_question;
    use crate::models::domain::stage_progress::fixtures::stage;
    use mongodb::bson;

    fn forest() -> Stage {
        stage("stage-1", 5)
    }

    #[test]
    fn stage_contains_questions_from_its_units() {
        let stage = forest();
        let mut question = choice_question("q-1", "A");
        assert!(stage.contains(&question));

        question.unit_id = Some("unit-9".into());
        assert!(!stage.contains(&question));

        question.unit_id = None;
        assert!(!stage.contains(&question));
    }

    #[test]
    fn stage_difficulty_narrows_membership() {
        let mut stage = forest();
        stage.difficulty = Some(Difficulty::Hard);

        let mut question = choice_question("q-1", "A");
        assert!(!stage.contains(&question));

        question.difficulty = Difficulty::Hard;
        assert!(stage.contains(&question));
    }

    #[test]
    fn stage_without_units_contains_nothing() {
        let mut stage = forest();
        stage.unit_ids.clear();
        assert!(!stage.contains(&choice_question("q-1", "A")));
    }

    #[test]
    fn unlock_conditions_are_tagged_by_type() {
        let level: UnlockCondition =
            serde_json::from_str(r#"{"type":"level","level":5}"#).expect("level condition");
        assert_eq!(level, UnlockCondition::Level { level: 5 });

        let stage: UnlockCondition =
            serde_json::from_str(r#"{"type":"stage","stage_id":"s-1"}"#).expect("stage condition");
        assert_eq!(stage, UnlockCondition::Stage { stage_id: "s-1".into() });

        let none: UnlockCondition = serde_json::from_str(r#"{"type":"none"}"#).expect("none");
        assert_eq!(none, UnlockCondition::None);
    }

    #[test]
    fn stage_document_defaults_missing_rewards() {
        let document = bson::doc! {
            "id": "stage-1",
            "name": "森林入口",
            "order": 1,
            "unit_ids": ["unit-1"],
            "questions_per_session": 5,
            "is_active": true,
            "created_at": bson::DateTime::now(),
        };

        let stage: Stage = bson::from_document(document).expect("stage parses");
        assert_eq!(stage.unlock_condition, UnlockCondition::None);
        assert_eq!(stage.rewards, StageRewards::default());
        assert!(stage.difficulty.is_none());
    }
}
