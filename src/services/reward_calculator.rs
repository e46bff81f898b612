use crate::models::domain::{stage::RewardBundle, EffectSnapshot, Question};

pub struct RewardCalculator;

impl RewardCalculator {
    /// Exp and gold granted for one answer. Wrong answers earn nothing.
    pub fn compute(question: &Question, is_correct: bool, effects: &EffectSnapshot) -> RewardBundle {
        if !is_correct {
            return RewardBundle::default();
        }

        let (exp, gold) = question.base_rewards();
        RewardBundle {
            exp: Self::scale(exp, effects.exp_multiplier),
            gold: Self::scale(gold, effects.gold_multiplier),
        }
    }

    /// Applies a multiplier and rounds half away from zero. Never negative.
    pub fn scale(amount: i64, multiplier: f64) -> i64 {
        if amount <= 0 || !multiplier.is_finite() || multiplier <= 0.0 {
            return amount.max(0);
        }
        (amount as f64 * multiplier).round() as i64
    }
}
