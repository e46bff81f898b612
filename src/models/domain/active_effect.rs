use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::timestamps;
use crate::models::domain::item::EffectType;

/// A running boost. At most one record exists per `(player_id, effect_type)`;
/// using another item of the same type pushes `expires_at` further out.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ActiveEffect {
    pub player_id: String,
    pub effect_type: EffectType,
    pub item_id: String,
    pub value: f64,
    #[serde(with = "timestamps::required")]
    pub expires_at: DateTime<Utc>,
}

impl ActiveEffect {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// One timed effect to apply on item use.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectGrant {
    pub effect_type: EffectType,
    pub item_id: String,
    pub value: f64,
    pub duration: Duration,
}

impl EffectGrant {
    /// Extends an unexpired effect, otherwise starts a fresh one at `now`.
    pub fn apply_to(&self, player_id: &str, existing: Option<&ActiveEffect>, now: DateTime<Utc>) -> ActiveEffect {
        let start = existing
            .filter(|e| e.is_active(now))
            .map(|e| e.expires_at)
            .unwrap_or(now);

        ActiveEffect {
            player_id: player_id.to_string(),
            effect_type: self.effect_type,
            item_id: self.item_id.clone(),
            value: self.value,
            expires_at: start + self.duration,
        }
    }
}

/// Multipliers and flags derived from the player's unexpired effects.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectSnapshot {
    pub exp_multiplier: f64,
    pub gold_multiplier: f64,
    pub shield: bool,
}

impl Default for EffectSnapshot {
    fn default() -> Self {
        Self {
            exp_multiplier: 1.0,
            gold_multiplier: 1.0,
            shield: false,
        }
    }
}

impl EffectSnapshot {
    pub fn from_effects(effects: &[ActiveEffect], now: DateTime<Utc>) -> Self {
        effects
            .iter()
            .filter(|e| e.is_active(now))
            .fold(Self::default(), |mut snapshot, effect| {
                match effect.effect_type {
                    EffectType::ExpBoost if effect.value > 0.0 => snapshot.exp_multiplier = effect.value,
                    EffectType::GoldBoost if effect.value > 0.0 => snapshot.gold_multiplier = effect.value,
                    EffectType::Shield => snapshot.shield = true,
                    _ => {}
                }
                snapshot
            })
    }
}
