use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::timestamps;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Consumable,
    Equipment,
    Cosmetic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    ExpBoost,
    GoldBoost,
    Shield,
    TimeExtend,
    Hint,
    Skip,
}

impl EffectType {
    /// Effects that persist as an `ActiveEffect` for a period of time.
    pub fn is_timed(self) -> bool {
        matches!(
            self,
            EffectType::ExpBoost | EffectType::GoldBoost | EffectType::Shield | EffectType::TimeExtend
        )
    }

    /// Effects resolved immediately against the question on screen.
    pub fn is_quiz_assist(self) -> bool {
        matches!(self, EffectType::Hint | EffectType::Skip)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EffectType::ExpBoost => "exp_boost",
            EffectType::GoldBoost => "gold_boost",
            EffectType::Shield => "shield",
            EffectType::TimeExtend => "time_extend",
            EffectType::Hint => "hint",
            EffectType::Skip => "skip",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Title,
    AvatarFrame,
    Weapon,
    Armor,
}

impl std::str::FromStr for EquipSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(EquipSlot::Title),
            "avatar_frame" => Ok(EquipSlot::AvatarFrame),
            "weapon" => Ok(EquipSlot::Weapon),
            "armor" => Ok(EquipSlot::Armor),
            other => Err(format!("invalid equipment slot '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ItemEffect {
    pub effect_type: EffectType,
    /// Multiplier for boosts, magnitude otherwise.
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub item_type: ItemType,
    pub rarity: Rarity,
    #[serde(default)]
    pub effects: Vec<ItemEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<EquipSlot>,
    #[serde(default)]
    pub price: i64,
    pub max_stack: i64,
    pub is_active: bool,
}

impl Item {
    pub fn timed_effects(&self) -> impl Iterator<Item = &ItemEffect> {
        self.effects.iter().filter(|e| e.effect_type.is_timed())
    }

    pub fn has_effect(&self, effect_type: EffectType) -> bool {
        self.effects.iter().any(|e| e.effect_type == effect_type)
    }

    pub fn is_equippable(&self) -> bool {
        matches!(self.item_type, ItemType::Equipment | ItemType::Cosmetic) && self.slot.is_some()
    }
}

/// Ownership row. Never stored with a quantity below one.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PlayerItem {
    pub player_id: String,
    pub item_id: String,
    pub quantity: i64,
    #[serde(with = "timestamps::required")]
    pub acquired_at: DateTime<Utc>,
}
