use async_graphql::Enum;
use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::domain::{AttemptTotals, StudentProfile};

#[derive(Enum, Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LeaderboardType {
    Exp,
    Level,
    Gold,
    CorrectRate,
    QuestionsAnswered,
}

#[derive(Enum, Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardPeriod {
    Daily,
    Weekly,
    Monthly,
    All,
}

/// Lexicographic sort key, compared descending.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RankKey {
    pub primary: f64,
    pub secondary: f64,
}

impl RankKey {
    pub fn beats(&self, other: &RankKey) -> bool {
        self.primary > other.primary
            || (self.primary == other.primary && self.secondary > other.secondary)
    }

    pub fn descending(a: &RankKey, b: &RankKey) -> std::cmp::Ordering {
        b.primary
            .total_cmp(&a.primary)
            .then(b.secondary.total_cmp(&a.secondary))
    }
}

impl LeaderboardType {
    /// Profile paths (primary, tie-break) for all-time rankings.
    pub fn profile_fields(self) -> (&'static str, &'static str) {
        match self {
            LeaderboardType::Exp => ("profile.total_exp", "profile.level"),
            LeaderboardType::Level => ("profile.level", "profile.total_exp"),
            LeaderboardType::Gold => ("profile.gold", "profile.level"),
            LeaderboardType::CorrectRate => ("profile.correct_rate", "profile.level"),
            LeaderboardType::QuestionsAnswered => {
                ("profile.total_questions_answered", "profile.level")
            }
        }
    }

    pub fn profile_key(self, profile: &StudentProfile) -> RankKey {
        let level = profile.level as f64;
        let (primary, secondary) = match self {
            LeaderboardType::Exp => (profile.total_exp as f64, level),
            LeaderboardType::Level => (level, profile.total_exp as f64),
            LeaderboardType::Gold => (profile.gold as f64, level),
            LeaderboardType::CorrectRate => (profile.correct_rate, level),
            LeaderboardType::QuestionsAnswered => (profile.total_questions_answered as f64, level),
        };
        RankKey { primary, secondary }
    }

    /// Windowed rankings. `Level` has no windowed meaning and ranks by exp earned.
    pub fn window_key(self, totals: &AttemptTotals) -> RankKey {
        let (primary, secondary) = match self {
            LeaderboardType::Exp | LeaderboardType::Level => {
                (totals.exp as f64, totals.corrects as f64)
            }
            LeaderboardType::Gold => (totals.gold as f64, totals.exp as f64),
            LeaderboardType::CorrectRate => (totals.correct_rate(), totals.attempts as f64),
            LeaderboardType::QuestionsAnswered => {
                (totals.attempts as f64, totals.corrects as f64)
            }
        };
        RankKey { primary, secondary }
    }
}

impl LeaderboardPeriod {
    /// Start of the window, `None` for all-time.
    pub fn window_start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            LeaderboardPeriod::All => None,
            LeaderboardPeriod::Daily => {
                let midnight = now.date_naive().and_hms_opt(0, 0, 0)?;
                Some(Utc.from_utc_datetime(&midnight))
            }
            LeaderboardPeriod::Weekly => Some(now - Duration::days(7)),
            LeaderboardPeriod::Monthly => now
                .checked_sub_months(Months::new(1))
                .or_else(|| Some(now - Duration::days(30))),
        }
    }
}

impl std::str::FromStr for LeaderboardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exp" => Ok(LeaderboardType::Exp),
            "level" => Ok(LeaderboardType::Level),
            "gold" => Ok(LeaderboardType::Gold),
            "correctRate" => Ok(LeaderboardType::CorrectRate),
            "questionsAnswered" => Ok(LeaderboardType::QuestionsAnswered),
            other => Err(format!("invalid leaderboard type '{}'", other)),
        }
    }
}

impl std::str::FromStr for LeaderboardPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(LeaderboardPeriod::Daily),
            "weekly" => Ok(LeaderboardPeriod::Weekly),
            "monthly" => Ok(LeaderboardPeriod::Monthly),
            "all" => Ok(LeaderboardPeriod::All),
            other => Err(format!("invalid leaderboard period '{}'", other)),
        }
    }
}

/// Competition ranking over keys already sorted best-first: tied keys share a rank.
pub fn competition_ranks(sorted: &[RankKey]) -> Vec<i64> {
    let mut ranks = Vec::with_capacity(sorted.len());
    for (i, key) in sorted.iter().enumerate() {
        let rank = match (i.checked_sub(1), ranks.last()) {
            (Some(prev), Some(&prev_rank)) if !sorted[prev].beats(key) => prev_rank,
            _ => i as i64 + 1,
        };
        ranks.push(rank);
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(primary: f64, secondary: f64) -> RankKey {
        RankKey { primary, secondary }
    }

    #[test]
    fn ties_share_a_rank_and_skip_the_next() {
        let ranks = competition_ranks(&[key(10.0, 2.0), key(8.0, 1.0), key(8.0, 1.0), key(5.0, 9.0)]);
        assert_eq!(ranks, vec![1, 2, 2, 4]);
    }

    #[test]
    fn secondary_breaks_ties() {
        assert!(key(5.0, 3.0).beats(&key(5.0, 2.0)));
        assert!(!key(5.0, 2.0).beats(&key(5.0, 2.0)));
        assert!(key(6.0, 0.0).beats(&key(5.0, 100.0)));
    }

    #[test]
    fn correct_rate_window_breaks_ties_on_attempts() {
        let few = AttemptTotals {
            student_id: "a".into(),
            attempts: 2,
            corrects: 2,
            ..Default::default()
        };
        let many = AttemptTotals {
            student_id: "b".into(),
            attempts: 10,
            corrects: 10,
            ..Default::default()
        };
        let kind = LeaderboardType::CorrectRate;
        assert!(kind.window_key(&many).beats(&kind.window_key(&few)));
    }

    #[test]
    fn daily_window_starts_at_midnight_utc() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 15, 42, 7).unwrap();
        assert_eq!(
            LeaderboardPeriod::Daily.window_start(now),
            Some(Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap())
        );
        assert_eq!(
            LeaderboardPeriod::Weekly.window_start(now),
            Some(Utc.with_ymd_and_hms(2024, 3, 24, 15, 42, 7).unwrap())
        );
        assert_eq!(
            LeaderboardPeriod::Monthly.window_start(now),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 15, 42, 7).unwrap())
        );
        assert_eq!(LeaderboardPeriod::All.window_start(now), None);
    }

    #[test]
    fn wire_names_are_camel_case() {
        let kind: LeaderboardType = serde_json::from_str("\"correctRate\"").unwrap();
        assert_eq!(kind, LeaderboardType::CorrectRate);
        let period: LeaderboardPeriod = serde_json::from_str("\"weekly\"").unwrap();
        assert_eq!(period, LeaderboardPeriod::Weekly);
    }

    #[test]
    fn query_values_parse_with_wire_names() {
        assert_eq!("correctRate".parse::<LeaderboardType>(), Ok(LeaderboardType::CorrectRate));
        assert_eq!("weekly".parse::<LeaderboardPeriod>(), Ok(LeaderboardPeriod::Weekly));
        assert!("correct_rate".parse::<LeaderboardType>().is_err());
        assert!("yearly".parse::<LeaderboardPeriod>().is_err());
    }
}
