use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    config::GameRules,
    errors::{AppError, AppResult},
    models::domain::{
        item::Rarity, leaderboard::competition_ranks, AttemptTotals, Item, LeaderboardPeriod,
        LeaderboardType, RankKey, User, UserRole,
    },
    repositories::{ClassroomRepository, ItemRepository, QuestionAttemptRepository, UserRepository},
};

#[derive(Clone, Debug, PartialEq)]
pub struct LeaderboardQuery {
    pub kind: LeaderboardType,
    pub period: LeaderboardPeriod,
    pub class_id: Option<String>,
    pub limit: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TitleBadge {
    pub item_id: String,
    pub name: String,
    pub icon: Option<String>,
    pub rarity: Rarity,
}

impl From<&Item> for TitleBadge {
    fn from(item: &Item) -> Self {
        TitleBadge {
            item_id: item.id.clone(),
            name: item.name.clone(),
            icon: item.icon.clone(),
            rarity: item.rarity,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub level: i64,
    pub value: f64,
    pub title: Option<TitleBadge>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Leaderboard {
    pub kind: LeaderboardType,
    pub period: LeaderboardPeriod,
    pub entries: Vec<LeaderboardEntry>,
    /// Absent when the viewer is not a ranked student in this scope.
    pub current_user: Option<LeaderboardEntry>,
}

struct Ranked {
    rank: i64,
    user: User,
    value: f64,
}

pub struct LeaderboardService {
    users: Arc<dyn UserRepository>,
    attempts: Arc<dyn QuestionAttemptRepository>,
    classrooms: Arc<dyn ClassroomRepository>,
    items: Arc<dyn ItemRepository>,
    rules: Arc<GameRules>,
}

impl LeaderboardService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        attempts: Arc<dyn QuestionAttemptRepository>,
        classrooms: Arc<dyn ClassroomRepository>,
        items: Arc<dyn ItemRepository>,
        rules: Arc<GameRules>,
    ) -> Self {
        Self {
            users,
            attempts,
            classrooms,
            items,
            rules,
        }
    }

    pub async fn get_leaderboard(&self, viewer_id: &str, query: LeaderboardQuery) -> AppResult<Leaderboard> {
        let limit = query.limit.clamp(1, self.rules.leaderboard_max_limit);

        let scope = match &query.class_id {
            Some(class_id) => Some(
                self.classrooms
                    .find_by_id(class_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Class with id '{}' not found", class_id)))?
                    .student_ids,
            ),
            None => None,
        };

        let viewer = self.users.find_by_id(viewer_id).await?.filter(|user| {
            user.role == UserRole::Student
                && user.profile.is_some()
                && scope.as_ref().map(|ids| ids.contains(&user.id)).unwrap_or(true)
        });

        let (rows, current) = match query.period.window_start(Utc::now()) {
            None => self.all_time(query.kind, scope, limit, viewer).await?,
            Some(since) => self.windowed(query.kind, since, scope, limit, viewer).await?,
        };

        let titles = self.resolve_titles(rows.iter().chain(current.iter())).await?;
        let to_entry = |ranked: Ranked| {
            let profile = ranked.user.profile.as_ref();
            let title = profile
                .and_then(|p| p.equipped_items.title.as_ref())
                .and_then(|id| titles.get(id))
                .cloned();
            LeaderboardEntry {
                rank: ranked.rank,
                level: profile.map(|p| p.level).unwrap_or(1),
                value: ranked.value,
                title,
                user_id: ranked.user.id,
                username: ranked.user.username,
                display_name: ranked.user.display_name,
            }
        };

        log::debug!(
            "leaderboard {:?}/{:?} for '{}': {} rows",
            query.kind,
            query.period,
            viewer_id,
            rows.len()
        );

        Ok(Leaderboard {
            kind: query.kind,
            period: query.period,
            entries: rows.into_iter().map(to_entry).collect(),
            current_user: current.map(to_entry),
        })
    }

    async fn all_time(
        &self,
        kind: LeaderboardType,
        scope: Option<Vec<String>>,
        limit: i64,
        viewer: Option<User>,
    ) -> AppResult<(Vec<Ranked>, Option<Ranked>)> {
        let top = self.users.top_students(scope.clone(), kind, limit).await?;
        let keys: Vec<RankKey> = top
            .iter()
            .filter_map(|user| user.profile.as_ref().map(|p| kind.profile_key(p)))
            .collect();
        let ranks = competition_ranks(&keys);

        let rows = top
            .into_iter()
            .filter(|user| user.profile.is_some())
            .zip(keys.iter().zip(ranks))
            .map(|(user, (key, rank))| Ranked {
                rank,
                user,
                value: key.primary,
            })
            .collect();

        let current = match viewer {
            Some(user) => {
                let key = match &user.profile {
                    Some(profile) => kind.profile_key(profile),
                    None => return Ok((rows, None)),
                };
                let above = self.users.count_ranked_above(scope, kind, key).await?;
                Some(Ranked {
                    rank: above as i64 + 1,
                    user,
                    value: key.primary,
                })
            }
            None => None,
        };

        Ok((rows, current))
    }

    async fn windowed(
        &self,
        kind: LeaderboardType,
        since: DateTime<Utc>,
        scope: Option<Vec<String>>,
        limit: i64,
        viewer: Option<User>,
    ) -> AppResult<(Vec<Ranked>, Option<Ranked>)> {
        let mut population: Vec<(RankKey, AttemptTotals)> = self
            .attempts
            .totals_since(since, scope)
            .await?
            .into_iter()
            .map(|totals| (kind.window_key(&totals), totals))
            .collect();
        population.sort_by(|a, b| {
            RankKey::descending(&a.0, &b.0).then_with(|| a.1.student_id.cmp(&b.1.student_id))
        });

        let keys: Vec<RankKey> = population.iter().map(|(key, _)| *key).collect();
        let ranks = competition_ranks(&keys);

        let top: Vec<(i64, RankKey, String)> = population
            .iter()
            .zip(ranks)
            .take(limit as usize)
            .map(|((key, totals), rank)| (rank, *key, totals.student_id.clone()))
            .collect();

        let mut ids: Vec<String> = top.iter().map(|(_, _, id)| id.clone()).collect();
        if let Some(user) = &viewer {
            if !ids.contains(&user.id) {
                ids.push(user.id.clone());
            }
        }
        let mut users: HashMap<String, User> = self
            .users
            .find_by_ids(ids)
            .await?
            .into_iter()
            .filter(|user| user.role == UserRole::Student)
            .map(|user| (user.id.clone(), user))
            .collect();

        let current = viewer.map(|user| {
            let key = population
                .iter()
                .find(|(_, totals)| totals.student_id == user.id)
                .map(|(key, _)| *key)
                .unwrap_or_else(|| {
                    kind.window_key(&AttemptTotals {
                        student_id: user.id.clone(),
                        ..Default::default()
                    })
                });
            let above = keys.iter().filter(|other| other.beats(&key)).count();
            Ranked {
                rank: above as i64 + 1,
                user,
                value: key.primary,
            }
        });

        let rows = top
            .into_iter()
            .filter_map(|(rank, key, id)| {
                let user = match &current {
                    Some(viewer) if viewer.user.id == id => Some(viewer.user.clone()),
                    _ => users.remove(&id),
                }?;
                Some(Ranked {
                    rank,
                    user,
                    value: key.primary,
                })
            })
            .collect();

        Ok((rows, current))
    }

    /// One lookup for every distinct equipped title.
    async fn resolve_titles<'a>(
        &self,
        rows: impl Iterator<Item = &'a Ranked>,
    ) -> AppResult<HashMap<String, TitleBadge>> {
        let ids: BTreeSet<String> = rows
            .filter_map(|ranked| ranked.user.profile.as_ref())
            .filter_map(|profile| profile.equipped_items.title.clone())
            .collect();

        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let items = self.items.find_by_ids(ids.into_iter().collect()).await?;
        Ok(items
            .iter()
            .map(|item| (item.id.clone(), TitleBadge::from(item)))
            .collect())
    }
}
