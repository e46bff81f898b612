mod common;

use std::collections::HashMap;

use adventure_server::{
    errors::AppError,
    models::domain::{
        AttemptTotals, Classroom, LeaderboardPeriod, LeaderboardType, RankKey, StudentProfile,
    },
    services::leaderboard_service::{Leaderboard, LeaderboardQuery},
};
use chrono::{Duration, Utc};
use common::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn query(kind: LeaderboardType, period: LeaderboardPeriod, limit: i64) -> LeaderboardQuery {
    LeaderboardQuery {
        kind,
        period,
        class_id: None,
        limit,
    }
}

/// Students with small, clashing stats so ties are common.
fn populate(store: &InMemoryStore, rng: &mut StdRng, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let mut user = student(&format!("s{:02}", i));
            user.id = format!("student-{:02}", i);
            if let Some(profile) = user.profile.as_mut() {
                profile.level = rng.gen_range(1..4);
                profile.total_exp = rng.gen_range(0..6) * 10;
                profile.gold = rng.gen_range(0..4) * 5;
                profile.total_questions_answered = rng.gen_range(0..5);
            }
            let id = user.id.clone();
            store.insert_user(user);
            id
        })
        .collect()
}

fn expected_rank(key: RankKey, population: &[RankKey]) -> i64 {
    population.iter().filter(|other| other.beats(&key)).count() as i64 + 1
}

fn assert_ranks(board: &Leaderboard, keys: &HashMap<String, RankKey>) {
    let population: Vec<RankKey> = keys.values().copied().collect();
    for entry in board.entries.iter().chain(board.current_user.iter()) {
        let key = keys[&entry.user_id];
        assert_eq!(
            entry.rank,
            expected_rank(key, &population),
            "rank of {} with {:?}",
            entry.user_id,
            key
        );
        assert_eq!(entry.value, key.primary);
    }
    for pair in board.entries.windows(2) {
        assert!(pair[0].rank <= pair[1].rank);
    }
}

#[tokio::test]
async fn all_time_ranks_match_brute_force() {
    let store = InMemoryStore::new();
    let mut rng = StdRng::seed_from_u64(7);
    let ids = populate(&store, &mut rng, 30);
    store.insert_user(teacher("mr-lee"));
    let state = store.app_state();

    for kind in [
        LeaderboardType::Exp,
        LeaderboardType::Level,
        LeaderboardType::Gold,
        LeaderboardType::QuestionsAnswered,
    ] {
        let keys: HashMap<String, RankKey> = ids
            .iter()
            .map(|id| (id.clone(), kind.profile_key(&store.profile(id))))
            .collect();

        for viewer in [&ids[0], &ids[17], &ids[29]] {
            let board = state
                .leaderboard_service
                .get_leaderboard(viewer, query(kind, LeaderboardPeriod::All, 10))
                .await
                .unwrap();

            assert_eq!(board.entries.len(), 10);
            assert_eq!(board.entries[0].rank, 1);
            assert_eq!(board.current_user.as_ref().unwrap().user_id, *viewer);
            assert_ranks(&board, &keys);
        }
    }
}

#[tokio::test]
async fn weekly_ranks_match_brute_force() {
    let store = InMemoryStore::new();
    let mut rng = StdRng::seed_from_u64(42);
    let ids = populate(&store, &mut rng, 20);
    let now = Utc::now();

    let mut totals: HashMap<String, AttemptTotals> = HashMap::new();
    for id in &ids[..15] {
        for _ in 0..rng.gen_range(1..6) {
            let correct = rng.gen_bool(0.6);
            let (exp, gold) = if correct { (rng.gen_range(1..3) * 10, 5) } else { (0, 0) };
            let age = Duration::hours(rng.gen_range(1..140));
            store.insert_attempt(attempt_at(id, correct, exp, gold, now - age));

            let entry = totals.entry(id.clone()).or_insert_with(|| AttemptTotals {
                student_id: id.clone(),
                ..Default::default()
            });
            entry.exp += exp;
            entry.gold += gold;
            entry.attempts += 1;
            entry.corrects += i64::from(correct);
        }
        store.insert_attempt(attempt_at(id, true, 500, 500, now - Duration::days(10)));
    }
    let state = store.app_state();

    for kind in [
        LeaderboardType::Exp,
        LeaderboardType::Gold,
        LeaderboardType::CorrectRate,
        LeaderboardType::QuestionsAnswered,
    ] {
        let keys: HashMap<String, RankKey> = totals
            .iter()
            .map(|(id, t)| (id.clone(), kind.window_key(t)))
            .collect();

        let board = state
            .leaderboard_service
            .get_leaderboard(&ids[3], query(kind, LeaderboardPeriod::Weekly, 50))
            .await
            .unwrap();

        assert_eq!(board.entries.len(), 15);
        assert_ranks(&board, &keys);
    }
}

#[tokio::test]
async fn idle_viewer_ranks_after_everyone_active() {
    let store = InMemoryStore::new();
    let mut rng = StdRng::seed_from_u64(3);
    let ids = populate(&store, &mut rng, 4);
    let now = Utc::now();
    for id in &ids[..3] {
        store.insert_attempt(attempt_at(id, true, 10, 5, now - Duration::hours(2)));
    }
    let state = store.app_state();

    let board = state
        .leaderboard_service
        .get_leaderboard(&ids[3], query(LeaderboardType::Exp, LeaderboardPeriod::Weekly, 10))
        .await
        .unwrap();

    assert_eq!(board.entries.len(), 3);
    assert!(board.entries.iter().all(|e| e.rank == 1));
    let me = board.current_user.unwrap();
    assert_eq!(me.rank, 4);
    assert_eq!(me.value, 0.0);
}

#[tokio::test]
async fn daily_window_ignores_older_attempts() {
    let store = InMemoryStore::new();
    let amy = student("amy");
    let bob = student("bob");
    let (amy_id, bob_id) = (amy.id.clone(), bob.id.clone());
    store.insert_user(amy);
    store.insert_user(bob);

    let now = Utc::now();
    store.insert_attempt(attempt_at(&amy_id, true, 10, 5, now));
    store.insert_attempt(attempt_at(&bob_id, true, 900, 90, now - Duration::days(2)));
    let state = store.app_state();

    let daily = state
        .leaderboard_service
        .get_leaderboard(&bob_id, query(LeaderboardType::Exp, LeaderboardPeriod::Daily, 10))
        .await
        .unwrap();
    assert_eq!(daily.entries.len(), 1);
    assert_eq!(daily.entries[0].user_id, amy_id);
    assert_eq!(daily.current_user.unwrap().rank, 2);

    let weekly = state
        .leaderboard_service
        .get_leaderboard(&bob_id, query(LeaderboardType::Exp, LeaderboardPeriod::Weekly, 10))
        .await
        .unwrap();
    assert_eq!(weekly.entries[0].user_id, bob_id);
    assert_eq!(weekly.entries[0].value, 900.0);
}

#[tokio::test]
async fn class_scope_limits_the_population() {
    let store = InMemoryStore::new();
    let mut rng = StdRng::seed_from_u64(11);
    let ids = populate(&store, &mut rng, 6);
    store.set_profile(&ids[5], |p: &mut StudentProfile| p.total_exp = 10_000);
    store.insert_classroom(Classroom {
        id: "class-3a".to_string(),
        name: "3A".to_string(),
        teacher_id: "mr-lee".to_string(),
        student_ids: ids[..3].to_vec(),
    });
    let state = store.app_state();

    let scoped = |viewer: &str| {
        let service = state.leaderboard_service.clone();
        let viewer = viewer.to_string();
        async move {
            service
                .get_leaderboard(
                    &viewer,
                    LeaderboardQuery {
                        kind: LeaderboardType::Exp,
                        period: LeaderboardPeriod::All,
                        class_id: Some("class-3a".to_string()),
                        limit: 10,
                    },
                )
                .await
                .unwrap()
        }
    };

    let inside = scoped(&ids[1]).await;
    assert_eq!(inside.entries.len(), 3);
    assert!(inside.entries.iter().all(|e| ids[..3].contains(&e.user_id)));
    assert!(inside.current_user.is_some());

    let outside = scoped(&ids[5]).await;
    assert_eq!(outside.entries.len(), 3);
    assert!(outside.current_user.is_none());
}

#[tokio::test]
async fn unknown_class_is_not_found() {
    let store = InMemoryStore::new();
    let amy = student("amy");
    let amy_id = amy.id.clone();
    store.insert_user(amy);
    let state = store.app_state();

    let result = state
        .leaderboard_service
        .get_leaderboard(
            &amy_id,
            LeaderboardQuery {
                class_id: Some("class-missing".to_string()),
                ..query(LeaderboardType::Exp, LeaderboardPeriod::All, 10)
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn teachers_see_the_board_without_a_rank() {
    let store = InMemoryStore::new();
    let mut rng = StdRng::seed_from_u64(5);
    populate(&store, &mut rng, 3);
    let lee = teacher("mr-lee");
    let lee_id = lee.id.clone();
    store.insert_user(lee);
    let state = store.app_state();

    let board = state
        .leaderboard_service
        .get_leaderboard(&lee_id, query(LeaderboardType::Gold, LeaderboardPeriod::All, 10))
        .await
        .unwrap();

    assert_eq!(board.entries.len(), 3);
    assert!(board.entries.iter().all(|e| e.user_id != lee_id));
    assert!(board.current_user.is_none());
}

#[tokio::test]
async fn limit_is_clamped_to_the_maximum() {
    let store = InMemoryStore::new();
    let mut rng = StdRng::seed_from_u64(9);
    let ids = populate(&store, &mut rng, 120);
    let state = store.app_state();

    let board = state
        .leaderboard_service
        .get_leaderboard(&ids[0], query(LeaderboardType::Exp, LeaderboardPeriod::All, 1000))
        .await
        .unwrap();
    assert_eq!(board.entries.len(), 100);

    let board = state
        .leaderboard_service
        .get_leaderboard(&ids[0], query(LeaderboardType::Exp, LeaderboardPeriod::All, 0))
        .await
        .unwrap();
    assert_eq!(board.entries.len(), 1);
}
