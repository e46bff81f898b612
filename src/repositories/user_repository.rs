use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document},
    options::IndexOptions,
    Collection, IndexModel,
};

use crate::{
    db::{self, Database},
    errors::{AppError, AppResult},
    models::domain::{LeaderboardType, RankKey, StudentProfile, User, UserRole},
};

/// A profile write guarded on the version it was derived from.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileWrite {
    pub user_id: String,
    pub expected_version: i64,
    pub profile: StudentProfile,
}

impl ProfileWrite {
    pub fn filter(&self) -> Document {
        doc! { "id": &self.user_id, "profile.version": self.expected_version }
    }

    pub fn update(&self) -> AppResult<Document> {
        Ok(doc! { "$set": { "profile": bson::to_bson(&self.profile)? } })
    }

    pub fn conflict(&self) -> AppError {
        AppError::Conflict(format!(
            "profile of user '{}' changed concurrently, retry the request",
            self.user_id
        ))
    }
}

/// Students with a profile, optionally restricted to the given ids.
pub fn student_filter(scope: Option<&[String]>) -> Document {
    let mut filter = doc! {
        "role": UserRole::Student.as_str(),
        "profile": { "$exists": true },
    };
    if let Some(ids) = scope {
        filter.insert("id", doc! { "$in": ids.to_vec() });
    }
    filter
}

/// Students whose all-time key is strictly better than `key`.
pub fn ranked_above_filter(scope: Option<&[String]>, kind: LeaderboardType, key: RankKey) -> Document {
    let (primary, secondary) = kind.profile_fields();

    let mut strictly_greater = Document::new();
    strictly_greater.insert(primary, doc! { "$gt": key.primary });

    let mut tie_then_greater = Document::new();
    tie_then_greater.insert(primary, key.primary);
    tie_then_greater.insert(secondary, doc! { "$gt": key.secondary });

    let mut filter = student_filter(scope);
    filter.insert("$or", vec![strictly_greater, tie_then_greater]);
    filter
}

fn ranking_sort(kind: LeaderboardType) -> Document {
    let (primary, secondary) = kind.profile_fields();
    let mut sort = Document::new();
    sort.insert(primary, -1);
    sort.insert(secondary, -1);
    sort.insert("id", 1);
    sort
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> AppResult<User>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>>;
    async fn find_by_ids(&self, ids: Vec<String>) -> AppResult<Vec<User>>;
    /// Replaces the profile when its version still matches, `Conflict` otherwise.
    async fn update_profile(&self, write: ProfileWrite) -> AppResult<StudentProfile>;
    async fn top_students(
        &self,
        scope: Option<Vec<String>>,
        kind: LeaderboardType,
        limit: i64,
    ) -> AppResult<Vec<User>>;
    async fn count_ranked_above(
        &self,
        scope: Option<Vec<String>>,
        kind: LeaderboardType,
        key: RankKey,
    ) -> AppResult<u64>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoUserRepository {
    collection: Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(db::USERS);
        Self { collection }
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn create(&self, user: User) -> AppResult<User> {
        self.collection.insert_one(&user).await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        let user = self.collection.find_one(doc! { "id": id }).await?;
        Ok(user)
    }

    async fn find_by_ids(&self, ids: Vec<String>) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self.collection.find(doc! { "id": { "$in": ids } }).await?;
        let users: Vec<User> = cursor.try_collect().await?;
        Ok(users)
    }

    async fn update_profile(&self, write: ProfileWrite) -> AppResult<StudentProfile> {
        let result = self
            .collection
            .update_one(write.filter(), write.update()?)
            .await?;

        if result.matched_count == 0 {
            return Err(write.conflict());
        }
        Ok(write.profile)
    }

    async fn top_students(
        &self,
        scope: Option<Vec<String>>,
        kind: LeaderboardType,
        limit: i64,
    ) -> AppResult<Vec<User>> {
        let cursor = self
            .collection
            .find(student_filter(scope.as_deref()))
            .sort(ranking_sort(kind))
            .limit(limit)
            .await?;
        let users: Vec<User> = cursor.try_collect().await?;
        Ok(users)
    }

    async fn count_ranked_above(
        &self,
        scope: Option<Vec<String>>,
        kind: LeaderboardType,
        key: RankKey,
    ) -> AppResult<u64> {
        let count = self
            .collection
            .count_documents(ranked_above_filter(scope.as_deref(), kind, key))
            .await?;
        Ok(count)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for users collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();
        self.collection.create_index(id_index).await?;

        let username_index = IndexModel::builder()
            .keys(doc! { "username": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("username_unique".to_string())
                    .build(),
            )
            .build();
        self.collection.create_index(username_index).await?;

        for kind in [
            LeaderboardType::Exp,
            LeaderboardType::Level,
            LeaderboardType::Gold,
            LeaderboardType::CorrectRate,
            LeaderboardType::QuestionsAnswered,
        ] {
            let model = IndexModel::builder()
                .keys(ranking_sort(kind))
                .options(
                    IndexOptions::builder()
                        .partial_filter_expression(doc! { "role": UserRole::Student.as_str() })
                        .build(),
                )
                .build();
            self.collection.create_index(model).await?;
        }

        log::info!("Successfully created indexes for users collection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameRules;

    #[test]
    fn ranked_above_filter_uses_strict_comparison_with_tie_break() {
        let key = RankKey {
            primary: 120.0,
            secondary: 3.0,
        };
        let filter = ranked_above_filter(None, LeaderboardType::Gold, key);
        let branches = filter.get_array("$or").expect("or clause");
        assert_eq!(branches.len(), 2);

        let first = branches[0].as_document().expect("document");
        assert_eq!(
            first
                .get_document("profile.gold")
                .ok()
                .and_then(|d| d.get_f64("$gt").ok()),
            Some(120.0)
        );
        let second = branches[1].as_document().expect("document");
        assert_eq!(second.get_f64("profile.gold").ok(), Some(120.0));
        assert!(second.get_document("profile.level").is_ok());
    }

    #[test]
    fn scope_restricts_to_listed_students() {
        let scope = vec!["s-1".to_string()];
        let filter = student_filter(Some(scope.as_slice()));
        assert_eq!(filter.get_str("role").ok(), Some("student"));
        assert!(filter.get_document("id").is_ok());
        assert!(!student_filter(None).contains_key("id"));
    }

    #[test]
    fn profile_write_is_guarded_on_version() {
        let write = ProfileWrite {
            user_id: "u-1".into(),
            expected_version: 7,
            profile: StudentProfile::new(&GameRules::default()),
        };
        assert_eq!(write.filter().get_i64("profile.version").ok(), Some(7));
        assert!(write.update().expect("serialises").get_document("$set").is_ok());
        assert!(matches!(write.conflict(), AppError::Conflict(_)));
    }
}
