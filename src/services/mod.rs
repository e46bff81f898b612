pub mod answer_service;
pub mod item_service;
pub mod leaderboard_service;
pub mod profile_service;
pub mod question_selector;
pub mod reward_calculator;
pub mod session_service;

use crate::{
    errors::{AppError, AppResult},
    models::domain::{StudentProfile, User, UserRole},
    repositories::UserRepository,
};

/// Loads a user that is allowed to play, along with their profile.
pub(crate) async fn load_student(
    users: &dyn UserRepository,
    user_id: &str,
) -> AppResult<(User, StudentProfile)> {
    let user = users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id '{}' not found", user_id)))?;

    if user.role != UserRole::Student {
        return Err(AppError::Forbidden("only students can play".to_string()));
    }

    let profile = user.profile.clone().ok_or_else(|| {
        AppError::InternalError(format!("student '{}' has no profile", user_id))
    })?;

    Ok((user, profile))
}
