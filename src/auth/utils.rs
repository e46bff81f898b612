use async_graphql::Context;

use crate::{
    auth::Claims,
    errors::{AppError, AppResult},
    models::domain::user::UserRole,
};

/// Playing and item operations belong to students only.
pub fn require_student(claims: &Claims) -> AppResult<()> {
    if claims.role != UserRole::Student {
        return Err(AppError::Forbidden(
            "Only students can perform this action".to_string(),
        ));
    }
    Ok(())
}

pub fn extract_claims_from_context(ctx: &Context<'_>) -> AppResult<Claims> {
    ctx.data::<Claims>()
        .cloned()
        .map_err(|_| AppError::Unauthorized("Authentication required".to_string()))
}
