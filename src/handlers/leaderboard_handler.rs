use std::sync::Arc;

use actix_web::{get, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    errors::AppError,
    models::dto::{request::LeaderboardParams, response::LeaderboardDto},
};

#[get("/leaderboard")]
async fn get_leaderboard(
    state: web::Data<Arc<AppState>>,
    params: web::Query<LeaderboardParams>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let query = params
        .into_inner()
        .into_query(state.config.game.leaderboard_default_limit)?;

    let board = state
        .leaderboard_service
        .get_leaderboard(&auth.0.sub, query)
        .await?;
    Ok(HttpResponse::Ok().json(LeaderboardDto::from(board)))
}
