use std::sync::Arc;

use async_graphql::{Context, ErrorExtensions, Object};

use crate::{
    app_state::AppState,
    auth::extract_claims_from_context,
    errors::AppResult,
    models::{
        domain::{LeaderboardPeriod, LeaderboardType},
        dto::response::{LeaderboardDto, MeDto, StageProgressDto},
    },
    services::leaderboard_service::LeaderboardQuery,
};

pub struct QueryRoot;

async fn leaderboard_for(
    ctx: &Context<'_>,
    kind: Option<LeaderboardType>,
    period: Option<LeaderboardPeriod>,
    class_id: Option<String>,
    limit: Option<i64>,
) -> AppResult<LeaderboardDto> {
    let state = ctx.data::<Arc<AppState>>()?;
    let claims = extract_claims_from_context(ctx)?;

    let query = LeaderboardQuery {
        kind: kind.unwrap_or(LeaderboardType::Exp),
        period: period.unwrap_or(LeaderboardPeriod::All),
        class_id,
        limit: limit.unwrap_or(state.config.game.leaderboard_default_limit),
    };
    let board = state
        .leaderboard_service
        .get_leaderboard(&claims.sub, query)
        .await?;
    Ok(board.into())
}

#[Object]
impl QueryRoot {
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<MeDto> {
        let fetch = async {
            let state = ctx.data::<Arc<AppState>>()?;
            let claims = extract_claims_from_context(ctx)?;
            AppResult::Ok(state.profile_service.get_user(&claims.sub).await?.into())
        };
        fetch.await.map_err(|e| e.extend())
    }

    async fn stage_progress(
        &self,
        ctx: &Context<'_>,
        stage_id: String,
    ) -> async_graphql::Result<StageProgressDto> {
        let fetch = async {
            let state = ctx.data::<Arc<AppState>>()?;
            let claims = extract_claims_from_context(ctx)?;
            let progress = state
                .session_service
                .get_progress(&claims.sub, &stage_id)
                .await?;
            AppResult::Ok(progress.into())
        };
        fetch.await.map_err(|e| e.extend())
    }

    async fn leaderboard(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "type")] kind: Option<LeaderboardType>,
        period: Option<LeaderboardPeriod>,
        class_id: Option<String>,
        limit: Option<i64>,
    ) -> async_graphql::Result<LeaderboardDto> {
        leaderboard_for(ctx, kind, period, class_id, limit)
            .await
            .map_err(|e| e.extend())
    }
}
