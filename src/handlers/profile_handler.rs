use std::sync::Arc;

use actix_web::{get, web, HttpResponse};

use crate::{
    app_state::AppState, auth::AuthenticatedUser, errors::AppError, models::dto::response::MeDto,
};

#[get("/profile")]
async fn get_profile(
    state: web::Data<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let user = state.profile_service.get_user(&auth.0.sub).await?;
    Ok(HttpResponse::Ok().json(MeDto::from(user)))
}
