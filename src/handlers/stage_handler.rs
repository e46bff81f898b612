use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse};
use validator::Validate;

use crate::{
    app_state::AppState,
    auth::{require_student, AuthenticatedUser},
    errors::AppError,
    models::dto::{
        request::CompleteSessionRequest,
        response::{
            SessionCompleteResponse, SessionStartResponse, StageProgressDto, StageQuestionResponse,
        },
    },
};

#[get("/stages/{stage_id}/question")]
async fn next_stage_question(
    state: web::Data<Arc<AppState>>,
    stage_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_student(&auth.0)?;

    let selected = state
        .question_selector
        .select_for_stage(&auth.0.sub, &stage_id)
        .await?;
    Ok(HttpResponse::Ok().json(StageQuestionResponse::from(selected)))
}

#[post("/stages/{stage_id}/start")]
async fn start_session(
    state: web::Data<Arc<AppState>>,
    stage_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_student(&auth.0)?;

    let start = state.session_service.start_session(&auth.0.sub, &stage_id).await?;
    Ok(HttpResponse::Ok().json(SessionStartResponse::from(start)))
}

#[post("/stages/{stage_id}/complete")]
async fn complete_session(
    state: web::Data<Arc<AppState>>,
    stage_id: web::Path<String>,
    request: Option<web::Json<CompleteSessionRequest>>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_student(&auth.0)?;

    let request = request.map(web::Json::into_inner).unwrap_or_default();
    request.validate()?;

    let completion = state
        .session_service
        .complete_session(&auth.0.sub, &stage_id, request.into())
        .await?;
    Ok(HttpResponse::Ok().json(SessionCompleteResponse::from(completion)))
}

#[get("/stages/{stage_id}/progress")]
async fn stage_progress(
    state: web::Data<Arc<AppState>>,
    stage_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let progress = state.session_service.get_progress(&auth.0.sub, &stage_id).await?;
    Ok(HttpResponse::Ok().json(StageProgressDto::from(progress)))
}
