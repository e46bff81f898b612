use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse};
use validator::Validate;

use crate::{
    app_state::AppState,
    auth::{require_student, AuthenticatedUser},
    errors::AppError,
    models::dto::{
        request::{RandomQuestionQuery, SubmitAnswerRequest},
        response::{AnswerResponse, QuestionDto},
    },
};

#[get("/questions/random")]
async fn random_question(
    state: web::Data<Arc<AppState>>,
    query: web::Query<RandomQuestionQuery>,
    _auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let filter = query.into_inner().into_filter()?;
    let question = state.question_selector.select(filter).await?;
    Ok(HttpResponse::Ok().json(QuestionDto::from(question)))
}

#[post("/questions/{question_id}/answer")]
async fn submit_answer(
    state: web::Data<Arc<AppState>>,
    question_id: web::Path<String>,
    request: web::Json<SubmitAnswerRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_student(&auth.0)?;
    request.validate()?;

    let submission = request.into_inner().into_submission(question_id.into_inner());
    let receipt = state.answer_service.submit(&auth.0.sub, submission).await?;
    Ok(HttpResponse::Ok().json(AnswerResponse::from(receipt)))
}
