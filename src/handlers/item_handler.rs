use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse};
use validator::Validate;

use crate::{
    app_state::AppState,
    auth::{require_student, AuthenticatedUser},
    errors::AppError,
    models::dto::{
        request::{EquipRequest, PurchaseRequest, QuizItemQuery},
        response::{
            ConsumableUseResponse, EffectDto, EquipResponse, InventoryItemDto, ProfileDto,
            PurchaseResponse, QuizItemResponse,
        },
    },
};

#[post("/items/{item_id}/use")]
async fn use_item(
    state: web::Data<Arc<AppState>>,
    item_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_student(&auth.0)?;

    let used = state.item_service.use_consumable(&auth.0.sub, &item_id).await?;
    Ok(HttpResponse::Ok().json(ConsumableUseResponse::from(used)))
}

#[post("/items/{item_id}/quiz/{question_id}")]
async fn use_quiz_item(
    state: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
    query: web::Query<QuizItemQuery>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_student(&auth.0)?;
    query.validate()?;

    let (item_id, question_id) = path.into_inner();
    let used = state
        .item_service
        .use_quiz_item(&auth.0.sub, &item_id, &question_id, query.stage_id.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(QuizItemResponse::from(used)))
}

#[post("/items/{item_id}/purchase")]
async fn purchase_item(
    state: web::Data<Arc<AppState>>,
    item_id: web::Path<String>,
    request: Option<web::Json<PurchaseRequest>>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_student(&auth.0)?;

    let request = request.map(web::Json::into_inner).unwrap_or_default();
    request.validate()?;

    let owned = state
        .item_service
        .purchase(&auth.0.sub, &item_id, request.quantity)
        .await?;
    Ok(HttpResponse::Ok().json(PurchaseResponse {
        data: InventoryItemDto::from(owned),
        message: "Item purchased".to_string(),
    }))
}

#[post("/items/{item_id}/equip")]
async fn equip_item(
    state: web::Data<Arc<AppState>>,
    item_id: web::Path<String>,
    request: web::Json<EquipRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_student(&auth.0)?;

    let slot = request.slot()?;
    let profile = state.item_service.equip(&auth.0.sub, &item_id, slot).await?;
    Ok(HttpResponse::Ok().json(EquipResponse {
        data: ProfileDto::from(profile),
        message: "Item equipped".to_string(),
    }))
}

#[get("/inventory")]
async fn get_inventory(
    state: web::Data<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let items = state.profile_service.inventory(&auth.0.sub).await?;
    let response: Vec<InventoryItemDto> = items.into_iter().map(InventoryItemDto::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

#[get("/effects")]
async fn get_active_effects(
    state: web::Data<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let effects = state.profile_service.active_effects(&auth.0.sub).await?;
    let response: Vec<EffectDto> = effects.into_iter().map(EffectDto::from).collect();
    Ok(HttpResponse::Ok().json(response))
}
