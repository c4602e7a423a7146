use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use validator::Validate;

use crate::{
    dto::{
        bank_dto::{
            BankListQuery, BankWithQuestions, CreateBankPayload, QuestionIdsPayload,
            UpdateBankPayload,
        },
        question_dto::{paging, MembershipResponse, QuestionResponse},
    },
    error::Result,
    middleware::auth::Claims,
    routes::ApiJson,
    AppState,
};

#[axum::debug_handler]
pub async fn list_banks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<BankListQuery>,
) -> Result<impl IntoResponse> {
    let (skip, limit) = paging(query.skip, query.limit);
    let banks = state
        .bank_service
        .list_for_owner(&claims.sub, skip, limit)
        .await?;
    Ok(Json(banks))
}

#[axum::debug_handler]
pub async fn create_bank(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<CreateBankPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let bank = state.bank_service.create(&claims.sub, payload).await?;
    Ok((StatusCode::CREATED, Json(bank)))
}

#[axum::debug_handler]
pub async fn get_bank(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Query(query): Query<BankListQuery>,
) -> Result<impl IntoResponse> {
    let bank = state.bank_service.get_owned(id, &claims.sub).await?;
    let (skip, limit) = paging(query.skip, query.limit);
    let questions = state
        .question_service
        .list_by_bank(id, skip, limit)
        .await?
        .into_iter()
        .map(QuestionResponse::from)
        .collect();
    Ok(Json(BankWithQuestions { bank, questions }))
}

#[axum::debug_handler]
pub async fn update_bank(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<UpdateBankPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let bank = state.bank_service.update(id, &claims.sub, payload).await?;
    Ok(Json(bank))
}

#[axum::debug_handler]
pub async fn delete_bank(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let bank = state.bank_service.delete(id, &claims.sub).await?;
    Ok(Json(bank))
}

#[axum::debug_handler]
pub async fn list_bank_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Query(query): Query<BankListQuery>,
) -> Result<impl IntoResponse> {
    state.bank_service.get_owned(id, &claims.sub).await?;
    let (skip, limit) = paging(query.skip, query.limit);
    let questions: Vec<QuestionResponse> = state
        .question_service
        .list_by_bank(id, skip, limit)
        .await?
        .into_iter()
        .map(QuestionResponse::from)
        .collect();
    Ok(Json(questions))
}

#[axum::debug_handler]
pub async fn add_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<QuestionIdsPayload>,
) -> Result<impl IntoResponse> {
    let report = state
        .bank_service
        .add_questions(id, &claims.sub, &payload.into_ids())
        .await?;
    Ok(Json(MembershipResponse::added(report)))
}

#[axum::debug_handler]
pub async fn remove_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<QuestionIdsPayload>,
) -> Result<impl IntoResponse> {
    let report = state
        .bank_service
        .remove_questions(id, &claims.sub, &payload.into_ids())
        .await?;
    Ok(Json(MembershipResponse::removed(report)))
}
