use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use validator::Validate;

use crate::{
    dto::question_dto::{
        CreateQuestionPayload, GenerationRequest, GenerationResponse, MembershipResponse,
        QuestionListQuery, QuestionResponse, RephrasePayload, SaveToBankPayload,
        UpdateQuestionPayload,
    },
    error::{Error, Result},
    middleware::auth::Claims,
    routes::ApiJson,
    AppState,
};

#[axum::debug_handler]
pub async fn generate_questions(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut request = GenerationRequest::default();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to get next field: {}", e);
        Error::BadRequest(e.to_string())
    })? {
        let field_name = field.name().unwrap_or_default().to_string();

        if field_name == "file" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            upload = Some((filename, data));
            continue;
        }

        let value = field.text().await?;
        if !request.apply_field(&field_name, &value)? {
            tracing::debug!(field = %field_name, "ignoring unknown generation field");
        }
    }

    let Some((filename, data)) = upload else {
        return Err(Error::BadRequest("No file uploaded".to_string()));
    };

    let questions = state
        .generation_service
        .generate_from_upload(&filename, &data, &request)
        .await?;
    Ok(Json(GenerationResponse::from(questions)))
}

#[axum::debug_handler]
pub async fn rephrase_question(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RephrasePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let rephrased = state.ai_service.rephrase_question(&payload).await?;
    Ok(Json(rephrased))
}

#[axum::debug_handler]
pub async fn save_to_bank(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<SaveToBankPayload>,
) -> Result<impl IntoResponse> {
    let report = state.bank_service.save_to_bank(&claims.sub, payload).await?;
    Ok(Json(MembershipResponse::added(report)))
}

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<QuestionListQuery>,
) -> Result<impl IntoResponse> {
    let questions = state.question_service.list(&query).await?;
    let body: Vec<QuestionResponse> = questions.into_iter().map(QuestionResponse::from).collect();
    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<CreateQuestionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    if let Some(bank_id) = payload.bank_id {
        state.bank_service.get_owned(bank_id, &claims.sub).await?;
    }
    let question = state.question_service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(QuestionResponse::from(question))))
}

#[axum::debug_handler]
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let question = state.question_service.get(id).await?;
    Ok(Json(QuestionResponse::from(question)))
}

#[axum::debug_handler]
pub async fn update_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<UpdateQuestionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let existing = state.question_service.get(id).await?;
    for bank_id in payload.banks_touched(existing.bank_id) {
        state.bank_service.get_owned(bank_id, &claims.sub).await?;
    }
    let question = state.question_service.update(id, payload).await?;
    Ok(Json(QuestionResponse::from(question)))
}

#[axum::debug_handler]
pub async fn delete_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let existing = state.question_service.get(id).await?;
    if let Some(bank_id) = existing.bank_id {
        state.bank_service.get_owned(bank_id, &claims.sub).await?;
    }
    if state.question_service.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound(format!("Question {} not found", id)))
    }
}
