use axum::{extract::State, response::IntoResponse, Json};

use crate::{
    dto::examination_dto::{ExaminationRequest, ExaminationResponse},
    error::Result,
    routes::ApiJson,
    AppState,
};

#[axum::debug_handler]
pub async fn create_examination(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ExaminationRequest>,
) -> Result<impl IntoResponse> {
    let examination = state.examination_service.create(&request).await?;
    Ok(Json(ExaminationResponse {
        success: true,
        examination,
    }))
}
