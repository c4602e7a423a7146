use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// `sub` is the caller identity; banks are owned by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

fn reject(code: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": code }))).into_response()
}

fn bearer_token(req: &Request) -> std::result::Result<&str, Response> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| reject("missing_authorization"))?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| reject("bad_authorization"))?;
    auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| reject("unsupported_scheme"))
}

pub async fn require_bearer_auth(mut req: Request, next: Next) -> Response {
    let token = match bearer_token(&req) {
        Ok(token) => token.to_string(),
        Err(rejection) => return rejection,
    };

    let config = crate::config::get_config();
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    match decode::<Claims>(
        &token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    ) {
        Ok(data) if !data.claims.sub.trim().is_empty() => {
            req.extensions_mut().insert(data.claims);
            next.run(req).await
        }
        Ok(_) => reject("missing_subject"),
        Err(err) => {
            tracing::debug!(error = %err, "rejected bearer token");
            reject("invalid_token")
        }
    }
}
