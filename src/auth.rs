use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, FieldError};
use crate::routes::ApiJson;
use crate::state::AppState;

pub const TOKEN_COOKIE: &str = "token";
const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(config: &Config) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: ADMIN_ROLE.to_string(),
        role: ADMIN_ROLE.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(*config.jwt_ttl_hours())).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.into()))
}

pub fn verify_token(config: &Config, token: &str) -> AppResult<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret().as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        debug!(error = %e, "token rejected");
        AppError::Unauthorized
    })?;

    if data.claims.role != ADMIN_ROLE {
        return Err(AppError::Unauthorized);
    }
    Ok(data.claims)
}

/// `Authorization: Bearer <jwt>` first, then the `token` cookie.
fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = token_from_headers(request.headers()).ok_or(AppError::Unauthorized)?;
    let claims = verify_token(&state.config, &token)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn token_cookie(config: &Config, token: &str, max_age_secs: i64) -> String {
    let secure = if *config.production() { "; Secure" } else { "" };
    format!("{TOKEN_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age_secs}{secure}")
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// Constant-time check of both halves of the admin credential.
fn credentials_match(config: &Config, username: &str, password: &str) -> bool {
    let username_ok = username.as_bytes().ct_eq(config.admin_username().as_bytes());
    let password_ok = password.as_bytes().ct_eq(config.admin_password().as_bytes());
    (username_ok & password_ok).into()
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Response> {
    let mut errors = Vec::new();
    if body.username.trim().is_empty() {
        errors.push(FieldError::new("username", "Username is required"));
    }
    if body.password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let config = &state.config;
    if !credentials_match(config, body.username.trim(), &body.password) {
        warn!(username = %body.username, "failed admin login");
        return Err(AppError::Unauthorized);
    }

    let token = issue_token(config)?;
    let max_age = config.jwt_ttl_hours() * 3600;
    info!("admin logged in");

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, token_cookie(config, &token, max_age))],
        Json(json!({
            "success": true,
            "message": "Login successful",
            "token": token,
            "expiresIn": max_age,
            "user": { "username": config.admin_username(), "role": ADMIN_ROLE },
        })),
    )
        .into_response())
}

pub async fn logout(State(state): State<AppState>) -> Response {
    (
        [(SET_COOKIE, token_cookie(&state.config, "", 0))],
        Json(json!({ "success": true, "message": "Logged out" })),
    )
        .into_response()
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "user": { "username": state.config.admin_username(), "role": claims.role },
        "expiresAt": claims.exp,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config() -> Config {
        Config::for_tests("uploads")
    }

    #[test]
    fn test_credentials_match() {
        let config = config();
        assert!(credentials_match(&config, "admin", "admin123"));
        assert!(!credentials_match(&config, "admin", "admin124"));
        assert!(!credentials_match(&config, "admin", "admin1234"));
        assert!(!credentials_match(&config, "root", "admin123"));
        assert!(!credentials_match(&config, "", ""));
    }

    #[test]
    fn test_issue_then_verify() {
        let config = config();
        let token = issue_token(&config).unwrap();
        let claims = verify_token(&config, &token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_rejects_tampered_and_foreign_tokens() {
        let config = config();
        let token = issue_token(&config).unwrap();
        let tampered = format!("{token}x");
        assert!(matches!(
            verify_token(&config, &tampered),
            Err(AppError::Unauthorized)
        ));

        let foreign = encode(
            &Header::default(),
            &Claims {
                sub: "admin".to_string(),
                role: "admin".to_string(),
                iat: Utc::now().timestamp(),
                exp: (Utc::now() + Duration::hours(1)).timestamp(),
            },
            &EncodingKey::from_secret(b"another-secret"),
        )
        .unwrap();
        assert!(verify_token(&config, &foreign).is_err());
    }

    #[test]
    fn test_rejects_expired_token() {
        let config = config();
        let expired = encode(
            &Header::default(),
            &Claims {
                sub: "admin".to_string(),
                role: "admin".to_string(),
                iat: (Utc::now() - Duration::hours(3)).timestamp(),
                exp: (Utc::now() - Duration::hours(2)).timestamp(),
            },
            &EncodingKey::from_secret(config.jwt_secret().as_bytes()),
        )
        .unwrap();
        assert!(verify_token(&config, &expired).is_err());
    }

    #[test]
    fn test_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);

        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; token=abc.def"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("xyz"));

        let mut empty_cookie = HeaderMap::new();
        empty_cookie.insert(COOKIE, HeaderValue::from_static("token="));
        assert_eq!(token_from_headers(&empty_cookie), None);
    }
}
