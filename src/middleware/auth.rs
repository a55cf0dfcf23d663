use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::models::user::{AuthUser, Role};
use crate::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

fn reject(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({ "error": error }))).into_response()
}

/// Bearer header first, then the `access_token` cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Result<&str, &'static str> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header.to_str().map_err(|_| "bad_authorization")?;
        return auth_str.strip_prefix("Bearer ").ok_or("unsupported_scheme");
    }
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value)
        .filter(|v| !v.is_empty())
        .ok_or("missing_authorization")
}

pub fn decode_identity(token: &str, secret: &str) -> Result<AuthUser, &'static str> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|_| "invalid_token")?;
    let id = Uuid::parse_str(&data.claims.sub).map_err(|_| "invalid_token")?;
    let role = data
        .claims
        .role
        .as_deref()
        .and_then(Role::parse)
        .ok_or("invalid_token")?;
    Ok(AuthUser { id, role })
}

fn authenticate(state: &AppState, req: &Request) -> Result<AuthUser, Response> {
    let token = token_from_headers(req.headers()).map_err(|e| reject(StatusCode::UNAUTHORIZED, e))?;
    decode_identity(token, &state.jwt_secret).map_err(|e| reject(StatusCode::UNAUTHORIZED, e))
}

pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match authenticate(&state, &req) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(response) => response,
    }
}

/// Recruiters and admins only.
pub async fn require_recruiter(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match authenticate(&state, &req) {
        Ok(user) if user.role.can_recruit() => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(_) => reject(StatusCode::FORBIDDEN, "forbidden"),
        Err(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(sub: &str, role: Option<&str>, exp: usize) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp,
            role: role.map(str::to_string),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    fn far_future() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token=xyz"));
        assert_eq!(token_from_headers(&headers), Ok("abc"));
    }

    #[test]
    fn cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; access_token=xyz; lang=en"));
        assert_eq!(token_from_headers(&headers), Ok("xyz"));
    }

    #[test]
    fn missing_and_malformed_credentials() {
        assert_eq!(token_from_headers(&HeaderMap::new()), Err("missing_authorization"));
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(token_from_headers(&headers), Err("unsupported_scheme"));
    }

    #[test]
    fn valid_token_yields_identity() {
        let id = Uuid::new_v4();
        let user = decode_identity(&token(&id.to_string(), Some("recruiter"), far_future()), SECRET).unwrap();
        assert_eq!(user, AuthUser { id, role: Role::Recruiter });
    }

    #[test]
    fn expired_or_roleless_tokens_are_rejected() {
        let id = Uuid::new_v4().to_string();
        assert!(decode_identity(&token(&id, Some("interviewee"), 1), SECRET).is_err());
        assert!(decode_identity(&token(&id, None, far_future()), SECRET).is_err());
        assert!(decode_identity(&token("not-a-uuid", Some("admin"), far_future()), SECRET).is_err());
        assert!(decode_identity(&token(&id, Some("admin"), far_future()), "other-secret").is_err());
    }
}
