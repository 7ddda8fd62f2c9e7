use axum::{extract::FromRequestParts, http::request::Parts, RequestPartsExt};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::AuthUser;
use crate::AppState;

pub const SESSION_COOKIE: &str = "session_token";

/// Resolves the caller from `Authorization: Bearer <token>`, falling back to
/// the session cookie. Anything else is rejected with 401 before the handler runs.
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = match parts.extract::<TypedHeader<Authorization<Bearer>>>().await {
            Ok(TypedHeader(Authorization(bearer))) => Some(bearer.token().to_string()),
            Err(_) => CookieJar::from_headers(&parts.headers)
                .get(SESSION_COOKIE)
                .map(|c| c.value().to_string()),
        };

        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Err(ApiError::Unauthenticated("Not authenticated".into())),
        };

        let row = sqlx::query_as::<_, (String, String, String)>(
            r#"SELECT u.id, u.username, s.expires_at
               FROM "sessions" s
               JOIN "users" u ON u.id = s.user_id
               WHERE s.token = ?"#,
        )
        .bind(&token)
        .fetch_optional(&state.db)
        .await?;

        let (user_id, username, expires_at) = match row {
            Some(r) => r,
            None => {
                tracing::warn!("rejected request with unknown session token");
                return Err(ApiError::Unauthenticated("Invalid session".into()));
            }
        };

        if expires_at < crate::db::timestamp() {
            return Err(ApiError::Unauthenticated("Session expired".into()));
        }

        Ok(AuthUser {
            id: user_id,
            username,
            token,
        })
    }
}
