//! Request guards: a bearer-token customer, and an active admin on top of that.
//! Also body/path/query extractors whose rejections use the JSON error envelope.

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
    RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::{error::AppError, routes::auth::verify_token, state::AppState};

/// `axum::Json` that rejects with `{"error": ...}`
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Authenticated caller, from `Authorization: Bearer <jwt>`
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl AuthUser {
    pub fn id_string(&self) -> String {
        self.user_id.to_string()
    }
}

/// Authenticated caller with an active `admin_users` row
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: Uuid,
    pub role: String,
}

pub fn user_id_from_token(token: &str, secret: &str) -> Result<Uuid, AppError> {
    let claims = verify_token(token, secret)?;
    Uuid::parse_str(&claims.sub).map_err(|_| AppError::AuthError("Invalid token subject".to_string()))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| {
                AppError::AuthError("Missing or invalid Authorization header".to_string())
            })?;

        let user_id = user_id_from_token(bearer.token(), &state.config.auth.jwt_secret)?;
        Ok(AuthUser { user_id })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        let admin = state
            .db
            .get_active_admin(&user.id_string())
            .await?
            .ok_or_else(|| AppError::Forbidden("Admin access required".to_string()))?;

        Ok(AdminUser {
            user_id: user.user_id,
            role: admin.role,
        })
    }
}
