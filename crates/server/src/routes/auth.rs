use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::{
    Ack, ApiData, AuthResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResetPasswordRequest, WhoAmI,
};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    db::{AdminUser, Profile, User},
    error::{AppError, AppResult},
    mailer::password_reset_email,
    routes::{extract::AuthUser, ApiJson},
    state::{AppState, PasswordResetState},
};

const MIN_PASSWORD_LEN: usize = 6;
const RESET_SENT_MESSAGE: &str =
    "If your email is registered, you will receive a password reset link.";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: usize,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Emails listed in `auth.admin_emails` get an active admin row, unless they already have
/// one in any state. A deactivated admin stays deactivated.
async fn grant_configured_admin(state: &AppState, user: &User) -> AppResult<()> {
    if !state.config.auth.is_admin_email(&user.email)
        || state.db.get_admin_row(&user.id).await?.is_some()
    {
        return Ok(());
    }

    state
        .db
        .create_admin_user(&AdminUser {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            role: "admin".to_string(),
            is_active: true,
            permissions: None,
        })
        .await?;
    tracing::info!("Granted admin access to {}", user.email);
    Ok(())
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(e.to_string()))
}

fn check_password_length(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<Json<ApiData<AuthResponse>>> {
    let email = normalize_email(&req.email);
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".to_string()));
    }
    check_password_length(&req.password)?;

    if state.db.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }

    let user_id = Uuid::new_v4();
    let user = User {
        id: user_id.to_string(),
        email,
        password_hash: hash_password(&req.password)?,
        created_at: None,
    };
    state.db.create_user(&user).await?;

    state
        .db
        .create_profile(&Profile {
            id: user.id.clone(),
            full_name: req.full_name,
            company_name: req.company_name,
            phone_number: req.phone_number,
        })
        .await?;

    grant_configured_admin(&state, &user).await?;
    tracing::info!("Registered user {}", user_id);

    let token = generate_token(&user.id, &state.config.auth)?;
    Ok(Json(ApiData::new(AuthResponse { token, user_id })))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Json<ApiData<AuthResponse>>> {
    let user = state
        .db
        .get_user_by_email(&normalize_email(&req.email))
        .await?
        .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

    let parsed_hash =
        PasswordHash::new(&user.password_hash).map_err(|e| AppError::Internal(e.to_string()))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::AuthError("Invalid email or password".to_string()))?;

    grant_configured_admin(&state, &user).await?;
    let token = generate_token(&user.id, &state.config.auth)?;
    let user_id = Uuid::parse_str(&user.id).map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ApiData::new(AuthResponse { token, user_id })))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiData<WhoAmI>>> {
    let id = user.id_string();
    let record = state
        .db
        .get_user_by_id(&id)
        .await?
        .ok_or_else(|| AppError::AuthError("Account no longer exists".to_string()))?;
    let is_admin = state.db.get_active_admin(&id).await?.is_some();

    Ok(Json(ApiData::new(WhoAmI {
        user_id: user.user_id,
        email: record.email,
        is_admin,
    })))
}

pub(crate) fn generate_token(user_id: &str, auth_config: &AuthConfig) -> Result<String, AppError> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(auth_config.token_expiry_hours as i64))
        .ok_or_else(|| AppError::Internal("Failed to calculate expiration".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth_config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::AuthError(e.to_string()))
}

// ============================================================================
// Password Reset Flow
// ============================================================================

/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> AppResult<Json<ApiData<Ack>>> {
    let email = normalize_email(&req.email);

    // Same answer either way so registered addresses cannot be enumerated
    if state.db.get_user_by_email(&email).await?.is_none() {
        tracing::info!("Password reset requested for unknown email");
        return Ok(Json(ApiData::new(Ack::ok(RESET_SENT_MESSAGE))));
    }

    let token: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    state.password_reset_tokens.insert(
        token.clone(),
        PasswordResetState {
            email: email.clone(),
            expires_at: Utc::now() + Duration::hours(1),
        },
    );

    if state.mailer.enabled() {
        let reset_url = format!(
            "{}/reset-password?token={}",
            state.config.server.public_url.trim_end_matches('/'),
            token
        );
        state.mailer.send_in_background(
            email,
            "Company Filings - Password Reset Request".to_string(),
            password_reset_email(&reset_url),
        );
    } else {
        tracing::warn!("SMTP not configured, password reset token: {} for {}", token, email);
    }

    Ok(Json(ApiData::new(Ack::ok(RESET_SENT_MESSAGE))))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> AppResult<Json<ApiData<Ack>>> {
    state.password_reset_tokens.retain(|_, v| v.expires_at > Utc::now());

    // Taken up front so concurrent requests cannot both redeem it
    let (token, reset) = state
        .password_reset_tokens
        .remove(&req.token)
        .filter(|(_, reset)| reset.expires_at > Utc::now())
        .ok_or_else(|| AppError::BadRequest("Invalid or expired reset token".to_string()))?;

    if let Err(e) = check_password_length(&req.password) {
        state.password_reset_tokens.insert(token, reset);
        return Err(e);
    }
    let email = reset.email;

    let updated = state
        .db
        .update_user_password(&email, &hash_password(&req.password)?)
        .await?;
    if !updated {
        return Err(AppError::Internal("Failed to update password".to_string()));
    }

    tracing::info!("Password reset completed for {}", email);

    Ok(Json(ApiData::new(Ack::ok("Password has been reset successfully."))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{send, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[test]
    fn test_token_roundtrip() {
        let config = AuthConfig {
            jwt_secret: "secret".to_string(),
            token_expiry_hours: 1,
            admin_emails: Vec::new(),
        };
        let token = generate_token("abc", &config).unwrap();
        assert_eq!(verify_token(&token, "secret").unwrap().sub, "abc");
        assert!(verify_token(&token, "other").is_err());
    }

    #[tokio::test]
    async fn test_register_login_and_me() {
        let (app, _state) = test_app().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "Owner@Example.com", "password": "hunter22", "full_name": "Ann Owner"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["token"].is_string());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "owner@example.com", "password": "hunter22"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["token"].as_str().unwrap().to_string();

        let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "owner@example.com");
        assert_eq!(body["data"]["is_admin"], false);

        let (status, body) = send(&app, Method::GET, "/api/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["full_name"], "Ann Owner");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_short_passwords() {
        let (app, _state) = test_app().await;
        let body = json!({"email": "dup@example.com", "password": "hunter22"});

        let (status, _) = send(&app, Method::POST, "/api/auth/register", None, Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, Method::POST, "/api/auth/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email already registered");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "short@example.com", "password": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_configured_admin_email() {
        let (_, mut state) = test_app().await;
        state.config.auth.admin_emails = vec!["ops@example.com".to_string()];
        let app = crate::routes::create_router(state.clone());

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "ops@example.com", "password": "hunter22"})),
        )
        .await;
        let token = body["data"]["token"].as_str().unwrap().to_string();

        let (_, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(body["data"]["is_admin"], true);
    }

    #[tokio::test]
    async fn test_deactivated_admin_stays_deactivated_on_login() {
        let (_, mut state) = test_app().await;
        state.config.auth.admin_emails = vec!["ops@example.com".to_string()];
        let app = crate::routes::create_router(state.clone());

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "ops@example.com", "password": "hunter22"})),
        )
        .await;
        let user_id = body["data"]["user_id"].as_str().unwrap().to_string();

        let mut row = state.db.get_admin_row(&user_id).await.unwrap().unwrap();
        row.is_active = false;
        row.permissions = Some(r#"{"orders":"read"}"#.to_string());
        state.db.create_admin_user(&row).await.unwrap();

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ops@example.com", "password": "hunter22"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["token"].as_str().unwrap().to_string();

        assert!(state.db.get_active_admin(&user_id).await.unwrap().is_none());
        let row = state.db.get_admin_row(&user_id).await.unwrap().unwrap();
        assert!(!row.is_active);
        assert_eq!(row.permissions.as_deref(), Some(r#"{"orders":"read"}"#));

        let (_, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(body["data"]["is_admin"], false);
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let (app, _state) = test_app().await;
        send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "a@example.com", "password": "hunter22"})),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "a@example.com", "password": "wrong-pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid email or password");
    }

    #[tokio::test]
    async fn test_password_reset_token_is_single_use() {
        let (app, state) = test_app().await;
        send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "reset@example.com", "password": "hunter22"})),
        )
        .await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/forgot-password",
            None,
            Some(json!({"email": "reset@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let token = state
            .password_reset_tokens
            .iter()
            .next()
            .map(|entry| entry.key().clone())
            .unwrap();

        let reset = json!({"token": token, "password": "new-secret"});
        let (status, _) = send(&app, Method::POST, "/api/auth/reset-password", None, Some(reset.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::POST, "/api/auth/reset-password", None, Some(reset)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "reset@example.com", "password": "new-secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reset_token_redeemed_once_under_concurrency() {
        let (app, state) = test_app().await;
        send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "race@example.com", "password": "hunter22"})),
        )
        .await;
        state.password_reset_tokens.insert(
            "race-token".to_string(),
            PasswordResetState {
                email: "race@example.com".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            },
        );

        // Too short: rejected, and the token survives for a retry
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(json!({"token": "race-token", "password": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.password_reset_tokens.contains_key("race-token"));

        let first = json!({"token": "race-token", "password": "first-secret"});
        let second = json!({"token": "race-token", "password": "second-secret"});
        let ((a, _), (b, _)) = tokio::join!(
            send(&app, Method::POST, "/api/auth/reset-password", None, Some(first)),
            send(&app, Method::POST, "/api/auth/reset-password", None, Some(second)),
        );
        let successes = [a, b].iter().filter(|s| **s == StatusCode::OK).count();
        assert_eq!(successes, 1);
        assert!(!state.password_reset_tokens.contains_key("race-token"));
    }

    #[tokio::test]
    async fn test_expired_reset_token_is_rejected() {
        let (app, state) = test_app().await;
        state.password_reset_tokens.insert(
            "old-token".to_string(),
            PasswordResetState {
                email: "old@example.com".to_string(),
                expires_at: Utc::now() - Duration::minutes(1),
            },
        );
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(json!({"token": "old-token", "password": "new-secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid or expired reset token");
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_still_succeeds() {
        let (app, state) = test_app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/forgot-password",
            None,
            Some(json!({"email": "nobody@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["success"], true);
        assert!(state.password_reset_tokens.is_empty());
    }
}
