use axum::{extract::State, Json};
use shared::{ApiData, ProfileInfo, UpdateProfileRequest};

use crate::{
    db::Profile,
    error::AppResult,
    routes::{ApiJson, AuthUser},
    state::AppState,
};

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// GET /api/profile
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiData<ProfileInfo>>> {
    let profile = match state.db.get_profile(&user.id_string()).await? {
        Some(profile) => profile.to_info()?,
        // Accounts created before profiles existed
        None => ProfileInfo {
            id: user.user_id,
            full_name: None,
            company_name: None,
            phone_number: None,
        },
    };
    Ok(Json(ApiData::new(profile)))
}

/// PUT /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<ApiData<ProfileInfo>>> {
    let profile = Profile {
        id: user.id_string(),
        full_name: non_blank(req.full_name),
        company_name: non_blank(req.company_name),
        phone_number: non_blank(req.phone_number),
    };
    state.db.update_profile(&profile).await?;

    Ok(Json(ApiData::new(profile.to_info()?)))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{create_user, send, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_update_profile() {
        let (app, state) = test_app().await;
        let (user_id, token) = create_user(&state, "p@example.com").await;

        let (status, body) = send(&app, Method::GET, "/api/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], user_id.to_string());
        assert!(body["data"]["full_name"].is_null());

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/profile",
            Some(&token),
            Some(json!({"full_name": "Pat Doe", "phone_number": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["full_name"], "Pat Doe");
        assert!(body["data"]["phone_number"].is_null());
    }

    #[tokio::test]
    async fn test_profile_requires_token() {
        let (app, _) = test_app().await;
        let (status, body) = send(&app, Method::GET, "/api/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }
}
