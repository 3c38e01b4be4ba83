use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use shared::{Ack, ApiData, CompanySummary, SaveCompanyRequest, SavedCompany, SearchResults};
use uuid::Uuid;

use crate::{
    db::{Company, CompanyCacheEntry},
    error::{AppError, AppResult},
    routes::{ApiJson, ApiPath, ApiQuery, AuthUser},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub start_index: u64,
}

impl From<&CompanySummary> for CompanyCacheEntry {
    fn from(company: &CompanySummary) -> Self {
        CompanyCacheEntry {
            company_number: company.company_number.clone(),
            company_name: company.company_name.clone(),
            company_status: company.company_status.clone(),
            confirmation_statement_due: company.confirmation_statement_due.clone(),
            accounts_due: company.accounts_due.clone(),
            updated_at: None,
        }
    }
}

/// Registry search shared by the customer and admin endpoints; every hit lands in the cache
pub(super) async fn search_and_cache(
    state: &AppState,
    params: &SearchParams,
) -> AppResult<SearchResults> {
    let results = state.registry.search(&params.q, params.start_index).await?;

    for company in &results.items {
        state.db.upsert_cached_company(&company.into()).await?;
    }

    Ok(results)
}

/// GET /api/companies/search-external?q=&start_index=
pub async fn search_external(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> AppResult<Json<ApiData<SearchResults>>> {
    let results = search_and_cache(&state, &params).await?;
    Ok(Json(ApiData::new(results)))
}

/// GET /api/companies/lookup/:number
pub async fn lookup(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(number): ApiPath<String>,
) -> AppResult<Json<ApiData<CompanySummary>>> {
    let company = state
        .registry
        .company(&number)
        .await?
        .ok_or_else(|| AppError::NotFound("Company not found".to_string()))?;

    state.db.upsert_cached_company(&(&company).into()).await?;
    Ok(Json(ApiData::new(company)))
}

/// GET /api/companies
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiData<Vec<SavedCompany>>>> {
    let companies = state
        .db
        .list_companies(&user.id_string())
        .await?
        .iter()
        .map(Company::to_info)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(ApiData::new(companies)))
}

/// POST /api/companies
pub async fn save(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<SaveCompanyRequest>,
) -> AppResult<Json<ApiData<SavedCompany>>> {
    let company_number = req.company_number.trim().to_uppercase();
    if company_number.is_empty() || req.company_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Company number and name are required".to_string(),
        ));
    }

    let saved = state
        .db
        .save_company(&Company {
            id: Uuid::new_v4().to_string(),
            user_id: user.id_string(),
            company_number,
            company_name: req.company_name.trim().to_string(),
            status: req.status,
            confirmation_statement_due: req.confirmation_statement_due,
            accounts_due: req.accounts_due,
            is_favorite: false,
            created_at: None,
        })
        .await?;

    Ok(Json(ApiData::new(saved.to_info()?)))
}

/// DELETE /api/companies/:id
pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiData<Ack>>> {
    if !state.db.delete_company(&id.to_string(), &user.id_string()).await? {
        return Err(AppError::NotFound("Company not found".to_string()));
    }
    Ok(Json(ApiData::new(Ack::ok("Company removed"))))
}

/// POST /api/companies/:id/favorite
pub async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiData<SavedCompany>>> {
    let company = state
        .db
        .toggle_favorite(&id.to_string(), &user.id_string())
        .await?
        .ok_or_else(|| AppError::NotFound("Company not found".to_string()))?;
    Ok(Json(ApiData::new(company.to_info()?)))
}

#[cfg(test)]
mod tests {
    use crate::registry::RegistryClient;
    use crate::routes::test_support::{create_user, mock_registry, send, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_empty_search_is_rejected() {
        let (app, state) = test_app().await;
        let (_, token) = create_user(&state, "s@example.com").await;

        for uri in [
            "/api/companies/search-external?q=",
            "/api/companies/search-external?q=%20%20",
            "/api/companies/search-external",
        ] {
            let (status, body) = send(&app, Method::GET, uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["error"], "Search query is required");
        }
    }

    #[tokio::test]
    async fn test_save_favorite_and_remove() {
        let (app, state) = test_app().await;
        let (_, token) = create_user(&state, "c@example.com").await;

        for (number, name) in [("01234567", "ZETA LTD"), ("07654321", "ALPHA LTD")] {
            let (status, _) = send(
                &app,
                Method::POST,
                "/api/companies",
                Some(&token),
                Some(json!({"company_number": number, "company_name": name})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = send(&app, Method::GET, "/api/companies", Some(&token), None).await;
        let items = body["data"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["company_name"], "ALPHA LTD");

        let zeta_id = items[1]["id"].as_str().unwrap().to_string();
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/companies/{}/favorite", zeta_id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_favorite"], true);

        let (_, body) = send(&app, Method::GET, "/api/companies", Some(&token), None).await;
        assert_eq!(body["data"][0]["company_name"], "ZETA LTD");

        let uri = format!("/api/companies/{}", zeta_id);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_companies_are_private() {
        let (app, state) = test_app().await;
        let (_, owner) = create_user(&state, "owner@example.com").await;
        let (_, other) = create_user(&state, "other@example.com").await;

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/companies",
            Some(&owner),
            Some(json!({"company_number": "01234567", "company_name": "ACME LTD"})),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (_, body) = send(&app, Method::GET, "/api/companies", Some(&other), None).await;
        assert!(body["data"].as_array().unwrap().is_empty());

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/companies/{}", id),
            Some(&other),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search_hits_are_cached() {
        let (_, mut state) = test_app().await;
        state.config.registry.base_url = mock_registry().await;
        state.config.registry.api_key = "key".to_string();
        state.registry = RegistryClient::new(state.config.registry.clone());
        let app = crate::routes::create_router(state.clone());
        let (_, token) = create_user(&state, "s@example.com").await;

        let (status, body) = send(&app, Method::GET, "/api/companies/search-external?q=acme", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["items"][0]["accounts_due"], "2026-12-31");
        assert!(body["data"]["items"][1]["accounts_due"].is_null());

        let cached = state.db.list_cached_companies(10).await.unwrap();
        let mut numbers: Vec<&str> = cached.iter().map(|c| c.company_number.as_str()).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, vec!["01234567", "07654321"]);

        let (status, body) = send(&app, Method::GET, "/api/companies/search-external?q=other", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].is_string());

        let (status, _) = send(&app, Method::GET, "/api/companies/lookup/0123%3Fx%3D1", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
