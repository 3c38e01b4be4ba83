use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod admin;
mod auth;
mod companies;
mod documents;
mod extract;
mod health;
mod messages;
mod orders;
mod profile;
mod services;
mod ws;

pub use extract::{AdminUser, ApiJson, ApiPath, ApiQuery, AuthUser};

/// Multipart framing on top of the largest accepted file
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = state.config.storage.max_upload_bytes as usize + MULTIPART_OVERHEAD;

    let admin_routes = Router::new()
        .route("/orders", get(admin::list_orders))
        .route("/orders/stats", get(admin::order_stats))
        .route("/orders/:id", get(admin::get_order).patch(admin::update_order))
        .route("/orders/:id/messages", get(admin::order_messages))
        .route("/services", get(admin::list_services).post(admin::create_service))
        .route("/services/:id", put(admin::update_service).delete(admin::delete_service))
        .route("/messages", get(admin::threads))
        .route("/messages/send", post(admin::send_message))
        .route("/messages/mark-read", post(admin::mark_read))
        .route("/companies/search-external", get(admin::search_external))
        .route("/companies/cache", get(admin::cached_companies));

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        // Password reset
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        // Profile
        .route("/api/profile", get(profile::get_profile).put(profile::update_profile))
        // Companies
        .route("/api/companies/search-external", get(companies::search_external))
        .route("/api/companies/lookup/:number", get(companies::lookup))
        .route("/api/companies", get(companies::list).post(companies::save))
        .route("/api/companies/:id", delete(companies::remove))
        .route("/api/companies/:id/favorite", post(companies::toggle_favorite))
        // Catalog and orders
        .route("/api/services", get(services::list))
        .route("/api/orders", get(orders::list).post(orders::create))
        .route("/api/orders/:id", get(orders::get))
        .route("/api/orders/:id/confirm", post(orders::confirm))
        .route("/api/orders/:id/messages", get(messages::list_for_order))
        // Messaging
        .route("/api/messages/send", post(messages::send))
        .route("/api/messages/mark-read", post(messages::mark_read))
        .route("/api/messages/unread-count", get(messages::unread_count))
        .route(
            "/api/messages/upload",
            post(messages::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/attachments/:order_id/:file", get(messages::download))
        // Documents
        .route("/api/documents/bulk", post(documents::bulk))
        // Admin
        .nest("/api/admin", admin_routes)
        // WebSocket feed
        .route("/ws/messages", get(ws::ws_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        body::{to_bytes, Body, Bytes},
        http::{header, HeaderMap, Method, Request, StatusCode},
        Router,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{
        config::Config,
        db::{self, Database},
        routes::auth::generate_token,
        state::AppState,
    };

    /// Registry double: `acme` finds two companies, one of whose profiles fails;
    /// any other query is a 503.
    pub async fn mock_registry() -> String {
        use axum::{
            extract::{Path, Query},
            http::StatusCode,
            response::IntoResponse,
            routing::get,
            Json, Router,
        };
        use serde_json::json;
        use std::collections::HashMap;

        async fn search(Query(params): Query<HashMap<String, String>>) -> axum::response::Response {
            if params.get("q").map(String::as_str) != Some("acme") {
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
            Json(json!({
                "items": [
                    {"company_number": "01234567", "title": "ACME LIMITED", "company_status": "active"},
                    {"company_number": "07654321", "title": "ACME HOLDINGS LIMITED"}
                ],
                "total_results": 2,
                "start_index": 0,
                "items_per_page": 20
            }))
            .into_response()
        }

        async fn profile(Path(number): Path<String>) -> axum::response::Response {
            match number.as_str() {
                "01234567" => Json(json!({
                    "company_number": "01234567",
                    "company_name": "ACME LIMITED",
                    "company_status": "active",
                    "confirmation_statement": {"next_due": "2026-05-14"},
                    "accounts": {"next_due": "2026-12-31"}
                }))
                .into_response(),
                "07654321" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                _ => StatusCode::NOT_FOUND.into_response(),
            }
        }

        let app = Router::new()
            .route("/search/companies", get(search))
            .route("/company/:number", get(profile));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    pub async fn test_app() -> (Router, AppState) {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();

        let mut config = Config::default();
        config.auth.jwt_secret = "test-secret".to_string();
        config.storage.path = std::env::temp_dir()
            .join(format!("filings-test-{}", Uuid::new_v4()))
            .to_string_lossy()
            .into_owned();

        let state = AppState::new(db, config);
        (super::create_router(state.clone()), state)
    }

    /// Insert a user directly and return its id and a bearer token
    pub async fn create_user(state: &AppState, email: &str) -> (Uuid, String) {
        let id = Uuid::new_v4();
        state
            .db
            .create_user(&db::User {
                id: id.to_string(),
                email: email.to_string(),
                password_hash: "unused".to_string(),
                created_at: None,
            })
            .await
            .unwrap();
        let token = generate_token(&id.to_string(), &state.config.auth).unwrap();
        (id, token)
    }

    pub async fn make_admin(state: &AppState, user_id: Uuid) {
        state
            .db
            .create_admin_user(&db::AdminUser {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                role: "admin".to_string(),
                is_active: true,
                permissions: None,
            })
            .await
            .unwrap();
    }

    pub async fn insert_order(
        state: &AppState,
        user_id: Uuid,
        status: &str,
        payment_status: &str,
        amount: i64,
    ) -> Uuid {
        let id = Uuid::new_v4();
        state
            .db
            .create_order(&db::Order {
                id: id.to_string(),
                user_id: user_id.to_string(),
                stripe_payment_intent_id: None,
                amount,
                currency: "gbp".to_string(),
                status: status.to_string(),
                payment_status: payment_status.to_string(),
                service_type: "confirmation-statement".to_string(),
                metadata: None,
                created_at: None,
                updated_at: None,
            })
            .await
            .unwrap();
        id
    }

    pub async fn insert_service(state: &AppState, title: &str, price: i64) -> Uuid {
        let id = Uuid::new_v4();
        state
            .db
            .create_service(&db::Service {
                id: id.to_string(),
                title: title.to_string(),
                slug: shared::slugify(title),
                base_price: price,
                is_active: true,
                category: Some("filings".to_string()),
            })
            .await
            .unwrap();
        id
    }

    pub async fn send_raw(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    /// JSON request; the response body is parsed as JSON (`Null` when empty)
    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let (status, _, bytes) = send_raw(app, request).await;
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }
}
