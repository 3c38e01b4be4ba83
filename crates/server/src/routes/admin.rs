//! Back-office endpoints. Every handler takes `AdminUser`, so non-admins get 403.

use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use shared::{
    slugify, Ack, AdminOrdersResponse, ApiData, CachedCompany, CreateServiceRequest, FeedEvent,
    MarkReadRequest, MarkReadResponse, MessageInfo, OrderInfo, OrderStats, OrderStatus,
    SearchResults, SendMessageRequest, ServiceInfo, ThreadSummary, UpdateOrderRequest,
    UpdateServiceRequest,
};
use uuid::Uuid;

use crate::{
    db::{Order, Service, ThreadRow},
    error::{AppError, AppResult},
    routes::{
        companies::{search_and_cache, SearchParams},
        messages::{post_message, to_infos, Sender},
        orders::find_order,
        AdminUser, ApiJson, ApiPath, ApiQuery,
    },
    state::AppState,
};

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ListParams {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    fn status(&self) -> AppResult<Option<OrderStatus>> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e: shared::ParseStatusError| AppError::BadRequest(e.to_string())),
        }
    }
}

async fn recent_orders(state: &AppState, params: &ListParams) -> AppResult<Vec<OrderInfo>> {
    let status = params.status()?;
    let orders = state
        .db
        .list_recent_orders(params.limit(), status.as_ref().map(OrderStatus::as_str))
        .await?
        .iter()
        .map(Order::to_info)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(orders)
}

/// GET /api/admin/orders?limit=&status=
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> AppResult<Json<ApiData<AdminOrdersResponse>>> {
    let orders = recent_orders(&state, &params).await?;
    let stats = OrderStats::from_orders(&orders);
    Ok(Json(ApiData::new(AdminOrdersResponse { orders, stats })))
}

/// GET /api/admin/orders/stats?limit=
pub async fn order_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> AppResult<Json<ApiData<OrderStats>>> {
    let orders = recent_orders(&state, &params).await?;
    Ok(Json(ApiData::new(OrderStats::from_orders(&orders))))
}

/// GET /api/admin/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiData<OrderInfo>>> {
    let order = find_order(&state, id).await?;
    Ok(Json(ApiData::new(order.to_info()?)))
}

/// PATCH /api/admin/orders/:id
pub async fn update_order(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateOrderRequest>,
) -> AppResult<Json<ApiData<OrderInfo>>> {
    if req.status.is_none() && req.payment_status.is_none() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }
    let order = find_order(&state, id).await?;

    if let Some(status) = req.status {
        state.db.update_order_status(&order.id, status.as_str()).await?;
    }
    if let Some(payment_status) = req.payment_status {
        state
            .db
            .update_payment_status(&order.id, payment_status.as_str())
            .await?;
    }

    tracing::info!("Order {} updated by admin {}", order.id, admin.user_id);

    let order = find_order(&state, id).await?;
    Ok(Json(ApiData::new(order.to_info()?)))
}

// ============================================================================
// Service catalog
// ============================================================================

fn validate_service(service: &Service) -> AppResult<()> {
    if service.title.trim().is_empty() {
        return Err(AppError::BadRequest("Service title is required".to_string()));
    }
    if service.slug.is_empty() {
        return Err(AppError::BadRequest("Service slug is required".to_string()));
    }
    if service.base_price < 0 {
        return Err(AppError::BadRequest("Price cannot be negative".to_string()));
    }
    Ok(())
}

async fn ensure_slug_free(state: &AppState, slug: &str, except_id: Option<&str>) -> AppResult<()> {
    let taken = state
        .db
        .list_services(false)
        .await?
        .iter()
        .any(|s| s.slug == slug && Some(s.id.as_str()) != except_id);
    if taken {
        return Err(AppError::BadRequest(format!(
            "A service with slug '{}' already exists",
            slug
        )));
    }
    Ok(())
}

/// GET /api/admin/services (inactive included)
pub async fn list_services(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<ApiData<Vec<ServiceInfo>>>> {
    let services = state
        .db
        .list_services(false)
        .await?
        .iter()
        .map(Service::to_info)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(ApiData::new(services)))
}

/// POST /api/admin/services
pub async fn create_service(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(req): ApiJson<CreateServiceRequest>,
) -> AppResult<Json<ApiData<ServiceInfo>>> {
    let slug = slugify(req.slug.as_deref().unwrap_or(&req.title));
    let service = Service {
        id: Uuid::new_v4().to_string(),
        title: req.title.trim().to_string(),
        slug,
        base_price: req.base_price,
        is_active: req.is_active,
        category: req.category.filter(|c| !c.trim().is_empty()),
    };
    validate_service(&service)?;
    ensure_slug_free(&state, &service.slug, None).await?;

    state.db.create_service(&service).await?;
    tracing::info!("Service '{}' created", service.slug);

    Ok(Json(ApiData::new(service.to_info()?)))
}

/// PUT /api/admin/services/:id
pub async fn update_service(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateServiceRequest>,
) -> AppResult<Json<ApiData<ServiceInfo>>> {
    let mut service = state
        .db
        .get_service(&id.to_string())
        .await?
        .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;

    if let Some(title) = req.title {
        service.title = title.trim().to_string();
    }
    if let Some(slug) = req.slug {
        service.slug = slugify(&slug);
    }
    if let Some(price) = req.base_price {
        service.base_price = price;
    }
    if let Some(active) = req.is_active {
        service.is_active = active;
    }
    if let Some(category) = req.category {
        service.category = Some(category).filter(|c| !c.trim().is_empty());
    }

    validate_service(&service)?;
    ensure_slug_free(&state, &service.slug, Some(&service.id)).await?;
    state.db.update_service(&service).await?;

    Ok(Json(ApiData::new(service.to_info()?)))
}

/// DELETE /api/admin/services/:id
pub async fn delete_service(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiData<Ack>>> {
    if !state.db.delete_service(&id.to_string()).await? {
        return Err(AppError::NotFound("Service not found".to_string()));
    }
    Ok(Json(ApiData::new(Ack::ok("Service deleted"))))
}

// ============================================================================
// Messages
// ============================================================================

/// GET /api/admin/messages
pub async fn threads(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<ApiData<Vec<ThreadSummary>>>> {
    let threads = state
        .db
        .message_threads()
        .await?
        .iter()
        .map(ThreadRow::to_info)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(ApiData::new(threads)))
}

/// GET /api/admin/orders/:id/messages
pub async fn order_messages(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiData<Vec<MessageInfo>>>> {
    let order = find_order(&state, id).await?;
    let messages = state.db.list_messages(&order.id).await?;
    Ok(Json(ApiData::new(to_infos(&messages)?)))
}

/// POST /api/admin/messages/send
pub async fn send_message(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> AppResult<Json<ApiData<MessageInfo>>> {
    let order = find_order(&state, req.order_id).await?;
    let message = post_message(&state, &order, admin.user_id, Sender::Admin, req).await?;
    Ok(Json(ApiData::new(message)))
}

/// POST /api/admin/messages/mark-read
pub async fn mark_read(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(req): ApiJson<MarkReadRequest>,
) -> AppResult<Json<ApiData<MarkReadResponse>>> {
    let order = find_order(&state, req.order_id).await?;
    let updated = state.db.mark_read_by_admin(&order.id).await?;

    if updated > 0 {
        state
            .hub
            .publish(
                req.order_id,
                FeedEvent::MessagesRead {
                    order_id: req.order_id,
                    by_admin: true,
                },
            );
    }

    Ok(Json(ApiData::new(MarkReadResponse {
        order_id: req.order_id,
        updated,
    })))
}

// ============================================================================
// Companies
// ============================================================================

/// GET /api/admin/companies/search-external?q=
pub async fn search_external(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> AppResult<Json<ApiData<SearchResults>>> {
    let results = search_and_cache(&state, &params).await?;
    Ok(Json(ApiData::new(results)))
}

/// GET /api/admin/companies/cache?limit=
pub async fn cached_companies(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> AppResult<Json<ApiData<Vec<CachedCompany>>>> {
    let companies = state
        .db
        .list_cached_companies(params.limit())
        .await?
        .into_iter()
        .map(CachedCompany::from)
        .collect();
    Ok(Json(ApiData::new(companies)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{create_user, insert_order, make_admin, send, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    async fn admin_app() -> (axum::Router, AppState, String) {
        let (app, state) = test_app().await;
        let (admin_id, token) = create_user(&state, "admin@example.com").await;
        make_admin(&state, admin_id).await;
        (app, state, token)
    }

    #[test]
    fn test_list_params() {
        assert_eq!(ListParams::default().limit(), 100);
        let params = ListParams {
            limit: Some(5000),
            status: Some("completed".to_string()),
        };
        assert_eq!(params.limit(), 1000);
        assert_eq!(params.status().unwrap(), Some(OrderStatus::Completed));

        let bad = ListParams {
            limit: Some(0),
            status: Some("shipped".to_string()),
        };
        assert_eq!(bad.limit(), 1);
        assert!(bad.status().is_err());
    }

    #[tokio::test]
    async fn test_admin_gate() {
        let (app, state, _) = admin_app().await;
        let (_, customer) = create_user(&state, "customer@example.com").await;

        for uri in ["/api/admin/orders", "/api/admin/services", "/api/admin/messages"] {
            let (status, body) = send(&app, Method::GET, uri, Some(&customer), None).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
            assert_eq!(body["error"], "Admin access required");

            let (status, _) = send(&app, Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_orders_with_stats() {
        let (app, state, admin) = admin_app().await;
        let (customer_id, _) = create_user(&state, "customer@example.com").await;

        insert_order(&state, customer_id, "completed", "paid", 4999).await;
        insert_order(&state, customer_id, "processing", "paid", 7500).await;
        insert_order(&state, customer_id, "pending", "pending", 12000).await;
        insert_order(&state, customer_id, "cancelled", "refunded", 3000).await;
        insert_order(&state, customer_id, "pending", "failed", 2500).await;

        let (status, body) = send(&app, Method::GET, "/api/admin/orders", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 5);
        assert_eq!(
            body["data"]["stats"],
            json!({
                "total_orders": 5,
                "completed_orders": 1,
                "pending_orders": 2,
                "revenue": 12499
            })
        );

        let (_, body) = send(
            &app,
            Method::GET,
            "/api/admin/orders?status=pending&limit=1",
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"]["orders"][0]["status"], "pending");

        let (status, body) = send(&app, Method::GET, "/api/admin/orders/stats", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["revenue"], 12499);

        let (status, _) = send(&app, Method::GET, "/api/admin/orders?status=shipped", Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_order_status() {
        let (app, state, admin) = admin_app().await;
        let (customer_id, _) = create_user(&state, "customer@example.com").await;
        let order_id = insert_order(&state, customer_id, "processing", "paid", 4999).await;
        let uri = format!("/api/admin/orders/{}", order_id);

        let (status, body) = send(&app, Method::PATCH, &uri, Some(&admin), Some(json!({"status": "completed"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "completed");
        assert_eq!(body["data"]["payment_status"], "paid");

        let (status, _) = send(&app, Method::PATCH, &uri, Some(&admin), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = format!("/api/admin/orders/{}", Uuid::new_v4());
        let (status, _) = send(&app, Method::PATCH, &missing, Some(&admin), Some(json!({"status": "completed"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_service_crud() {
        let (app, _state, admin) = admin_app().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/admin/services",
            Some(&admin),
            Some(json!({"title": "Confirmation Statement", "base_price": 4999, "category": "annual"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["slug"], "confirmation-statement");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/admin/services",
            Some(&admin),
            Some(json!({"title": "Confirmation statement", "base_price": 100})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/admin/services",
            Some(&admin),
            Some(json!({"title": "Negative", "base_price": -1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/admin/services/{}", id);
        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&admin),
            Some(json!({"base_price": 5999, "is_active": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["base_price"], 5999);
        assert_eq!(body["data"]["title"], "Confirmation Statement");

        let (_, body) = send(&app, Method::GET, "/api/services", None, None).await;
        assert!(body["data"].as_array().unwrap().is_empty());

        let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_messaging_flags() {
        let (app, state, admin) = admin_app().await;
        let (customer_id, customer) = create_user(&state, "customer@example.com").await;
        let order_id = insert_order(&state, customer_id, "processing", "paid", 4999).await;

        send(
            &app,
            Method::POST,
            "/api/messages/send",
            Some(&customer),
            Some(json!({"order_id": order_id, "message_text": "Hello"})),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/admin/messages/send",
            Some(&admin),
            Some(json!({"order_id": order_id, "message_text": "Filed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_admin"], true);
        assert_eq!(body["data"]["read_by_admin"], true);
        assert_eq!(body["data"]["read_by_user"], false);

        let (_, body) = send(&app, Method::GET, "/api/admin/messages", Some(&admin), None).await;
        assert_eq!(body["data"][0]["message_count"], 2);
        assert_eq!(body["data"][0]["unread_by_admin"], 1);
        assert_eq!(body["data"][0]["last_message"], "Filed");

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/admin/messages/mark-read",
            Some(&admin),
            Some(json!({"order_id": order_id})),
        )
        .await;
        assert_eq!(body["data"]["updated"], 1);

        let (_, body) = send(
            &app,
            Method::GET,
            &format!("/api/admin/orders/{}/messages", order_id),
            Some(&admin),
            None,
        )
        .await;
        let thread = body["data"].as_array().unwrap();
        assert_eq!(thread[0]["read_by_admin"], true);
        // The admin reading does not mark the admin's own reply as read by the customer
        assert_eq!(thread[1]["read_by_user"], false);
    }

    #[tokio::test]
    async fn test_cache_listing() {
        let (app, state, admin) = admin_app().await;
        let company = shared::CompanySummary {
            company_number: "01234567".to_string(),
            company_name: "ACME LTD".to_string(),
            ..Default::default()
        };
        state.db.upsert_cached_company(&(&company).into()).await.unwrap();

        let (status, body) = send(&app, Method::GET, "/api/admin/companies/cache?limit=10", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["company_number"], "01234567");
    }
}
