use axum::{
    extract::State,
    Json,
};
use shared::{
    checked_total, ApiData, CreateOrderRequest, CreateOrderResponse, OrderInfo, OrderItem,
    OrderMetadata, OrderStatus, PaymentStatus,
};
use uuid::Uuid;

use crate::{
    db::{Order, Service},
    error::{AppError, AppResult},
    routes::{ApiJson, ApiPath, AuthUser},
    state::AppState,
};

pub(super) async fn find_order(state: &AppState, order_id: Uuid) -> AppResult<Order> {
    state
        .db
        .get_order(&order_id.to_string())
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// The order, if the caller placed it
pub(super) async fn owned_order(state: &AppState, order_id: Uuid, user: &AuthUser) -> AppResult<Order> {
    let order = find_order(state, order_id).await?;
    if order.user_id != user.id_string() {
        return Err(AppError::Forbidden(
            "You do not have access to this order".to_string(),
        ));
    }
    Ok(order)
}

/// The order, if the caller placed it or is an active admin
pub(super) async fn accessible_order(
    state: &AppState,
    order_id: Uuid,
    user: &AuthUser,
) -> AppResult<Order> {
    let order = find_order(state, order_id).await?;
    if order.user_id != user.id_string()
        && state.db.get_active_admin(&user.id_string()).await?.is_none()
    {
        return Err(AppError::Forbidden(
            "You do not have access to this order".to_string(),
        ));
    }
    Ok(order)
}

/// Requested ids resolved against the active catalog, in request order.
/// Duplicates collapse; any unknown or inactive id is an error.
pub(super) async fn resolve_services(
    state: &AppState,
    service_ids: &[Uuid],
    active_only: bool,
) -> AppResult<Vec<Service>> {
    let mut ids: Vec<String> = Vec::with_capacity(service_ids.len());
    for id in service_ids {
        let id = id.to_string();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(AppError::BadRequest("At least one service is required".to_string()));
    }

    let mut found = state.db.get_services_by_ids(&ids).await?;
    if active_only {
        found.retain(|s| s.is_active);
    }

    ids.iter()
        .map(|id| {
            found
                .iter()
                .find(|s| &s.id == id)
                .cloned()
                .ok_or_else(|| AppError::BadRequest(format!("Unknown or inactive service: {}", id)))
        })
        .collect()
}

/// POST /api/orders
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> AppResult<Json<ApiData<CreateOrderResponse>>> {
    let company_number = req.company_number.trim().to_uppercase();
    if company_number.is_empty() {
        return Err(AppError::BadRequest("Company number is required".to_string()));
    }

    let services = resolve_services(&state, &req.service_ids, true).await?;
    let amount = checked_total(services.iter().map(|s| s.base_price))
        .ok_or_else(|| AppError::BadRequest("Order total is too large".to_string()))?;

    let items = services
        .iter()
        .map(|s| {
            Ok(OrderItem {
                service_id: Uuid::parse_str(&s.id)?,
                service_title: s.title.clone(),
                service_slug: s.slug.clone(),
                company_number: company_number.clone(),
                company_name: req.company_name.clone(),
                price: s.base_price,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let service_type = services
        .iter()
        .map(|s| s.slug.as_str())
        .collect::<Vec<_>>()
        .join(",");

    let order_id = Uuid::new_v4();
    let intent = state
        .payments
        .create_intent(
            amount,
            &[
                ("order_id", order_id.to_string()),
                ("user_id", user.id_string()),
                ("company_number", company_number.clone()),
                ("services", service_type.clone()),
            ],
        )
        .await?;

    let metadata = OrderMetadata {
        items,
        notes: req.notes.filter(|n| !n.trim().is_empty()),
    };
    let row = Order {
        id: order_id.to_string(),
        user_id: user.id_string(),
        stripe_payment_intent_id: Some(intent.id.clone()),
        amount,
        currency: state.payments.currency().to_string(),
        status: OrderStatus::Pending.as_str().to_string(),
        payment_status: PaymentStatus::Pending.as_str().to_string(),
        service_type,
        metadata: Some(serde_json::to_string(&metadata).map_err(anyhow::Error::from)?),
        created_at: None,
        updated_at: None,
    };
    state.db.create_order(&row).await?;

    tracing::info!(
        "Order {} created for {} ({} services, {} minor units)",
        order_id,
        company_number,
        services.len(),
        amount
    );

    let order = find_order(&state, order_id).await?.to_info()?;
    Ok(Json(ApiData::new(CreateOrderResponse {
        order,
        client_secret: intent.client_secret,
    })))
}

/// GET /api/orders
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiData<Vec<OrderInfo>>>> {
    let orders = state
        .db
        .list_orders_for_user(&user.id_string())
        .await?
        .iter()
        .map(Order::to_info)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(ApiData::new(orders)))
}

/// GET /api/orders/:id
pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiData<OrderInfo>>> {
    let order = owned_order(&state, id, &user).await?;
    Ok(Json(ApiData::new(order.to_info()?)))
}

/// POST /api/orders/:id/confirm
///
/// Pulls the payment intent's current status from the processor and records it.
pub async fn confirm(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiData<OrderInfo>>> {
    let order = owned_order(&state, id, &user).await?;
    let intent_id = order
        .stripe_payment_intent_id
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Order has no payment intent".to_string()))?;

    let intent = state.payments.retrieve_intent(intent_id).await?;
    let payment_status = PaymentStatus::from_intent_status(&intent.status);

    state
        .db
        .update_payment_status(&order.id, payment_status.as_str())
        .await?;
    if payment_status == PaymentStatus::Paid && order.status == OrderStatus::Pending.as_str() {
        state
            .db
            .update_order_status(&order.id, OrderStatus::Processing.as_str())
            .await?;
    }

    tracing::info!("Order {} payment is now {}", order.id, payment_status);

    let order = find_order(&state, id).await?.to_info()?;
    Ok(Json(ApiData::new(order)))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{
        create_user, insert_order, insert_service, send, send_raw, test_app,
    };
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_order_access() {
        let (app, state) = test_app().await;
        let (owner_id, owner) = create_user(&state, "owner@example.com").await;
        let (_, stranger) = create_user(&state, "stranger@example.com").await;
        let order_id = insert_order(&state, owner_id, "pending", "pending", 4999).await;
        let uri = format!("/api/orders/{}", order_id);

        let (status, body) = send(&app, Method::GET, &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["amount"], 4999);
        assert_eq!(body["data"]["status"], "pending");

        let (status, _) = send(&app, Method::GET, &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let missing = format!("/api/orders/{}", Uuid::new_v4());
        let (status, body) = send(&app, Method::GET, &missing, Some(&owner), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Order not found");
    }

    #[tokio::test]
    async fn test_list_only_own_orders() {
        let (app, state) = test_app().await;
        let (a_id, a) = create_user(&state, "a@example.com").await;
        let (b_id, _) = create_user(&state, "b@example.com").await;
        let first = insert_order(&state, a_id, "pending", "pending", 100).await;
        let second = insert_order(&state, a_id, "completed", "paid", 200).await;
        insert_order(&state, b_id, "pending", "pending", 300).await;

        let (status, body) = send(&app, Method::GET, "/api/orders", Some(&a), None).await;
        assert_eq!(status, StatusCode::OK);
        let orders = body["data"].as_array().unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0]["id"], second.to_string());
        assert_eq!(orders[1]["id"], first.to_string());
    }

    #[tokio::test]
    async fn test_create_order_validates_services() {
        let (app, state) = test_app().await;
        let (_, token) = create_user(&state, "buyer@example.com").await;
        insert_service(&state, "Confirmation Statement", 4999).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/orders",
            Some(&token),
            Some(json!({"company_number": "01234567", "company_name": "ACME LTD", "service_ids": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "At least one service is required");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/orders",
            Some(&token),
            Some(json!({
                "company_number": "01234567",
                "company_name": "ACME LTD",
                "service_ids": [Uuid::new_v4()]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_confirm_without_intent() {
        let (app, state) = test_app().await;
        let (owner_id, owner) = create_user(&state, "owner@example.com").await;
        let order_id = insert_order(&state, owner_id, "pending", "pending", 4999).await;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/orders/{}/confirm", order_id),
            Some(&owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Order has no payment intent");
    }

    #[tokio::test]
    async fn test_order_total_overflow_is_rejected() {
        let (app, state) = test_app().await;
        let (_, token) = create_user(&state, "buyer@example.com").await;
        let huge = insert_service(&state, "Everything", i64::MAX).await;
        let small = insert_service(&state, "Confirmation Statement", 1).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/orders",
            Some(&token),
            Some(json!({
                "company_number": "01234567",
                "company_name": "ACME LTD",
                "service_ids": [huge, small]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Order total is too large");
    }

    #[tokio::test]
    async fn test_malformed_path_uses_error_envelope() {
        let (app, state) = test_app().await;
        let (_, token) = create_user(&state, "buyer@example.com").await;

        let request = Request::builder()
            .uri("/api/orders/not-a-uuid")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, headers, bytes) = send_raw(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_envelope() {
        let (app, state) = test_app().await;
        let (_, token) = create_user(&state, "buyer@example.com").await;

        for (content_type, payload) in [
            (Some("application/json"), "{\"company_number\": "),
            (Some("application/json"), "{\"company_number\": 5}"),
            (None, "{}"),
        ] {
            let mut builder = Request::builder()
                .method(Method::POST)
                .uri("/api/orders")
                .header(header::AUTHORIZATION, format!("Bearer {}", token));
            if let Some(content_type) = content_type {
                builder = builder.header(header::CONTENT_TYPE, content_type);
            }
            let request = builder.body(Body::from(payload)).unwrap();

            let (status, _, bytes) = send_raw(&app, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {}", payload);
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert!(body["error"].is_string(), "payload {}", payload);
        }
    }
}
