use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use shared::{
    ApiData, Attachment, FeedEvent, MarkReadRequest, MarkReadResponse, MessageInfo,
    SendMessageRequest, UnreadCount,
};
use uuid::Uuid;

use crate::{
    db::{Message, Order},
    error::{AppError, AppResult},
    mailer::new_message_email,
    routes::{
        orders::{accessible_order, owned_order},
        ApiJson, ApiPath, AuthUser,
    },
    state::AppState,
    storage::{validate_upload, UploadRejection},
};

/// Who is writing into a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Sender {
    Customer,
    Admin,
}

pub(super) fn to_infos(messages: &[Message]) -> AppResult<Vec<MessageInfo>> {
    Ok(messages
        .iter()
        .map(Message::to_info)
        .collect::<anyhow::Result<Vec<_>>>()?)
}

/// Persist a message with the read flags of its sender and push it to feed subscribers
pub(super) async fn post_message(
    state: &AppState,
    order: &Order,
    sender_id: Uuid,
    sender: Sender,
    req: SendMessageRequest,
) -> AppResult<MessageInfo> {
    let text = req.message_text.trim().to_string();
    if text.is_empty() && req.attachments.is_empty() {
        return Err(AppError::BadRequest(
            "Message text or an attachment is required".to_string(),
        ));
    }

    let is_admin = sender == Sender::Admin;
    let attachments = if req.attachments.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&req.attachments).map_err(anyhow::Error::from)?)
    };

    let stored = state
        .db
        .insert_message(&Message {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            sender_id: sender_id.to_string(),
            is_admin,
            message_text: text,
            attachments,
            read_by_user: !is_admin,
            read_by_admin: is_admin,
            created_at: None,
        })
        .await?;
    let message = stored.to_info()?;

    state
        .hub
        .publish(
            message.order_id,
            FeedEvent::NewMessage {
                message: message.clone(),
            },
        );

    Ok(message)
}

/// GET /api/orders/:id/messages
pub async fn list_for_order(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(order_id): ApiPath<Uuid>,
) -> AppResult<Json<ApiData<Vec<MessageInfo>>>> {
    let order = owned_order(&state, order_id, &user).await?;
    let messages = state.db.list_messages(&order.id).await?;
    Ok(Json(ApiData::new(to_infos(&messages)?)))
}

/// POST /api/messages/send
pub async fn send(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> AppResult<Json<ApiData<MessageInfo>>> {
    let order = owned_order(&state, req.order_id, &user).await?;
    let message = post_message(&state, &order, user.user_id, Sender::Customer, req).await?;

    if let Some(support) = state.mailer.support_email() {
        let admin_url = format!(
            "{}/admin/messages?order={}",
            state.config.server.public_url.trim_end_matches('/'),
            order.id
        );
        state.mailer.send_in_background(
            support.to_string(),
            format!("New message on order {}", order.id),
            new_message_email(&order.id, &message.message_text, &admin_url),
        );
    }

    Ok(Json(ApiData::new(message)))
}

/// POST /api/messages/mark-read
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<MarkReadRequest>,
) -> AppResult<Json<ApiData<MarkReadResponse>>> {
    let order = owned_order(&state, req.order_id, &user).await?;
    let updated = state.db.mark_read_by_user(&order.id).await?;

    if updated > 0 {
        state
            .hub
            .publish(
                req.order_id,
                FeedEvent::MessagesRead {
                    order_id: req.order_id,
                    by_admin: false,
                },
            );
    }

    Ok(Json(ApiData::new(MarkReadResponse {
        order_id: req.order_id,
        updated,
    })))
}

/// GET /api/messages/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiData<UnreadCount>>> {
    let unread = state.db.unread_for_user(&user.id_string()).await?;
    Ok(Json(ApiData::new(UnreadCount { unread })))
}

fn multipart_error(err: MultipartError, max: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::BadRequest(UploadRejection::TooLarge { size: max + 1, max }.to_string())
    } else {
        AppError::BadRequest(format!("Invalid upload: {}", err.body_text()))
    }
}

/// POST /api/messages/upload (multipart: `order_id`, `file`)
pub async fn upload(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<Json<ApiData<Attachment>>> {
    let max = state.config.storage.max_upload_bytes;
    let mut order_id: Option<Uuid> = None;
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("order_id") => {
                let raw = field.text().await.map_err(|e| multipart_error(e, max))?;
                order_id = Some(
                    Uuid::parse_str(raw.trim())
                        .map_err(|_| AppError::BadRequest("Invalid order_id".to_string()))?,
                );
            }
            Some("file") => {
                let name = field.file_name().unwrap_or("file").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, max))?;
                file = Some((name, content_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let order_id = order_id.ok_or_else(|| AppError::BadRequest("order_id is required".to_string()))?;
    let (name, content_type, bytes) =
        file.ok_or_else(|| AppError::BadRequest("file is required".to_string()))?;

    accessible_order(&state, order_id, &user).await?;

    validate_upload(&content_type, bytes.len() as u64, max)
        .map_err(|rejection| AppError::BadRequest(rejection.to_string()))?;

    let attachment = state
        .storage
        .save_attachment(&order_id, &name, &content_type, &bytes)
        .await?;

    tracing::info!(
        "Stored {} ({} bytes) for order {}",
        attachment.file_name,
        attachment.size,
        order_id
    );
    Ok(Json(ApiData::new(attachment)))
}

/// GET /api/attachments/:order_id/:file
pub async fn download(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath((order_id, stored_name)): ApiPath<(Uuid, String)>,
) -> AppResult<impl IntoResponse> {
    let order = accessible_order(&state, order_id, &user).await?;

    let bytes = state
        .storage
        .read_attachment(&order_id, &stored_name)
        .await?
        .ok_or_else(|| AppError::NotFound("Attachment not found".to_string()))?;

    // Recover the original name and type from the message that carries it
    let suffix = format!("/{}", stored_name);
    let described = to_infos(&state.db.list_messages(&order.id).await?)?
        .into_iter()
        .flat_map(|m| m.attachments)
        .find(|a| a.path.ends_with(&suffix));
    let (file_name, content_type) = match described {
        Some(a) => (a.file_name, a.content_type),
        None => (stored_name, "application/octet-stream".to_string()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    ))
}
