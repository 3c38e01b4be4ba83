use axum::{extract::State, http::header, response::IntoResponse};
use shared::{checked_total, BulkDocumentRequest};

use crate::{
    db::Service,
    documents::build_archive,
    error::{AppError, AppResult},
    routes::{orders::resolve_services, ApiJson, AuthUser},
    state::AppState,
};

const ARCHIVE_NAME: &str = "company-documents.zip";

/// POST /api/documents/bulk → ZIP with one PDF per company
pub async fn bulk(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<BulkDocumentRequest>,
) -> AppResult<impl IntoResponse> {
    if req.companies.is_empty() {
        return Err(AppError::BadRequest("Select at least one company".to_string()));
    }
    if req.service_ids.is_empty() {
        return Err(AppError::BadRequest("Select at least one service".to_string()));
    }

    let services = resolve_services(&state, &req.service_ids, false)
        .await?
        .iter()
        .map(Service::to_info)
        .collect::<anyhow::Result<Vec<_>>>()?;
    if checked_total(services.iter().map(|s| s.base_price)).is_none() {
        return Err(AppError::BadRequest("Order total is too large".to_string()));
    }

    let company_count = req.companies.len();
    let archive = build_archive(
        req.companies,
        services,
        state.payments.currency().to_string(),
        state.config.server.public_url.clone(),
    )
    .await?;

    tracing::info!(
        "Built document archive for user {} ({} companies, {} bytes)",
        user.user_id,
        company_count,
        archive.len()
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", ARCHIVE_NAME),
            ),
        ],
        archive,
    ))
}
