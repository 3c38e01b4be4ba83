use axum::{extract::State, Json};
use shared::{ApiData, ServiceInfo};

use crate::{db::Service, error::AppResult, state::AppState};

/// GET /api/services
pub async fn list(State(state): State<AppState>) -> AppResult<Json<ApiData<Vec<ServiceInfo>>>> {
    let services = state
        .db
        .list_services(true)
        .await?
        .iter()
        .map(Service::to_info)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(ApiData::new(services)))
}
