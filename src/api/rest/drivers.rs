//! Driver catalog endpoint

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::{ApiError, ApiResponse, ReadState};

/// GET /api/drivers - All seeded drivers, ordered by car number
pub async fn list_drivers(State(state): State<Arc<ReadState>>) -> impl IntoResponse {
    match state.store.drivers().await {
        Ok(mut drivers) => {
            drivers.sort_by_key(|d| d.driver_number);
            let total = drivers.len();
            Json(ApiResponse::with_total(drivers, total)).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::internal(e.to_string())),
        )
            .into_response(),
    }
}
