use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use parkcell_core::types::{CellTypeId, LotId};
use parkcell_core::ParkingError;

// ─── Request Types ──────────────────────────────────────────────────────────

/// Body of `POST /customers/{id}/reservations`; the customer comes from the path.
#[derive(Deserialize)]
pub struct CustomerReservationRequest {
    pub plate: String,
    pub vehicle_type_id: CellTypeId,
    pub lot_id: LotId,
}

#[derive(Deserialize)]
pub struct SetCellStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct EmailQuery {
    #[serde(default)]
    pub email: String,
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            code: None,
            error: None,
        }
    }

    pub fn err(code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            code: Some(code),
            error: Some(msg.into()),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_reservations: usize,
    pub version: String,
}

#[derive(Serialize)]
pub struct CapacityResponse {
    pub lot_id: LotId,
    pub created: usize,
}

// ─── Error Mapping ──────────────────────────────────────────────────────────

/// Engine error on its way out as a JSON response.
pub struct ApiError(pub ParkingError);

impl From<ParkingError> for ApiError {
    fn from(e: ParkingError) -> Self {
        Self(e)
    }
}

pub fn status_for(e: &ParkingError) -> StatusCode {
    match e {
        ParkingError::NotFound(_) => StatusCode::NOT_FOUND,
        ParkingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ParkingError::InvalidState(_) | ParkingError::Conflict(_) => StatusCode::CONFLICT,
        ParkingError::Configuration(_) | ParkingError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(code = self.0.kind(), error = %self.0, "Request failed");
        } else {
            tracing::info!(code = self.0.kind(), error = %self.0, "Request rejected");
        }
        (
            status,
            Json(ApiResponse::<()>::err(self.0.kind(), self.0.to_string())),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::ok(data))))
}

pub fn created<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(data))))
}
