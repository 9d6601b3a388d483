//! Request and response bodies

use axum::{http::StatusCode, Json};
use hipo_core::{Address, Network};
use hipo_sync::{Lifecycle, Tab, View, WalletAccount};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub network: Network,
    pub endpoint_connected: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkRequest {
    pub network: Network,
}

/// Wallet connection change; `null` disconnects
#[derive(Debug, Clone, Deserialize)]
pub struct AccountRequest {
    pub account: Option<WalletAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewRequest {
    pub view: View,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TabRequest {
    pub tab: Tab,
}

/// Amount input; `max` fills in the maximum for the active tab
#[derive(Debug, Clone, Deserialize)]
pub struct AmountRequest {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub max: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferrerRequest {
    pub referrer: Option<Address>,
}

/// Amount in TON or hTON as typed ("12.5")
#[derive(Debug, Clone, Deserialize)]
pub struct TxAmountRequest {
    pub amount: String,
}

/// Lifecycle after an operation request
#[derive(Debug, Clone, Serialize)]
pub struct TxResponse {
    pub lifecycle: Lifecycle,
    /// Hex correlation id of the tracked operation
    pub correlation_id: Option<String>,
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<hipo_core::Error> for ApiError {
    fn from(e: hipo_core::Error) -> Self {
        Self::new(e.error_code(), e.to_string())
    }
}

/// Map an engine error to its status and body
pub fn error_response(e: hipo_core::Error) -> (StatusCode, Json<ApiError>) {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiError::from(e)))
}
