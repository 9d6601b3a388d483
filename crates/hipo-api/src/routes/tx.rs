//! Operation endpoints
//!
//! Each request resolves once the signing bridge has answered; confirmation
//! is tracked in the background and shows up in `/state`.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use hipo_core::{Nano, ProtocolError};
use hton::parse_amount;

use crate::dto::{error_response, ApiError, ApiResult, TxAmountRequest, TxResponse};
use crate::AppState;

/// Create operation routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stake", post(stake))
        .route("/unstake", post(unstake))
        .route("/migrate", post(migrate))
        .route("/submit", post(submit))
        .route("/dismiss", post(dismiss))
}

fn parse_request_amount(text: &str) -> Result<Nano, (StatusCode, Json<ApiError>)> {
    parse_amount(text).nano().ok_or_else(|| {
        error_response(
            ProtocolError::InvalidAmount {
                message: format!("'{}' is not an amount", text),
            }
            .into(),
        )
    })
}

fn tx_response(state: &AppState) -> Json<TxResponse> {
    let (lifecycle, pending) = state
        .engine()
        .store()
        .read(|s| (s.lifecycle, s.pending.clone()));
    Json(TxResponse {
        lifecycle,
        correlation_id: pending.map(|p| hex::encode(p.correlation_id.0.to_be_bytes())),
    })
}

/// POST /tx/stake - Stake TON
pub async fn stake(
    State(state): State<AppState>,
    Json(request): Json<TxAmountRequest>,
) -> ApiResult<TxResponse> {
    let amount = parse_request_amount(&request.amount)?;
    state
        .engine()
        .submit_stake(amount)
        .await
        .map_err(error_response)?;
    Ok(tx_response(&state))
}

/// POST /tx/unstake - Unstake hTON
pub async fn unstake(
    State(state): State<AppState>,
    Json(request): Json<TxAmountRequest>,
) -> ApiResult<TxResponse> {
    let amount = parse_request_amount(&request.amount)?;
    state
        .engine()
        .submit_unstake(amount)
        .await
        .map_err(error_response)?;
    Ok(tx_response(&state))
}

/// POST /tx/migrate - Move the legacy balance to the current treasury
pub async fn migrate(State(state): State<AppState>) -> ApiResult<TxResponse> {
    state
        .engine()
        .submit_migration()
        .await
        .map_err(error_response)?;
    Ok(tx_response(&state))
}

/// POST /tx/submit - Stake or unstake the amount input by active tab
pub async fn submit(State(state): State<AppState>) -> ApiResult<TxResponse> {
    state.engine().submit().await.map_err(error_response)?;
    Ok(tx_response(&state))
}

/// POST /tx/dismiss - Acknowledge a confirmation timeout
pub async fn dismiss(State(state): State<AppState>) -> ApiResult<TxResponse> {
    state.engine().dismiss_timeout().map_err(error_response)?;
    Ok(tx_response(&state))
}
