//! Engine state and UI selection endpoints
//!
//! Every selection change answers with the updated engine snapshot.

use axum::{extract::State, routing::post, Json, Router};
use hipo_sync::EngineSnapshot;

use crate::dto::{
    AccountRequest, AmountRequest, NetworkRequest, ReferrerRequest, TabRequest, ViewRequest,
    VisibilityRequest,
};
use crate::AppState;

/// Create session routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/network", post(select_network))
        .route("/account", post(set_account))
        .route("/visibility", post(set_visibility))
        .route("/view", post(set_view))
        .route("/tab", post(set_tab))
        .route("/amount", post(set_amount))
        .route("/referrer", post(set_referrer))
}

/// GET /state - Selection, mirrored state, derived values, and lifecycle
pub async fn get_state(State(state): State<AppState>) -> Json<EngineSnapshot> {
    Json(state.engine().snapshot())
}

/// POST /session/network
pub async fn select_network(
    State(state): State<AppState>,
    Json(request): Json<NetworkRequest>,
) -> Json<EngineSnapshot> {
    state.engine().select_network(request.network);
    Json(state.engine().snapshot())
}

/// POST /session/account - Wallet connected (or `null` when disconnected)
pub async fn set_account(
    State(state): State<AppState>,
    Json(request): Json<AccountRequest>,
) -> Json<EngineSnapshot> {
    state.engine().set_account(request.account);
    Json(state.engine().snapshot())
}

/// POST /session/visibility
pub async fn set_visibility(
    State(state): State<AppState>,
    Json(request): Json<VisibilityRequest>,
) -> Json<EngineSnapshot> {
    state.engine().set_visibility(request.visible);
    Json(state.engine().snapshot())
}

/// POST /session/view
pub async fn set_view(
    State(state): State<AppState>,
    Json(request): Json<ViewRequest>,
) -> Json<EngineSnapshot> {
    state.engine().set_active_view(request.view);
    Json(state.engine().snapshot())
}

/// POST /session/tab
pub async fn set_tab(
    State(state): State<AppState>,
    Json(request): Json<TabRequest>,
) -> Json<EngineSnapshot> {
    state.engine().set_active_tab(request.tab);
    Json(state.engine().snapshot())
}

/// POST /session/amount
pub async fn set_amount(
    State(state): State<AppState>,
    Json(request): Json<AmountRequest>,
) -> Json<EngineSnapshot> {
    if request.max {
        state.engine().set_amount_to_max();
    } else {
        state.engine().set_amount(request.amount);
    }
    Json(state.engine().snapshot())
}

/// POST /session/referrer
pub async fn set_referrer(
    State(state): State<AppState>,
    Json(request): Json<ReferrerRequest>,
) -> Json<EngineSnapshot> {
    state.engine().set_referrer(request.referrer);
    Json(state.engine().snapshot())
}
