//! API route handlers

pub mod health;
pub mod session;
pub mod tx;

use axum::{routing::get, Router};

use crate::AppState;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/state", get(session::get_state))
        .nest("/session", session::router())
        .nest("/tx", tx::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use hipo_core::{AppConfig, Network, NodeError};
    use hipo_sync::Engine;
    use serde_json::{json, Value};
    use ton_client::{BridgeError, ChainRpc, EndpointProvider, SignRequest, SigningBridge};
    use tower::ServiceExt;

    struct Offline;

    #[async_trait]
    impl EndpointProvider for Offline {
        async fn connect(&self, network: Network) -> Result<Arc<dyn ChainRpc>, NodeError> {
            Err(NodeError::Unreachable {
                network: network.to_string(),
            })
        }
    }

    struct Rejecting;

    #[async_trait]
    impl SigningBridge for Rejecting {
        async fn request_signature(&self, _request: SignRequest) -> Result<(), BridgeError> {
            Err(BridgeError::UserRejected)
        }
    }

    fn app() -> Router {
        let engine = Engine::new(AppConfig::default(), Arc::new(Offline), Arc::new(Rejecting));
        create_router(AppState::new(engine))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["network"], "mainnet");
        assert_eq!(body["endpoint_connected"], false);
    }

    #[tokio::test]
    async fn test_state_starts_idle() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/state", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lifecycle"], "idle");
        assert_eq!(body["amount"], "");
    }

    #[tokio::test]
    async fn test_tab_change_clears_amount() {
        let app = app();
        let (_, body) = call(
            &app,
            Method::POST,
            "/session/amount",
            Some(json!({ "amount": "12.5" })),
        )
        .await;
        assert_eq!(body["amount"], "12.5");

        let (_, body) = call(
            &app,
            Method::POST,
            "/session/tab",
            Some(json!({ "tab": "unstake" })),
        )
        .await;
        assert_eq!(body["active_tab"], "unstake");
        assert_eq!(body["amount"], "");
    }

    #[tokio::test]
    async fn test_stake_requires_wallet() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/tx/stake",
            Some(json!({ "amount": "10" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "wallet_not_connected");
    }

    #[tokio::test]
    async fn test_stake_rejects_bad_amount() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/tx/stake",
            Some(json!({ "amount": "ten" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_amount");
    }

    #[tokio::test]
    async fn test_dismiss_without_timeout() {
        let app = app();
        let (status, body) = call(&app, Method::POST, "/tx/dismiss", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "nothing_to_dismiss");
    }

    #[tokio::test]
    async fn test_wallet_on_other_network() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/session/account",
            Some(json!({
                "account": { "address": "0:abcd", "network": "testnet" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["account"], Value::Null);
        assert_eq!(body["notice"]["kind"], "network_mismatch");
        assert_eq!(body["notice"]["message"], "Your wallet must be on MainNet");
    }
}
