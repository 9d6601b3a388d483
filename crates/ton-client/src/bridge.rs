//! Wallet-signing bridge interface
//!
//! The bridge obtains the user's signature and broadcasts the message.
//! The engine only supplies the unsigned request and awaits the outcome.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hipo_core::{Address, Nano, Network, UnixTime};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Unsigned single-message transfer handed to the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignRequest {
    /// Sender (the connected account)
    pub from: Address,
    /// Message destination
    pub destination: Address,
    /// Attached value in nanoTON
    #[serde(serialize_with = "as_decimal_string")]
    pub amount: Nano,
    /// Message body, base64 on the wire
    #[serde(serialize_with = "as_base64")]
    pub payload: Vec<u8>,
    /// Unix time after which the wallet must refuse to send
    pub valid_until: UnixTime,
    pub network: Network,
}

impl SignRequest {
    pub fn payload_base64(&self) -> String {
        BASE64.encode(&self.payload)
    }
}

fn as_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(bytes))
}

fn as_decimal_string<S: Serializer>(value: &Nano, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

/// Why a signature request did not go through
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("user rejected the request")]
    UserRejected,

    #[error("bridge failure: {0}")]
    Failed(String),
}

/// External wallet-signing service
#[async_trait]
pub trait SigningBridge: Send + Sync {
    /// Resolves once the wallet has signed and broadcast the message
    async fn request_signature(&self, request: SignRequest) -> Result<(), BridgeError>;
}
