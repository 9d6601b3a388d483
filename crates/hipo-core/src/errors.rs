//! Error types for Hipo

use thiserror::Error;

/// Core errors that can occur in Hipo
#[derive(Debug, Error)]
pub enum Error {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TxError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// RPC endpoint and query errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("No endpoint available for {network}")]
    Unreachable { network: String },

    #[error("Endpoint returned error: {message}")]
    ApiError { message: String },

    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Get method {method} failed with exit code {exit_code}")]
    ViewFailed { method: String, exit_code: i32 },

    #[error("Account not deployed: {address}")]
    AccountNotDeployed { address: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl NodeError {
    /// Exit code of a failed get method, if this is one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ViewFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unreachable { .. } => "node_unavailable",
            Self::ApiError { .. } => "node_error",
            Self::Timeout { .. } => "node_timeout",
            Self::ViewFailed { .. } => "view_failed",
            Self::AccountNotDeployed { .. } => "account_not_deployed",
            Self::ParseError(_) => "parse_error",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unreachable { .. } => 503,
            Self::Timeout { .. } => 504,
            Self::AccountNotDeployed { .. } => 404,
            Self::ApiError { .. } | Self::ViewFailed { .. } | Self::ParseError(_) => 502,
        }
    }
}

/// Protocol-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Protocol not available on {network}")]
    NetworkNotSupported { network: String },

    #[error("Protocol state unavailable: {reason}")]
    StateUnavailable { reason: String },

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Action not allowed: {reason}")]
    ActionNotAllowed { reason: String },

    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: u128, available: u128 },

    #[error("Failed to parse stack of {method}: {message}")]
    StackParseError { method: String, message: String },
}

/// Transaction submission errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Another transaction is still being tracked")]
    Busy,

    #[error("Signature request rejected by user")]
    UserRejected,

    #[error("Wallet bridge failed: {message}")]
    BridgeFailed { message: String },

    #[error("Failed to build transaction: {message}")]
    BuildFailed { message: String },

    #[error("Nothing to dismiss")]
    NothingToDismiss,
}

/// Result type alias for Hipo operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Node(e) => e.error_code(),
            Self::Protocol(e) => e.error_code(),
            Self::Transaction(e) => e.error_code(),
            Self::Config(_) => "config_error",
            Self::Serialization(_) => "serialization_error",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Node(e) => e.status_code(),
            Self::Protocol(e) => e.status_code(),
            Self::Transaction(e) => e.status_code(),
            Self::Config(_) | Self::Serialization(_) => 500,
        }
    }
}

impl ProtocolError {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NetworkNotSupported { .. } => "network_not_supported",
            Self::StateUnavailable { .. } => "state_unavailable",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::ActionNotAllowed { .. } => "action_not_allowed",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::StackParseError { .. } => "stack_parse_error",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidAmount { .. } => 400,
            Self::InsufficientBalance { .. } | Self::ActionNotAllowed { .. } => 422,
            Self::NetworkNotSupported { .. } => 422,
            Self::StateUnavailable { .. } | Self::StackParseError { .. } => 503,
        }
    }
}

impl TxError {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::WalletNotConnected => "wallet_not_connected",
            Self::Busy => "busy",
            Self::UserRejected => "user_rejected",
            Self::BridgeFailed { .. } => "bridge_failed",
            Self::BuildFailed { .. } => "build_failed",
            Self::NothingToDismiss => "nothing_to_dismiss",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::WalletNotConnected | Self::BuildFailed { .. } => 422,
            Self::Busy | Self::NothingToDismiss => 409,
            Self::UserRejected => 400,
            Self::BridgeFailed { .. } => 502,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_codes() {
        let err = ProtocolError::InvalidAmount {
            message: "test".into(),
        };
        assert_eq!(err.error_code(), "invalid_amount");
        assert_eq!(err.status_code(), 400);

        let err = ProtocolError::InsufficientBalance {
            required: 100,
            available: 50,
        };
        assert_eq!(err.error_code(), "insufficient_balance");
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn test_tx_error_codes() {
        assert_eq!(TxError::UserRejected.error_code(), "user_rejected");
        assert_eq!(TxError::Busy.status_code(), 409);
        let err = TxError::BridgeFailed {
            message: "closed".into(),
        };
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn test_wrapped_error_codes() {
        let err: Error = TxError::NothingToDismiss.into();
        assert_eq!(err.error_code(), "nothing_to_dismiss");
        assert_eq!(err.status_code(), 409);
        let err: Error = NodeError::Timeout { secs: 30 }.into();
        assert_eq!(err.status_code(), 504);
        assert_eq!(Error::Config("bad".into()).error_code(), "config_error");
    }

    #[test]
    fn test_view_failed_exit_code() {
        let err = NodeError::ViewFailed {
            method: "get_wallet_fees".into(),
            exit_code: 11,
        };
        assert_eq!(err.exit_code(), Some(11));
        assert_eq!(NodeError::Timeout { secs: 30 }.exit_code(), None);
    }
}
