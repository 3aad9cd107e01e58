//! The numbered API error taxonomy.
//!
//! Every failure surfaced to a caller carries a stable code, a message, a
//! retriable flag and an optional details map. The full list is advertised
//! by `/network/options`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ont_core::CoreError;
use ont_node_client::NodeError;
use ont_store::StoreError;
use ont_vm::VmError;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Convenience alias for endpoint results.
pub type ApiResult<T> = Result<T, ApiError>;

/// A machine-readable API error.
#[derive(Clone, Debug, Serialize)]
pub struct ApiError {
    pub code: i32,
    pub message: &'static str,
    pub retriable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

macro_rules! errors {
    ($(($fn:ident, $code:expr, $msg:expr, $retriable:expr),)+) => {
        impl ApiError {
            $(
                pub fn $fn() -> Self {
                    Self {
                        code: $code,
                        message: $msg,
                        retriable: $retriable,
                        details: None,
                    }
                }
            )+

            /// Every error the API can return, for `/network/options`.
            pub fn all() -> Vec<Self> {
                vec![$(Self::$fn(),)+]
            }
        }
    };
}

errors! {
    (not_implemented, 101, "method not implemented", false),
    (offline_mode, 102, "method not available in offline mode", false),
    (currency_not_defined, 201, "currency not defined", true),
    (datastore, 301, "datastore error", true),
    (datastore_conflict, 302, "datastore transaction conflict", true),
    (datastore_consistency, 303, "datastore consistency failure", true),
    (internal, 304, "unexpected internal error", true),
    (nonce_generation_failed, 305, "nonce generation failed", true),
    (serialization_format, 306, "serialization format error", false),
    (invalid_account_address, 401, "invalid account address", false),
    (invalid_block_hash, 402, "invalid block hash", false),
    (invalid_block_identifier, 403, "invalid block identifier", false),
    (invalid_block_index, 404, "invalid block index", false),
    (invalid_construct_options, 405, "invalid construct options", false),
    (invalid_contract_address, 406, "invalid contract address", false),
    (invalid_currency, 407, "invalid currency", false),
    (invalid_gas_limit, 408, "invalid gas limit", false),
    (invalid_gas_price, 409, "invalid gas price", false),
    (invalid_nonce, 410, "invalid nonce", false),
    (invalid_ops_intent, 411, "invalid ops intent", false),
    (invalid_payer_address, 412, "invalid payer address", false),
    (invalid_public_key, 413, "invalid public key", false),
    (invalid_request_field, 414, "invalid request field", false),
    (invalid_signature, 415, "invalid signature", false),
    (invalid_transaction_hash, 416, "invalid transaction hash", false),
    (invalid_transaction_payload, 417, "invalid transaction payload", false),
    (broadcast_failed, 501, "broadcast failed", true),
    (transaction_not_in_mempool, 502, "transaction not in mempool", true),
    (unknown_block_hash, 503, "unknown block hash", true),
    (unknown_block_index, 504, "unknown block index", true),
}

impl ApiError {
    /// Attaches a human-readable cause to the error's details map.
    pub fn with_detail(mut self, detail: impl std::fmt::Display) -> Self {
        let mut map = Map::new();
        map.insert("error".to_owned(), json!(detail.to_string()));
        self.details = Some(map);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownBlockIndex => ApiError::unknown_block_index(),
            StoreError::UnknownBlockHash => ApiError::unknown_block_hash(),
            StoreError::InvalidBlockIdentifier => ApiError::invalid_block_identifier(),
            StoreError::Consistency(detail) => {
                ApiError::datastore_consistency().with_detail(detail)
            }
            other => ApiError::datastore().with_detail(other),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::CurrencyNotDefined(_) => ApiError::currency_not_defined().with_detail(err),
            CoreError::InvalidCurrency(_) => ApiError::invalid_currency().with_detail(err),
            CoreError::InvalidKey(_) => ApiError::invalid_public_key().with_detail(err),
            _ => ApiError::internal().with_detail(err),
        }
    }
}

impl From<NodeError> for ApiError {
    fn from(err: NodeError) -> Self {
        match &err {
            NodeError::NotFound => ApiError::transaction_not_in_mempool(),
            NodeError::Rejected(_) => ApiError::broadcast_failed().with_detail(err),
            _ => ApiError::internal().with_detail(err),
        }
    }
}

impl From<VmError> for ApiError {
    fn from(err: VmError) -> Self {
        ApiError::invalid_transaction_payload().with_detail(err)
    }
}
