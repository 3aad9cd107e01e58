//! Error types shared by the core codecs.

use thiserror::Error;

/// Errors raised by the core address, hash and envelope codecs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An address could not be decoded from its byte, hex or base58 form.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A 256-bit hash could not be decoded.
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// A public key was malformed or of an unsupported kind.
    #[error("invalid public key: {0}")]
    InvalidKey(String),

    /// A binary reader ran past the end of its input.
    #[error("unexpected end of input")]
    EndOfStream,

    /// A value on the wire violated the expected layout.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// The transaction envelope was structurally invalid.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// A currency was referenced that is not in the registry.
    #[error("currency not defined for contract {0}")]
    CurrencyNotDefined(String),

    /// A supplied currency did not match its registered record.
    #[error("invalid currency: {0}")]
    InvalidCurrency(String),
}
