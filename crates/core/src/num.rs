//! Big-integer helpers for the VM's canonical byte encoding.
//!
//! The VM encodes integers as little-endian two's complement with the sign
//! carried by the top bit of the final byte; zero is the empty byte string.

use num_bigint::{BigInt, Sign};
use num_traits::Zero;

/// Decodes a VM integer from its canonical byte form.
pub fn bigint_from_neo_bytes(data: &[u8]) -> BigInt {
    if data.is_empty() {
        return BigInt::zero();
    }
    BigInt::from_signed_bytes_le(data)
}

/// Encodes a VM integer into its canonical byte form.
pub fn bigint_to_neo_bytes(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        return Vec::new();
    }
    value.to_signed_bytes_le()
}

/// Writes a signed integer as a 128-bit little-endian two's complement
/// value, the fixed-width form used by WASM invocation parameters.
pub fn bigint_to_i128_bytes(value: &BigInt) -> Option<[u8; 16]> {
    let as_i128 = i128::try_from(value).ok()?;
    Some(as_i128.to_le_bytes())
}

/// Interprets a big-endian unsigned byte sequence, the form balances are
/// stored under.
pub fn bigint_from_be_bytes(data: &[u8]) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, data)
}

/// Renders the magnitude of a non-negative integer as big-endian bytes;
/// zero becomes the empty sequence.
pub fn bigint_to_be_bytes(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        return Vec::new();
    }
    value.magnitude().to_bytes_be()
}
