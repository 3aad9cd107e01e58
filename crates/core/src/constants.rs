//! Chain-wide constants.

/// Number of ONG base units per pre-upgrade unit (10^9).
pub const GWEI: u64 = 1_000_000_000;

/// Decimals of the governance token after the precision upgrade.
pub const ONT_DECIMALS: i32 = 9;

/// Decimals of the gas token after the precision upgrade.
pub const ONG_DECIMALS: i32 = 18;

/// Symbol of the governance token.
pub const ONT_SYMBOL: &str = "ONT";

/// Symbol of the gas token.
pub const ONG_SYMBOL: &str = "ONG";

/// Lowest gas limit the network accepts for a transaction.
pub const MIN_GAS_LIMIT: u64 = 20_000;

/// Default gas price suggested when the network average is unavailable.
pub const DEFAULT_GAS_PRICE: u64 = 2_500;

/// Height at which the precision upgrade activated; native transfers built
/// for heights at or above it must use the `transferV2` method.
pub const V2_ACTIVATION_HEIGHT: u32 = 13_920_000;

/// Version prefix byte of base58-encoded account addresses.
pub const ADDR_BASE58_VERSION: u8 = 0x17;
