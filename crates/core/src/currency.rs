//! The currency registry.
//!
//! Two built-in native currencies plus a configured set of OEP4 tokens,
//! registered once at startup and immutable afterwards. The registry is
//! passed explicitly to the store, the indexer and the API services; there
//! is no process-wide currency table.

use crate::address::{self, Address};
use crate::constants::{ONG_DECIMALS, ONG_SYMBOL, ONT_DECIMALS, ONT_SYMBOL};
use crate::CoreError;
use std::collections::HashMap;

/// A registered currency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Currency {
    /// The contract the currency lives under.
    pub contract: Address,
    /// Display symbol, e.g. `ONT`.
    pub symbol: String,
    /// Number of decimal places.
    pub decimals: i32,
    /// Whether the token contract runs under the WASM VM.
    pub wasm: bool,
}

impl Currency {
    /// Whether this is one of the two native currencies.
    pub fn is_native(&self) -> bool {
        self.contract == address::ONT || self.contract == address::ONG
    }
}

/// The immutable table of registered currencies, keyed by contract.
#[derive(Clone, Debug)]
pub struct Registry {
    tokens: HashMap<Address, Currency>,
}

impl Registry {
    /// Builds the registry from the built-in native currencies plus the
    /// configured OEP4 tokens.
    pub fn new(oep4_tokens: Vec<Currency>) -> Self {
        let mut tokens = HashMap::with_capacity(oep4_tokens.len() + 2);
        tokens.insert(
            address::ONT,
            Currency {
                contract: address::ONT,
                symbol: ONT_SYMBOL.to_owned(),
                decimals: ONT_DECIMALS,
                wasm: false,
            },
        );
        tokens.insert(
            address::ONG,
            Currency {
                contract: address::ONG,
                symbol: ONG_SYMBOL.to_owned(),
                decimals: ONG_DECIMALS,
                wasm: false,
            },
        );
        for token in oep4_tokens {
            tokens.insert(token.contract, token);
        }
        Self { tokens }
    }

    /// Looks up a currency by contract.
    pub fn get(&self, contract: &Address) -> Option<&Currency> {
        self.tokens.get(contract)
    }

    /// Whether the contract has a registered currency.
    pub fn contains(&self, contract: &Address) -> bool {
        self.tokens.contains_key(contract)
    }

    /// Looks up a currency by contract, failing when it is not registered.
    pub fn require(&self, contract: &Address) -> Result<&Currency, CoreError> {
        self.tokens
            .get(contract)
            .ok_or_else(|| CoreError::CurrencyNotDefined(contract.to_hex_string()))
    }

    /// Validates a caller-supplied `(contract, symbol, decimals)` triple
    /// against the registered record and returns that record.
    pub fn validate(
        &self,
        contract: &Address,
        symbol: &str,
        decimals: i32,
    ) -> Result<&Currency, CoreError> {
        let info = self.require(contract)?;
        if info.decimals != decimals {
            return Err(CoreError::InvalidCurrency(format!(
                "mismatching decimals value for currency: expected {}, got {}",
                info.decimals, decimals
            )));
        }
        if info.symbol != symbol {
            return Err(CoreError::InvalidCurrency(format!(
                "mismatching symbol for currency: expected {:?}, got {:?}",
                info.symbol, symbol
            )));
        }
        Ok(info)
    }

    /// Iterates over all registered currencies.
    pub fn iter(&self) -> impl Iterator<Item = &Currency> {
        self.tokens.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> Registry {
        Registry::new(vec![Currency {
            contract: Address([0x42; 20]),
            symbol: "TOK".to_owned(),
            decimals: 8,
            wasm: false,
        }])
    }

    #[test]
    fn builtins_are_registered() {
        let registry = test_registry();
        assert_eq!(registry.require(&address::ONT).expect("ont").symbol, "ONT");
        assert_eq!(registry.require(&address::ONG).expect("ong").decimals, 18);
        assert!(registry.require(&address::GOV).is_err());
    }

    #[test]
    fn validate_checks_symbol_and_decimals() {
        let registry = test_registry();
        let contract = Address([0x42; 20]);
        assert!(registry.validate(&contract, "TOK", 8).is_ok());
        assert!(matches!(
            registry.validate(&contract, "TOK", 9),
            Err(CoreError::InvalidCurrency(_))
        ));
        assert!(matches!(
            registry.validate(&contract, "BAD", 8),
            Err(CoreError::InvalidCurrency(_))
        ));
        assert!(matches!(
            registry.validate(&Address([9; 20]), "TOK", 8),
            Err(CoreError::CurrencyNotDefined(_))
        ));
    }

    #[test]
    fn native_flag() {
        let registry = test_registry();
        assert!(registry.get(&address::ONT).expect("ont").is_native());
        assert!(!registry.get(&Address([0x42; 20])).expect("tok").is_native());
    }
}
