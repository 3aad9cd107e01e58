//! The `/account/*` endpoints.

use super::{block_identifier, Services};
use crate::types::{
    AccountBalanceRequest, AccountBalanceResponse, AccountCoinsRequest, Amount, Currency,
    PartialBlockIdentifier,
};
use crate::{ApiError, ApiResult};
use ont_core::{address, Address};
use std::collections::HashSet;

impl Services {
    /// Implements `/account/balance`: point-in-time balances for the
    /// account's native assets, or for the token named by the
    /// sub-account.
    pub fn account_balance(
        &self,
        request: &AccountBalanceRequest,
    ) -> ApiResult<AccountBalanceResponse> {
        if self.offline() {
            return Err(ApiError::offline_mode());
        }
        let acct = Address::from_base58(&request.account_identifier.address)
            .map_err(|_| ApiError::invalid_account_address())?;
        let currencies = request.currencies.as_deref();
        match &request.account_identifier.sub_account {
            None => self.get_balances(
                request.block_identifier.as_ref(),
                &acct,
                currencies,
                &[address::ONT, address::ONG],
            ),
            Some(sub) => {
                let contract = Address::from_hex_string(&sub.address)
                    .map_err(|_| ApiError::invalid_contract_address())?;
                self.get_balances(request.block_identifier.as_ref(), &acct, currencies, &[contract])
            }
        }
    }

    /// Implements `/account/coins`; the chain is account-based, so there
    /// are no coins to report.
    pub fn account_coins(&self, _request: &AccountCoinsRequest) -> ApiResult<()> {
        if self.offline() {
            return Err(ApiError::offline_mode());
        }
        Err(ApiError::not_implemented())
    }

    fn get_balances(
        &self,
        pid: Option<&PartialBlockIdentifier>,
        acct: &Address,
        currencies: Option<&[Currency]>,
        contracts: &[Address],
    ) -> ApiResult<AccountBalanceResponse> {
        let info = self.block_info(pid, false)?;
        let mut filter: HashSet<Address> = HashSet::new();
        if let Some(currencies) = currencies {
            for currency in currencies {
                filter.insert(self.validate_currency(currency)?.contract);
            }
        }
        let mut balances = Vec::with_capacity(contracts.len());
        for contract in contracts {
            let currency = self.store.registry().require(contract)?;
            if !filter.is_empty() && !filter.contains(contract) {
                continue;
            }
            let balance = self.store.get_balance(acct, contract, &info.height_enc)?;
            balances.push(Amount {
                value: balance.to_string(),
                currency: self.rosetta_currency(currency),
            });
        }
        Ok(AccountBalanceResponse {
            block_identifier: block_identifier(&info),
            balances,
        })
    }
}
