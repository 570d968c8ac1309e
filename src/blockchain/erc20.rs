// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ERC-20 token contract interactions.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    sol,
};

use super::client::ChainClientError;

// Only the read-side of the ERC-20 interface is needed for gating.
sol! {
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
    }
}

/// ERC-20 contract wrapper.
pub struct Erc20Contract<P> {
    contract: IERC20::IERC20Instance<P>,
}

impl<P: Provider + Clone> Erc20Contract<P> {
    /// Create a new ERC-20 contract instance.
    pub fn new(provider: &P, contract_address: Address) -> Self {
        let contract = IERC20::new(contract_address, provider.clone());
        Self { contract }
    }

    /// Get the token decimals.
    pub async fn decimals(&self) -> Result<u8, ChainClientError> {
        self.contract
            .decimals()
            .call()
            .await
            .map_err(|e| ChainClientError::ContractError(e.to_string()))
    }

    /// Get the raw balance (base units) of an address.
    pub async fn balance_of(&self, owner: Address) -> Result<U256, ChainClientError> {
        self.contract
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| ChainClientError::ContractError(e.to_string()))
    }
}
