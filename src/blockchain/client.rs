// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM JSON-RPC client for token balance reads.

use std::{str::FromStr, time::Duration};

use alloy::{
    network::Ethereum,
    primitives::{Address, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, ProviderBuilder, RootProvider,
    },
};

use super::erc20::Erc20Contract;

/// HTTP provider type (with the default fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Read-only chain client bound to one RPC endpoint.
pub struct ChainClient {
    rpc_url: String,
    provider: HttpProvider,
    timeout: Duration,
}

impl ChainClient {
    /// Create a new client for the given RPC endpoint.
    ///
    /// Every call made through the client is bounded by `timeout`.
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, ChainClientError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainClientError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            provider,
            timeout,
        })
    }

    /// The endpoint this client talks to.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get the raw ERC-20 balance of `wallet_address` on `token`.
    pub async fn get_token_balance(
        &self,
        wallet_address: &str,
        token: Address,
    ) -> Result<U256, ChainClientError> {
        let owner = parse_address(wallet_address)?;
        let contract = Erc20Contract::new(&self.provider, token);

        tokio::time::timeout(self.timeout, contract.balance_of(owner))
            .await
            .map_err(|_| ChainClientError::Timeout(self.timeout))?
    }

    /// Read the token's on-chain decimals.
    pub async fn get_token_decimals(&self, token: Address) -> Result<u8, ChainClientError> {
        let contract = Erc20Contract::new(&self.provider, token);

        tokio::time::timeout(self.timeout, contract.decimals())
            .await
            .map_err(|_| ChainClientError::Timeout(self.timeout))?
    }
}

/// Parse a `0x`-prefixed hex address, ignoring checksum casing.
pub fn parse_address(address: &str) -> Result<Address, ChainClientError> {
    Address::from_str(address.trim())
        .map_err(|e| ChainClientError::InvalidAddress(format!("{address}: {e}")))
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract error: {0}")]
    ContractError(String),

    #[error("Chain call timed out after {0:?}")]
    Timeout(Duration),
}
