// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token balance threshold checks.
//!
//! The oracle never returns an error to its caller: an unreachable RPC
//! endpoint, a reverted call, a timeout or a malformed address are logged
//! and reported as "not enough balance" (fail-closed). Callers that need to
//! tell an outage apart from a genuine shortfall use [`BalanceOracle::check_balance`].

use std::future::Future;

use alloy::primitives::U256;

use super::client::{parse_address, ChainClient, ChainClientError};
use super::types::{format_token_balance, TokenGateConfig};

/// Outcome of a single balance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceCheck {
    /// Balance is at or above the threshold.
    Sufficient,
    /// Balance is below the threshold, or the address can never hold one.
    Insufficient,
    /// The chain could not be read.
    Unavailable,
}

impl BalanceCheck {
    pub fn is_sufficient(self) -> bool {
        matches!(self, BalanceCheck::Sufficient)
    }
}

/// Answers "does this address hold enough of the gated token?".
pub trait BalanceOracle: Send + Sync {
    /// Check `address` against the threshold.
    fn check_balance(&self, address: &str) -> impl Future<Output = BalanceCheck> + Send;

    /// Fail-closed boolean view of [`check_balance`](Self::check_balance).
    fn has_minimum_balance(&self, address: &str) -> impl Future<Output = bool> + Send {
        async move { self.check_balance(address).await.is_sufficient() }
    }
}

/// Balance oracle backed by an ERC-20 `balanceOf` call.
pub struct ChainBalanceOracle {
    client: ChainClient,
    config: TokenGateConfig,
}

impl ChainBalanceOracle {
    pub fn new(config: TokenGateConfig) -> Result<Self, ChainClientError> {
        let client = ChainClient::new(&config.rpc_url, config.rpc_timeout)?;
        Ok(Self { client, config })
    }

    /// Compare the on-chain decimals with the configured ones.
    ///
    /// A mismatch only produces a warning: the configured value stays
    /// authoritative so a flaky RPC at startup cannot change the threshold.
    pub async fn check_decimals(&self) {
        match self.client.get_token_decimals(self.config.token_contract).await {
            Ok(decimals) if decimals == self.config.decimals => {
                tracing::info!(decimals, "Token decimals confirmed on-chain");
            }
            Ok(decimals) => {
                tracing::warn!(
                    on_chain = decimals,
                    configured = self.config.decimals,
                    "Token decimals differ from configuration"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read token decimals");
            }
        }
    }

    async fn read_balance(&self, address: &str) -> Result<U256, ChainClientError> {
        self.client
            .get_token_balance(address, self.config.token_contract)
            .await
    }
}

impl BalanceOracle for ChainBalanceOracle {
    async fn check_balance(&self, address: &str) -> BalanceCheck {
        if let Err(e) = parse_address(address) {
            tracing::warn!(wallet = %address, error = %e, "Refusing balance check for malformed address");
            return BalanceCheck::Insufficient;
        }

        match self.read_balance(address).await {
            Ok(balance) => {
                let check = classify(balance, self.config.threshold);
                tracing::debug!(
                    wallet = %address,
                    balance = %format_token_balance(balance, self.config.decimals),
                    sufficient = check.is_sufficient(),
                    "Token balance checked"
                );
                check
            }
            Err(e) => {
                tracing::error!(
                    wallet = %address,
                    rpc = %self.client.rpc_url(),
                    error = %e,
                    "Error checking token balance"
                );
                BalanceCheck::Unavailable
            }
        }
    }
}

/// Threshold comparison in base units.
fn classify(balance: U256, threshold: U256) -> BalanceCheck {
    if balance >= threshold {
        BalanceCheck::Sufficient
    } else {
        BalanceCheck::Insufficient
    }
}
