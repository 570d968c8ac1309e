// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration module.
//!
//! This module provides functionality for:
//! - Querying the gated ERC-20 token balance of a wallet
//! - Comparing it against the membership threshold (fail-closed)
//! - Recovering the signer of a wallet ownership proof

pub mod client;
pub mod erc20;
pub mod oracle;
pub mod ownership;
pub mod types;

pub use client::{parse_address, ChainClient, ChainClientError};
pub use oracle::{BalanceCheck, BalanceOracle, ChainBalanceOracle};
pub use ownership::{OwnershipVerifier, VerificationError, DEFAULT_CHALLENGE};
pub use types::*;
