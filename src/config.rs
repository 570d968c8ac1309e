// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the loader that turns the
//! process environment into a validated [`GateConfig`] at startup. A missing
//! or malformed required value is fatal.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3000` |
//! | `DATA_DIR` | Directory holding the member database | `./data` |
//! | `CHAIN_RPC_URL` | EVM JSON-RPC endpoint | Taraxa mainnet |
//! | `TOKEN_CONTRACT_ADDRESS` | Gated ERC-20 contract | Memelord token |
//! | `REQUIRED_TOKEN_AMOUNT` | Minimum whole-token balance | `10` |
//! | `TOKEN_DECIMALS` | Decimals used to scale the minimum | `18` |
//! | `RPC_TIMEOUT_SECS` | Bound on each chain call | `10` |
//! | `TELEGRAM_BOT_TOKEN` | Bot API token | Required |
//! | `TELEGRAM_API_URL` | Bot API base URL | `https://api.telegram.org` |
//! | `GROUP_CHAT_ID` | Numeric id of the gated group | Required |
//! | `VERIFY_PAGE_URL` | Web page opened by the "Verify Wallet" button | Required |
//! | `CHALLENGE_MESSAGE` | Message members sign to prove ownership | `Prove ownership to join Memelord HQ` |
//! | `AUDIT_TIME_UTC` | Daily audit time, `HH:MM` | `02:00` |
//! | `GRACE_PERIOD_SECS` | Delay between warning and recheck | `3600` |
//! | `OUTAGE_POLICY` | `fail-closed` or `hold` | `fail-closed` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use chrono::{NaiveTime, TimeDelta};

use crate::blockchain::{
    parse_address, parse_token_amount, TokenGateConfig, DEFAULT_CHALLENGE, DEFAULT_RPC_URL,
    DEFAULT_TOKEN_CONTRACT, DEFAULT_TOKEN_DECIMALS,
};
use crate::lifecycle::{LifecycleSettings, OutagePolicy, DEFAULT_GRACE_PERIOD_SECS};
use crate::providers::telegram::DEFAULT_API_BASE_URL;
use crate::scheduler::DEFAULT_AUDIT_TIME;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the data directory path.
///
/// The member database (`members.redb`) is created inside it.
///
/// # Default
/// `./data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const CHAIN_RPC_URL_ENV: &str = "CHAIN_RPC_URL";
pub const TOKEN_CONTRACT_ENV: &str = "TOKEN_CONTRACT_ADDRESS";
pub const REQUIRED_AMOUNT_ENV: &str = "REQUIRED_TOKEN_AMOUNT";
pub const TOKEN_DECIMALS_ENV: &str = "TOKEN_DECIMALS";
pub const RPC_TIMEOUT_ENV: &str = "RPC_TIMEOUT_SECS";

/// Bot API token. Treated as a secret: never logged.
pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_API_URL_ENV: &str = "TELEGRAM_API_URL";
pub const GROUP_CHAT_ID_ENV: &str = "GROUP_CHAT_ID";
pub const VERIFY_PAGE_URL_ENV: &str = "VERIFY_PAGE_URL";
pub const CHALLENGE_ENV: &str = "CHALLENGE_MESSAGE";

pub const AUDIT_TIME_ENV: &str = "AUDIT_TIME_UTC";
pub const GRACE_PERIOD_ENV: &str = "GRACE_PERIOD_SECS";
pub const OUTAGE_POLICY_ENV: &str = "OUTAGE_POLICY";

pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_REQUIRED_AMOUNT: &str = "10";
const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// PEM certificate chain and private key for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub tls: Option<TlsPaths>,
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub api_base_url: String,
    pub bot_token: String,
    pub group_chat_id: i64,
    pub verify_page_url: String,
}

// Keep the bot token out of `{:?}` output.
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_base_url", &self.api_base_url)
            .field("bot_token", &"<redacted>")
            .field("group_chat_id", &self.group_chat_id)
            .field("verify_page_url", &self.verify_page_url)
            .finish()
    }
}

/// Everything the service needs to start.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub server: ServerConfig,
    pub data_dir: PathBuf,
    pub token: TokenGateConfig,
    pub telegram: TelegramConfig,
    pub challenge: String,
    pub audit_time: NaiveTime,
    pub lifecycle: LifecycleSettings,
}

impl GateConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variable names. Empty values count as
    /// unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        // Server
        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid(PORT_ENV, e.to_string()))?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::invalid(HOST_ENV, format!("`{host}` is not an IP address")))?;

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let data_dir = PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.into()));

        // Chain
        let rpc_url = get(CHAIN_RPC_URL_ENV).unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        url::Url::parse(&rpc_url)
            .map_err(|e| ConfigError::invalid(CHAIN_RPC_URL_ENV, e.to_string()))?;

        let contract_raw =
            get(TOKEN_CONTRACT_ENV).unwrap_or_else(|| DEFAULT_TOKEN_CONTRACT.to_string());
        let token_contract = parse_address(&contract_raw)
            .map_err(|e| ConfigError::invalid(TOKEN_CONTRACT_ENV, e.to_string()))?;

        let decimals = match get(TOKEN_DECIMALS_ENV) {
            Some(raw) => raw
                .parse::<u8>()
                .ok()
                .filter(|d| *d <= 77)
                .ok_or_else(|| ConfigError::invalid(TOKEN_DECIMALS_ENV, "expected 0..=77"))?,
            None => DEFAULT_TOKEN_DECIMALS,
        };

        let amount = get(REQUIRED_AMOUNT_ENV).unwrap_or_else(|| DEFAULT_REQUIRED_AMOUNT.into());
        let threshold = parse_token_amount(&amount, decimals)
            .map_err(|reason| ConfigError::invalid(REQUIRED_AMOUNT_ENV, reason))?;

        let rpc_timeout = Duration::from_secs(positive_secs(
            get(RPC_TIMEOUT_ENV),
            RPC_TIMEOUT_ENV,
            DEFAULT_RPC_TIMEOUT_SECS,
        )?);

        // Telegram
        let bot_token = require(BOT_TOKEN_ENV)?;
        let group_chat_id = require(GROUP_CHAT_ID_ENV)?
            .parse::<i64>()
            .map_err(|e| ConfigError::invalid(GROUP_CHAT_ID_ENV, e.to_string()))?;
        let verify_page_url = require(VERIFY_PAGE_URL_ENV)?;
        url::Url::parse(&verify_page_url)
            .map_err(|e| ConfigError::invalid(VERIFY_PAGE_URL_ENV, e.to_string()))?;
        let api_base_url =
            get(TELEGRAM_API_URL_ENV).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        // Lifecycle
        let challenge = lookup(CHALLENGE_ENV)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_CHALLENGE.to_string());

        let audit_raw = get(AUDIT_TIME_ENV).unwrap_or_else(|| DEFAULT_AUDIT_TIME.to_string());
        let audit_time = NaiveTime::parse_from_str(&audit_raw, "%H:%M")
            .map_err(|_| ConfigError::invalid(AUDIT_TIME_ENV, format!("`{audit_raw}` is not HH:MM")))?;

        let grace_secs = positive_secs(
            get(GRACE_PERIOD_ENV),
            GRACE_PERIOD_ENV,
            DEFAULT_GRACE_PERIOD_SECS as u64,
        )?;
        let grace_period = i64::try_from(grace_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| ConfigError::invalid(GRACE_PERIOD_ENV, "out of range"))?;

        let outage_policy = match get(OUTAGE_POLICY_ENV).as_deref() {
            None | Some("fail-closed") => OutagePolicy::FailClosed,
            Some("hold") => OutagePolicy::Hold,
            Some(other) => {
                return Err(ConfigError::invalid(
                    OUTAGE_POLICY_ENV,
                    format!("`{other}` (expected `fail-closed` or `hold`)"),
                ))
            }
        };

        Ok(Self {
            server: ServerConfig { bind_addr, tls },
            data_dir,
            token: TokenGateConfig {
                rpc_url,
                token_contract,
                decimals,
                threshold,
                rpc_timeout,
            },
            telegram: TelegramConfig {
                api_base_url,
                bot_token,
                group_chat_id,
                verify_page_url,
            },
            challenge,
            audit_time,
            lifecycle: LifecycleSettings {
                grace_period,
                outage_policy,
            },
        })
    }
}

fn positive_secs(
    raw: Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match raw {
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| ConfigError::invalid(var, format!("`{raw}` is not a positive integer"))),
        None => Ok(default),
    }
}

/// Log output format from `LOG_FORMAT`; anything but `json` is pretty.
pub fn log_format() -> LogFormat {
    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let mut map: HashMap<String, String> = [
            (BOT_TOKEN_ENV, "123:abc"),
            (GROUP_CHAT_ID_ENV, "-1001234567890"),
            (VERIFY_PAGE_URL_ENV, "https://verify.example.com"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.to_string());
        }
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_with_only_required_values() {
        let config = GateConfig::from_lookup(env(&[])).unwrap();

        assert_eq!(config.server.bind_addr.port(), 3000);
        assert!(config.server.tls.is_none());
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.token.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.token.decimals, 18);
        assert_eq!(
            config.token.threshold,
            U256::from(10u64) * U256::from(10u64).pow(U256::from(18u64))
        );
        assert_eq!(config.telegram.group_chat_id, -1001234567890);
        assert_eq!(config.telegram.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.challenge, DEFAULT_CHALLENGE);
        assert_eq!(config.audit_time, NaiveTime::from_hms_opt(2, 0, 0).unwrap());
        assert_eq!(config.lifecycle, LifecycleSettings::default());
    }

    #[test]
    fn required_values_must_be_present() {
        let missing_token = |name: &str| {
            env(&[(BOT_TOKEN_ENV, "")])(name)
        };
        assert_eq!(
            GateConfig::from_lookup(missing_token).unwrap_err(),
            ConfigError::Missing(BOT_TOKEN_ENV)
        );

        let no_chat = env(&[]);
        let result = GateConfig::from_lookup(|name| {
            if name == GROUP_CHAT_ID_ENV {
                None
            } else {
                no_chat(name)
            }
        });
        assert_eq!(result.unwrap_err(), ConfigError::Missing(GROUP_CHAT_ID_ENV));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = GateConfig::from_lookup(env(&[
            (PORT_ENV, "8443"),
            (REQUIRED_AMOUNT_ENV, "2.5"),
            (TOKEN_DECIMALS_ENV, "6"),
            (AUDIT_TIME_ENV, "14:30"),
            (GRACE_PERIOD_ENV, "120"),
            (OUTAGE_POLICY_ENV, "hold"),
            (TLS_CERT_PATH_ENV, "/certs/cert.pem"),
            (TLS_KEY_PATH_ENV, "/certs/key.pem"),
            (CHALLENGE_ENV, "Sign to join"),
        ]))
        .unwrap();

        assert_eq!(config.server.bind_addr.port(), 8443);
        assert_eq!(config.token.threshold, U256::from(2_500_000u64));
        assert_eq!(config.audit_time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert_eq!(config.lifecycle.grace_period, TimeDelta::seconds(120));
        assert_eq!(config.lifecycle.outage_policy, OutagePolicy::Hold);
        assert_eq!(config.challenge, "Sign to join");
        assert_eq!(
            config.server.tls,
            Some(TlsPaths {
                cert: "/certs/cert.pem".into(),
                key: "/certs/key.pem".into(),
            })
        );
    }

    #[test]
    fn malformed_values_are_rejected() {
        let cases = [
            (GROUP_CHAT_ID_ENV, "my-group"),
            (PORT_ENV, "99999"),
            (HOST_ENV, "localhost"),
            (TOKEN_CONTRACT_ENV, "0x1234"),
            (REQUIRED_AMOUNT_ENV, "-5"),
            (AUDIT_TIME_ENV, "2am"),
            (GRACE_PERIOD_ENV, "0"),
            (OUTAGE_POLICY_ENV, "ignore"),
            (VERIFY_PAGE_URL_ENV, "not a url"),
        ];

        for (var, value) in cases {
            let err = GateConfig::from_lookup(env(&[(var, value)])).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { var: v, .. } if v == var),
                "{var}={value} gave {err:?}"
            );
        }
    }

    #[test]
    fn tls_requires_both_paths() {
        let err = GateConfig::from_lookup(env(&[(TLS_CERT_PATH_ENV, "/c.pem")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(TLS_KEY_PATH_ENV));
    }

    #[test]
    fn debug_output_redacts_bot_token() {
        let config = GateConfig::from_lookup(env(&[])).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("123:abc"));
        assert!(rendered.contains("<redacted>"));
    }
}
