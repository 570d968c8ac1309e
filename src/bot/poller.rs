// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Update Poller
//!
//! Long-polls the Bot API with `getUpdates` and answers `/verify` commands.
//!
//! ## Strategy
//!
//! Each request waits up to `poll_timeout` server-side for new messages. The
//! offset is advanced past every update received, answered or not, so a reply
//! that fails to send is dropped instead of retried forever. Transport errors
//! back off for `retry_delay` before the next request.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`, like the audit scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::commands::reply_to;
use crate::providers::telegram::{TelegramClient, Update};

/// Server-side wait of each `getUpdates` call.
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed `getUpdates` call.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Background `getUpdates` loop.
pub struct UpdatePoller {
    client: Arc<TelegramClient>,
    verify_page_url: String,
    poll_timeout: Duration,
    retry_delay: Duration,
}

impl UpdatePoller {
    pub fn new(client: Arc<TelegramClient>, verify_page_url: impl Into<String>) -> Self {
        Self {
            client,
            verify_page_url: verify_page_url.into(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Run the poller loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(poller.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            poll_timeout_secs = self.poll_timeout.as_secs(),
            "Bot update poller starting"
        );

        let mut offset = None;

        loop {
            let result = tokio::select! {
                result = self.client.get_updates(offset, self.poll_timeout) => result,
                _ = shutdown.cancelled() => {
                    info!("Bot update poller shutting down");
                    return;
                }
            };

            match result {
                Ok(updates) => {
                    offset = next_offset(offset, &updates);
                    for update in &updates {
                        self.handle(update).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "getUpdates failed, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry_delay) => {},
                        _ = shutdown.cancelled() => {
                            info!("Bot update poller shutting down");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&self, update: &Update) {
        let Some(message) = update.message.as_ref() else {
            return;
        };
        let Some(reply) = reply_to(message, &self.verify_page_url) else {
            return;
        };

        debug!(
            chat_id = message.chat.id,
            chat_kind = ?message.chat.kind,
            "Answering /verify"
        );
        if let Err(e) = self.client.send_message(&reply).await {
            warn!(chat_id = message.chat.id, error = %e, "Failed to answer /verify");
        }
    }
}

/// Offset acknowledging every update in `updates`.
fn next_offset(current: Option<i64>, updates: &[Update]) -> Option<i64> {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .max()
        .max(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(id: i64) -> Update {
        Update {
            update_id: id,
            message: None,
        }
    }

    #[test]
    fn offset_moves_past_latest_update() {
        assert_eq!(next_offset(None, &[]), None);
        assert_eq!(next_offset(Some(10), &[]), Some(10));
        assert_eq!(next_offset(None, &[update(4), update(6), update(5)]), Some(7));
        assert_eq!(next_offset(Some(3), &[update(8)]), Some(9));
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let client = Arc::new(TelegramClient::new("http://127.0.0.1:1", "0:test").unwrap());
        let poller = UpdatePoller::new(client, "https://verify.example.com");
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(5), poller.run(shutdown))
            .await
            .expect("poller exits once cancelled");
    }
}
