// ABOUTME: Long-polling Telegram loop feeding text messages into the conversation machine
// ABOUTME: Tracks the update offset, sends one reply per message and stops on Ctrl-C
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{TelegramClient, Update};
use crate::backend::SubmissionBackend;
use crate::constants::defaults::POLL_RETRY_DELAY_SECS;
use crate::conversation::ConversationMachine;
use anyhow::Result;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Offset acknowledging every update in `updates`
#[must_use]
pub fn next_offset(current: Option<i64>, updates: &[Update]) -> Option<i64> {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .max()
        .max(current)
}

/// The relay bot: one poll loop, one conversation machine
pub struct TelegramBot<B> {
    client: TelegramClient,
    machine: ConversationMachine<B>,
    poll_timeout_secs: u64,
    offset: Option<i64>,
}

impl<B: SubmissionBackend> TelegramBot<B> {
    /// Bot polling with `client` and answering through `machine`
    #[must_use]
    pub const fn new(
        client: TelegramClient,
        machine: ConversationMachine<B>,
        poll_timeout_secs: u64,
    ) -> Self {
        Self {
            client,
            machine,
            poll_timeout_secs,
            offset: None,
        }
    }

    /// Poll until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns an error if the Ctrl-C handler cannot be installed
    pub async fn run(&mut self) -> Result<()> {
        info!("Bot is running, waiting for messages");
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    signal?;
                    info!("Shutdown requested, stopping poll loop");
                    return Ok(());
                }
                () = self.poll_once() => {}
            }
        }
    }

    /// Fetch one batch of updates and answer every text message in order
    pub async fn poll_once(&mut self) {
        let updates = match self
            .client
            .get_updates(self.offset, self.poll_timeout_secs)
            .await
        {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "getUpdates failed, retrying");
                tokio::time::sleep(Duration::from_secs(POLL_RETRY_DELAY_SECS)).await;
                return;
            }
        };

        // Acknowledge the whole batch before handling it
        self.offset = next_offset(self.offset, &updates);

        for update in &updates {
            self.handle_update(update).await;
        }
    }

    async fn handle_update(&mut self, update: &Update) {
        let Some(inbound) = update.inbound_text() else {
            debug!(update_id = update.update_id, "Ignoring non-text update");
            return;
        };

        let reply = self.machine.handle(inbound.user, &inbound.text).await;
        if let Err(e) = self
            .client
            .send_message(inbound.chat_id, &reply, Some(inbound.message_id))
            .await
        {
            error!(user.id = %inbound.user, error = %e, "Failed to send reply");
        }
    }
}
