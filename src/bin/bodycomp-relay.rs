// ABOUTME: Telegram relay binary accepting body-composition readings from allowed users
// ABOUTME: Loads configuration, builds the Garmin backend and runs the long-polling loop
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![recursion_limit = "256"]

//! # Bodycomp Relay Binary
//!
//! Runs the chat bot until Ctrl-C. All settings come from the environment
//! (or a `.env` file); see `BotConfig::from_env`.

use anyhow::{Context, Result};
use bodycomp_relay::{
    config::environment::{BackendSettings, BotConfig},
    conversation::ConversationMachine,
    garmin::GarminBackend,
    logging::LoggingConfig,
    telegram::{TelegramBot, TelegramClient},
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG and LOG_FORMAT may live in .env
    dotenvy::dotenv().ok();
    LoggingConfig::from_env().init()?;

    let config = BotConfig::from_env().context("Failed to load relay configuration")?;
    info!("{}", config.summary());

    let backend = GarminBackend::from_settings(&BackendSettings::from(&config));
    let machine = ConversationMachine::new(
        backend,
        config.allowed_user_ids.clone(),
        config.profiles.clone(),
    );
    let client = TelegramClient::new(&config.telegram_bot_token, config.poll_timeout_secs);

    let mut bot = TelegramBot::new(client, machine, config.poll_timeout_secs);
    bot.run().await?;

    info!("Relay stopped");
    Ok(())
}
