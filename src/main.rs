//! relays prometheus alertmanager webhooks into telegram chats
//!
//! Features:
//! - fixed standard message layout or user supplied tera templates
//! - inline link buttons derived from per-alert labels and annotations
//! - message chunking and html sanitization for the telegram limits

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};

mod alert;
mod chunk;
mod keyboard;
mod log;
mod pipeline;
mod render;
mod sanitize;
mod settings;
mod telegram;
mod webhook;

use pipeline::Pipeline;
use render::Renderer;
use settings::Settings;
use telegram::Client;

/// exit the complete program if one task panics
fn setup_panic_handler() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_panic_handler();

    let settings = Arc::new(
        Settings::load().context("failed to load config and command line arguments")?,
    );

    log::setup_logging(&settings.log).context("could not setup logging")?;

    let renderer = Renderer::new(&settings).context("failed to construct renderer")?;
    let pipeline = Pipeline::new(Arc::clone(&settings), renderer);

    let client = Client::new(&settings.telegram_token);

    // the bot api may not be reachable right after boot, keep trying
    let me = loop {
        match client.get_me().await {
            Ok(me) => break me,
            Err(err) => {
                tracing::error!(error = %err, "error initializing telegram connection");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    };

    let username = me.username.unwrap_or_default();
    tracing::info!(%username, "authorised on account");

    if settings.send_only {
        tracing::info!("works in send_only mode");
    } else {
        tokio::spawn(telegram::updates::run(
            client.clone(),
            Arc::clone(&settings),
            username,
        ));
    }

    let state = Arc::new(
        webhook::AppState::new(Arc::clone(&settings), pipeline, client)
            .context("failed to register metrics")?,
    );

    webhook::run(state).await
}
