//! long-poll loop answering chats with their id
//!
//! Alertmanager routes address chats by numeric id, which telegram does not
//! show anywhere, so the bot replies with it to any text message and
//! introduces itself when added to a group.

use std::{sync::Arc, time::Duration};

use crate::{
    settings::Settings,
    telegram::{
        types::{Message, SendMessage},
        Client,
    },
};

/// seconds the server holds a getUpdates poll open
const POLL_TIMEOUT: u64 = 60;

/// Runs until the process exits; fetch errors are logged and retried.
pub async fn run(client: Client, settings: Arc<Settings>, bot_username: String) {
    let mut offset = 0i64;

    loop {
        let updates = match client.get_updates(offset, POLL_TIMEOUT).await {
            Ok(updates) => updates,
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch updates");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let message = match update.message {
                Some(message) => message,
                None => {
                    tracing::debug!(update_id = update.update_id, "update without message");
                    continue;
                }
            };

            if should_introduce(&message, &bot_username) {
                introduce(&client, &settings, &message).await;
            }
        }
    }
}

/// A plain text message asks for the chat id; the bot joining a group gets
/// an unprompted introduction.
fn should_introduce(message: &Message, bot_username: &str) -> bool {
    if !message.new_chat_members.is_empty() {
        return message.chat.kind == "group"
            && message
                .new_chat_members
                .iter()
                .any(|member| member.username.as_deref() == Some(bot_username));
    }

    matches!(&message.text, Some(text) if !text.is_empty())
}

async fn introduce(client: &Client, settings: &Settings, message: &Message) {
    let reply = SendMessage {
        chat_id: message.chat.id,
        text: format!("Chat id is '{}'", message.chat.id),
        parse_mode: "HTML",
        reply_to_message_id: None,
        disable_web_page_preview: false,
        disable_notification: settings.disable_notification,
        reply_markup: None,
    };

    if let Err(err) = client.send_message(&reply).await {
        tracing::error!(error = %err, chat_id = message.chat.id, "failed to send introduction");
    }
}
