//! wire types for the telegram bot http api

use serde::{Deserialize, Serialize};

use crate::keyboard::Keyboard;

/// envelope every bot api method responds with
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub description: Option<String>,
    pub result: Option<T>,
}

/// sendMessage request body
#[derive(Debug, Clone, Serialize)]
pub struct SendMessage {
    pub chat_id: i64,
    pub text: String,
    pub parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
    pub disable_web_page_preview: bool,
    pub disable_notification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub url: String,
}

impl From<&Keyboard> for InlineKeyboardMarkup {
    fn from(keyboard: &Keyboard) -> Self {
        Self {
            inline_keyboard: keyboard
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| InlineKeyboardButton {
                            text: button.text.clone(),
                            url: button.url.clone(),
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub new_chat_members: Vec<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

/// getUpdates request body for long polling
#[derive(Debug, Clone, Serialize)]
pub struct GetUpdates {
    pub offset: i64,
    pub timeout: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::Button;

    #[test]
    fn error_envelope_deserializes_without_a_result() {
        // failure responses carry neither result nor, sometimes, description
        let envelope: ApiResponse<User> =
            serde_json::from_str(r#"{"ok":false}"#).unwrap();

        assert!(!envelope.ok);
        assert!(envelope.description.is_none());
        assert!(envelope.result.is_none());
    }

    #[test]
    fn keyboard_converts_to_reply_markup_rows() {
        let keyboard = Keyboard {
            rows: vec![
                vec![Button {
                    text: String::from("Graph 1"),
                    url: String::from("http://x/graph"),
                }],
                vec![Button {
                    text: String::from("Runbook"),
                    url: String::from("http://rb"),
                }],
            ],
        };

        let markup = InlineKeyboardMarkup::from(&keyboard);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0][0].text, "Graph 1");
        assert_eq!(markup.inline_keyboard[1][0].url, "http://rb");
    }

    #[test]
    fn absent_reply_markup_is_omitted_from_the_wire() {
        let request = SendMessage {
            chat_id: 7,
            text: String::from("hi"),
            parse_mode: "HTML",
            reply_to_message_id: None,
            disable_web_page_preview: true,
            disable_notification: false,
            reply_markup: None,
        };

        let wire = serde_json::to_value(&request).unwrap();
        assert!(wire.get("reply_markup").is_none());
        assert!(wire.get("reply_to_message_id").is_none());
        assert_eq!(wire["parse_mode"], "HTML");
    }
}
