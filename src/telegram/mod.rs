//! thin client for the telegram bot http api
//!
//! Only the three methods the relay needs: getMe to verify the token at
//! startup, sendMessage for outgoing chunks and getUpdates for the chat id
//! responder. The wire protocol lives in [types].

pub mod types;
pub mod updates;

use anyhow::{bail, Context, Result};

use types::{ApiResponse, GetUpdates, Message, SendMessage, Update, User};

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new(token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("https://api.telegram.org/bot{token}"),
        }
    }

    /// Identifies the bot account.
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({})).await
    }

    pub async fn send_message(&self, message: &SendMessage) -> Result<Message> {
        self.call("sendMessage", message).await
    }

    /// Long-polls for updates; the server holds the request open for up to
    /// `timeout` seconds.
    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>> {
        self.call("getUpdates", &GetUpdates { offset, timeout }).await
    }

    async fn call<T, R>(&self, method: &str, payload: &T) -> Result<R>
    where
        T: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{method}", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?;

        let status = response.status();
        // the api reports failures inside the envelope, not via status codes
        let body: ApiResponse<R> = response
            .json()
            .await
            .with_context(|| format!("{method} returned an unreadable body ({status})"))?;

        if !body.ok {
            bail!(
                "{method} failed ({status}): {}",
                body.description.unwrap_or_default()
            );
        }

        body.result
            .with_context(|| format!("{method} returned no result"))
    }
}
