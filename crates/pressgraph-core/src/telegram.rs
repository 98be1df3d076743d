use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};

use crate::config::MessagingConfig;
use crate::Result;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const MAX_ATTEMPTS: u32 = 10;
const RETRY_DELAY: Duration = Duration::from_secs(30);
/// From this attempt on, the reply linkage is dropped so an invalid reply
/// target cannot block delivery forever.
const DROP_REPLY_FROM_ATTEMPT: u32 = 5;

/// Placeholder in outgoing text, substituted with the numeric chat id.
const CHAT_ID_PLACEHOLDER: &str = "<MY_CHAT_ID>";

/// Client for the external messaging API.
pub struct TelegramClient {
    client: Client,
    api_url: String,
    chat_id: String,
    fallback_chat_id: String,
    retry_delay: Duration,
}

impl TelegramClient {
    pub fn new(config: &MessagingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_url: format!("{}/bot{}/", config.api_base, config.bot_token),
            chat_id: config.chat_id.clone(),
            fallback_chat_id: config.fallback_chat_id.clone(),
            retry_delay: RETRY_DELAY,
        })
    }

    /// Override the fixed delay between delivery attempts (tests only need
    /// this shorter).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Send an HTML-formatted message, retrying on failure with a fixed
    /// delay up to a hard cap. Returns the API response, or `None` once all
    /// attempts are exhausted; delivery failure is never fatal to the
    /// caller.
    ///
    /// A non-zero `thread_id` posts into that thread of the configured
    /// chat; zero posts to the fallback broadcast chat instead.
    pub async fn send_message(&self, text: &str, thread_id: i64, reply_id: i64) -> Option<Value> {
        let chat_id = if thread_id != 0 {
            &self.chat_id
        } else {
            &self.fallback_chat_id
        };
        let text = text.replace(CHAT_ID_PLACEHOLDER, &chat_id.replace("-100", ""));

        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "link_preview_options": json!({"is_disabled": false}).to_string(),
        });
        if thread_id != 0 {
            payload["message_thread_id"] = json!(thread_id);
        }
        if reply_id != 0 {
            payload["reply_parameters"] = json!(json!({"message_id": reply_id}).to_string());
        }

        let url = format!("{}sendMessage", self.api_url);
        for attempt in 0..MAX_ATTEMPTS {
            if attempt >= DROP_REPLY_FROM_ATTEMPT {
                if let Some(object) = payload.as_object_mut() {
                    object.remove("reply_parameters");
                }
            }

            match self.client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    return response.json().await.ok();
                }
                Ok(response) => {
                    tracing::warn!(
                        status = %response.status(),
                        attempt = attempt + 1,
                        "sendMessage rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt = attempt + 1, "sendMessage failed");
                }
            }

            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        tracing::error!("sendMessage gave up after {MAX_ATTEMPTS} attempts");
        None
    }
}
