use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use super::nodes::ContentNode;
use crate::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.telegra.ph";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Response envelope shared by all publishing API calls.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Account {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Page {
    url: String,
}

/// Client for the external publishing API.
pub struct TelegraphClient {
    client: Client,
    api_base: String,
}

impl TelegraphClient {
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into(),
        })
    }

    /// Create a publishing account and return its access token.
    ///
    /// Unlike page creation, a failure here is fatal to the channel: nothing
    /// can be published without a token.
    pub async fn create_account(
        &self,
        short_name: &str,
        author_name: &str,
        author_url: &str,
    ) -> Result<String> {
        let response: ApiResponse<Account> = self
            .client
            .post(format!("{}/createAccount", self.api_base))
            .form(&[
                ("short_name", short_name),
                ("author_name", author_name),
                ("author_url", author_url),
            ])
            .send()
            .await?
            .json()
            .await?;

        match response.result {
            Some(account) if response.ok => Ok(account.access_token),
            _ => Err(Error::Telegraph(format!(
                "createAccount failed: {}",
                response.error.unwrap_or_else(|| "unknown error".to_string())
            ))),
        }
    }

    /// Create a page from an already-converted node sequence.
    ///
    /// Returns the page URL, or `None` when the API reports a logical
    /// failure (`ok: false`); the caller degrades the notification instead
    /// of aborting the entry.
    pub async fn create_page(
        &self,
        access_token: &str,
        title: &str,
        author_name: &str,
        author_url: Option<&str>,
        content: &[ContentNode],
    ) -> Result<Option<String>> {
        let content_json = serde_json::to_string(content)?;

        let mut form = vec![
            ("access_token", access_token),
            ("title", title),
            ("author_name", author_name),
            ("content", content_json.as_str()),
            ("return_content", "false"),
        ];
        if let Some(url) = author_url {
            form.push(("author_url", url));
        }

        let response: ApiResponse<Page> = self
            .client
            .post(format!("{}/createPage", self.api_base))
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        if response.ok {
            Ok(response.result.map(|page| page.url))
        } else {
            tracing::warn!(
                error = response.error.as_deref().unwrap_or("unknown error"),
                nodes = %content_json,
                "createPage failed"
            );
            Ok(None)
        }
    }
}
