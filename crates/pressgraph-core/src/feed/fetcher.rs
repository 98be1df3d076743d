use std::time::Duration;

use reqwest::Client;

use super::models::FeedEntry;
use super::parser::parse_feed;
use crate::{Error, Result};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const REDIRECT_LIMIT: usize = 10;

/// Fetches and parses syndication feeds.
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(REDIRECT_LIMIT))
            .build()?;
        Ok(Self { client })
    }

    /// Fetch a feed and return its entries in feed (newest-first) order.
    pub async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>> {
        tracing::info!("Fetching feed from: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::FeedParse(format!("HTTP {} for URL: {}", status, url)));
        }

        let content = response.bytes().await?;
        parse_feed(&content)
    }
}
