use std::time::Duration;

use tracing::{error, info, warn};
use url::Url;

use crate::article::{self, Article, Extraction};
use crate::config::{AppConfig, ChannelConfig};
use crate::feed::{FeedEntry, FeedFetcher};
use crate::state::DoneLog;
use crate::telegram::TelegramClient;
use crate::telegraph::{html_to_nodes, ConvertRules, TelegraphClient};
use crate::{Error, Result};

/// Invisible character carrying the page link so the notification's link
/// preview shows the published page.
const INVISIBLE_ANCHOR: char = '\u{2063}';

/// What a full-article entry ended up doing, decided at the entry boundary.
enum EntryOutcome {
    /// Notification delivered; record the done-key.
    Published,
    /// Not extractable or delivery exhausted; retry on a later run.
    Skipped,
}

/// Drives one run: per channel, fetch the feed and publish every entry not
/// yet in the done-log, oldest first.
pub struct Pipeline {
    feeds: FeedFetcher,
    pages: reqwest::Client,
    telegraph: TelegraphClient,
    telegram: TelegramClient,
    rules: ConvertRules,
    done: DoneLog,
    notice_thread_id: i64,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let pages = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            feeds: FeedFetcher::new()?,
            pages,
            telegraph: TelegraphClient::new(config.telegraph_api_base.as_str())?,
            telegram: TelegramClient::new(&config.messaging)?,
            rules: ConvertRules::default(),
            done: DoneLog::new(config.state_file.clone()),
            notice_thread_id: config.notice_thread_id,
        })
    }

    /// Swap the messaging client, e.g. for one with a shorter retry delay.
    pub fn with_telegram(mut self, telegram: TelegramClient) -> Self {
        self.telegram = telegram;
        self
    }

    /// Process one channel's feed to completion. Entry-level failures are
    /// logged and skipped; only feed retrieval or account setup failures
    /// abort the channel.
    pub async fn process_channel(&self, channel: &ChannelConfig) -> Result<()> {
        info!(feed = %channel.feed_url, "reading feed");
        let entries = self.feeds.fetch(&channel.feed_url).await?;
        if entries.is_empty() {
            warn!(feed = %channel.feed_url, "feed has no entries");
            return Ok(());
        }

        let host = feed_host(&channel.feed_url)?;
        // Loaded once per invocation; appends below do not refresh it.
        let done = self.done.load()?;

        // Account tokens are created lazily, once per run, when the channel
        // does not bring its own.
        let access_token = match &channel.access_token {
            Some(token) => token.clone(),
            None => {
                let token = self
                    .telegraph
                    .create_account(&channel.short_name, &channel.author_name, &channel.channel_url)
                    .await?;
                info!(short_name = %channel.short_name, "created publishing account");
                token
            }
        };

        // Feed order is newest-first; process oldest-to-newest so the
        // done-log and the notification stream stay chronological.
        for entry in entries.iter().rev() {
            let done_key = done_key(channel, entry);
            if done.contains(&done_key) {
                continue;
            }

            if !entry.link.contains(&format!("//{host}/")) {
                // Off-site entry: short notice only, recorded after the
                // send attempt regardless of its outcome.
                match self.send_short_notice(channel, entry).await {
                    Ok(()) => self.done.append(&done_key)?,
                    Err(e) => {
                        error!(error = %e, link = %entry.link, "short notice failed");
                    }
                }
                continue;
            }

            match self.publish_entry(channel, entry, &access_token).await {
                Ok(EntryOutcome::Published) => self.done.append(&done_key)?,
                Ok(EntryOutcome::Skipped) => {}
                Err(e) => {
                    // Entry boundary: one bad entry never blocks the batch,
                    // and its key stays unrecorded for the next run.
                    error!(error = %e, link = %entry.link, "entry processing failed");
                }
            }
        }

        Ok(())
    }

    /// Build, publish and announce one on-site entry.
    async fn publish_entry(
        &self,
        channel: &ChannelConfig,
        entry: &FeedEntry,
        access_token: &str,
    ) -> Result<EntryOutcome> {
        info!(title = %entry.title, "building article");

        let article = match article::fetch_article(&self.pages, &entry.link, &entry.published).await? {
            Extraction::Extracted(article) => article,
            Extraction::NotExtractable => {
                warn!(link = %entry.link, "could not extract content");
                return Ok(EntryOutcome::Skipped);
            }
        };

        let nodes = html_to_nodes(&article.content_html, &self.rules);
        let page_url = self
            .telegraph
            .create_page(
                access_token,
                &article.title,
                &channel.author_name,
                Some(&entry.link),
                &nodes,
            )
            .await?;

        match &page_url {
            Some(url) => info!(page = %url, "page created"),
            // Logical API failure: announce without the page link instead
            // of aborting the entry.
            None => warn!(title = %article.title, "page creation failed"),
        }

        let text = format_article_notice(channel, entry, &article, page_url.as_deref());
        if self
            .telegram
            .send_message(&text, self.notice_thread_id, 0)
            .await
            .is_some()
        {
            Ok(EntryOutcome::Published)
        } else {
            Ok(EntryOutcome::Skipped)
        }
    }

    async fn send_short_notice(&self, channel: &ChannelConfig, entry: &FeedEntry) -> Result<()> {
        let date = crate::timefmt::normalize_pub_date(&entry.published)?;
        let text = format_short_notice(channel, entry, &date);
        self.telegram
            .send_message(&text, self.notice_thread_id, 0)
            .await;
        Ok(())
    }
}

/// Composite idempotence key for one feed entry.
fn done_key(channel: &ChannelConfig, entry: &FeedEntry) -> String {
    format!("{},{},{}", channel.author_name, entry.guid, entry.title)
}

/// Host (with port, if any) of the feed URL, used to tell the channel's own
/// articles from syndicated off-site links.
fn feed_host(feed_url: &str) -> Result<String> {
    let url = Url::parse(feed_url)?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::Config(format!("feed URL has no host: {feed_url}")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Quoted description plus the hashtag block, for entries linking off-site.
fn format_short_notice(channel: &ChannelConfig, entry: &FeedEntry, date: &str) -> String {
    format!(
        "<blockquote>{description}…</blockquote>\n\
         ——————————\n\
         #{hashtag} #NEWS\n\
         <blockquote>時間： {date}\n\
         頻道： <a href='{channel_url}'>{author}</a>\n\
         貼文： <a href='{link}'>{title}</a></blockquote>",
        description = html_escape::encode_text(&entry.description),
        hashtag = channel.hashtag,
        channel_url = channel.channel_url,
        author = channel.author_name,
        link = entry.link,
        title = html_escape::encode_text(&entry.title),
    )
}

/// Rich notification for a published article. The page link rides along as
/// an invisible anchor; editor attribution is linked when a URL is known,
/// plain when only a name is, absent otherwise.
fn format_article_notice(
    channel: &ChannelConfig,
    entry: &FeedEntry,
    article: &Article,
    page_url: Option<&str>,
) -> String {
    let url_text = page_url
        .map(|url| format!(" <a href='{url}'>{INVISIBLE_ANCHOR}</a>"))
        .unwrap_or_default();

    let editor_line = if !article.editor_name.is_empty() && !article.editor_url.is_empty() {
        format!(
            "小編： <a href='{}'>{}</a>\n",
            article.editor_url,
            html_escape::encode_text(&article.editor_name)
        )
    } else if !article.editor_name.is_empty() {
        format!("小編： {}\n", html_escape::encode_text(&article.editor_name))
    } else {
        String::new()
    };

    format!(
        "#{hashtag} #NEWS{url_text}\n\
         <blockquote>時間： {date}\n\
         頻道： <a href='{channel_url}'>{author}</a>\n\
         {editor_line}貼文： <a href='{link}'>{title}</a></blockquote>",
        hashtag = channel.hashtag,
        date = article.date,
        channel_url = channel.channel_url,
        author = channel.author_name,
        link = entry.link,
        title = html_escape::encode_text(&article.title),
    )
}
