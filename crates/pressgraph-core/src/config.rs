use std::env;
use std::path::PathBuf;

use crate::{telegram, telegraph, Error, Result};

/// The press channels this deployment knows about. Each becomes a
/// [`ChannelConfig`] when its `{PREFIX}_RSS` environment variable is set.
const CHANNEL_PRESETS: &[ChannelPreset] = &[
    ChannelPreset {
        env_prefix: "NADA",
        short_name: "nada-news",
        author_name: "智寶國際",
        hashtag: "智寶",
        channel_url: "https://nadaholdings.com/press/",
    },
    ChannelPreset {
        env_prefix: "TROPIC",
        short_name: "tropic-news",
        author_name: "回歸線娛樂",
        hashtag: "回歸線",
        channel_url: "https://tropicse.com/press/",
    },
    ChannelPreset {
        env_prefix: "SHOEI",
        short_name: "shoei-news",
        author_name: "翔英融創",
        hashtag: "翔英",
        channel_url: "https://shoeicontents.com/news/",
    },
];

const DEFAULT_STATE_FILE: &str = "rss.txt";
const DEFAULT_FALLBACK_CHAT_ID: &str = "-1002291115765";
const DEFAULT_NOTICE_THREAD_ID: i64 = 9;

struct ChannelPreset {
    env_prefix: &'static str,
    short_name: &'static str,
    author_name: &'static str,
    hashtag: &'static str,
    channel_url: &'static str,
}

/// A single feed-to-channel binding, immutable for the run.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// URL of the syndication feed to poll.
    pub feed_url: String,
    /// Short name used when creating a publishing account.
    pub short_name: String,
    /// Publisher display name; also the first component of every done-key.
    pub author_name: String,
    /// Hashtag (without `#`) prepended to every notification.
    pub hashtag: String,
    /// Public URL of the channel's press page.
    pub channel_url: String,
    /// Pre-existing publishing access token; created lazily when absent.
    pub access_token: Option<String>,
}

/// Credentials and routing for the messaging API.
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    pub bot_token: String,
    /// Chat used for threaded notifications.
    pub chat_id: String,
    /// Broadcast chat used when no thread is requested.
    pub fallback_chat_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub channels: Vec<ChannelConfig>,
    pub messaging: MessagingConfig,
    pub telegraph_api_base: String,
    /// Newline-delimited done-key log, by default next to the executable.
    pub state_file: PathBuf,
    /// Message thread notifications are posted into.
    pub notice_thread_id: i64,
}

impl AppConfig {
    /// Build the run configuration from environment variables.
    ///
    /// `BOT_TOKEN` and `CHAT_ID` are required. Each channel preset is
    /// included when its `{PREFIX}_RSS` variable is set, carrying an
    /// optional `{PREFIX}_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let bot_token = require_env("BOT_TOKEN")?;
        let chat_id = require_env("CHAT_ID")?;

        let channels = CHANNEL_PRESETS
            .iter()
            .filter_map(|preset| {
                let feed_url = env::var(format!("{}_RSS", preset.env_prefix)).ok()?;
                Some(ChannelConfig {
                    feed_url,
                    short_name: preset.short_name.to_string(),
                    author_name: preset.author_name.to_string(),
                    hashtag: preset.hashtag.to_string(),
                    channel_url: preset.channel_url.to_string(),
                    access_token: env::var(format!("{}_TOKEN", preset.env_prefix)).ok(),
                })
            })
            .collect();

        Ok(Self {
            channels,
            messaging: MessagingConfig {
                bot_token,
                chat_id,
                fallback_chat_id: env::var("FALLBACK_CHAT_ID")
                    .unwrap_or_else(|_| DEFAULT_FALLBACK_CHAT_ID.to_string()),
                api_base: env::var("API_BASE_URL")
                    .unwrap_or_else(|_| telegram::DEFAULT_API_BASE.to_string()),
            },
            telegraph_api_base: env::var("TELEGRAPH_API_BASE")
                .unwrap_or_else(|_| telegraph::DEFAULT_API_BASE.to_string()),
            state_file: default_state_file(),
            notice_thread_id: DEFAULT_NOTICE_THREAD_ID,
        })
    }
}

/// State file lives next to the executable so repeated runs from the same
/// install share one done-log.
fn default_state_file() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_STATE_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
}

fn require_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("missing environment variable {name}")))
}
