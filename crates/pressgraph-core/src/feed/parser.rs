use rss::Channel;

use super::models::FeedEntry;
use crate::{Error, Result};

/// Parse RSS content into feed entries, in feed (newest-first) order.
///
/// Items missing any of the required fields (link, title, pubDate, guid) are
/// logged and dropped rather than failing the whole feed.
pub fn parse_feed(content: &[u8]) -> Result<Vec<FeedEntry>> {
    let channel = Channel::read_from(content).map_err(|e| Error::FeedParse(e.to_string()))?;

    let mut entries = Vec::with_capacity(channel.items().len());
    for item in channel.items() {
        match entry_from_item(item) {
            Some(entry) => entries.push(entry),
            None => {
                tracing::warn!(
                    title = item.title().unwrap_or("<untitled>"),
                    "skipping feed item with missing required fields"
                );
            }
        }
    }

    Ok(entries)
}

fn entry_from_item(item: &rss::Item) -> Option<FeedEntry> {
    Some(FeedEntry {
        link: item.link()?.to_string(),
        title: item.title()?.to_string(),
        published: item.pub_date()?.to_string(),
        guid: item.guid()?.value().to_string(),
        description: item.description().unwrap_or_default().to_string(),
    })
}
