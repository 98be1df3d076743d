/// A single item from a syndication feed.
///
/// `published` is kept verbatim as the feed's RFC-2822 style string; it is
/// parsed and normalized only at the point a local time is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub link: String,
    pub title: String,
    pub published: String,
    pub guid: String,
    pub description: String,
}
