mod fetcher;
mod models;
mod parser;

pub use fetcher::FeedFetcher;
pub use models::FeedEntry;
pub use parser::parse_feed;
