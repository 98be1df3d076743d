pub mod article;
pub mod config;
pub mod error;
pub mod feed;
pub mod pipeline;
pub mod state;
pub mod telegram;
pub mod telegraph;
pub mod timefmt;

pub use config::{AppConfig, ChannelConfig, MessagingConfig};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
