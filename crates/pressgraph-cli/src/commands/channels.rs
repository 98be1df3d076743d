use anyhow::Result;

use pressgraph_core::AppConfig;

/// Print the channels the current environment configures.
pub fn run(config: &AppConfig) -> Result<()> {
    if config.channels.is_empty() {
        println!("No channels configured. Set NADA_RSS, TROPIC_RSS or SHOEI_RSS.");
        return Ok(());
    }

    for channel in &config.channels {
        let token = if channel.access_token.is_some() {
            "token set"
        } else {
            "token created per run"
        };
        println!(
            "{:<12} #{:<6} {} ({})",
            channel.short_name, channel.hashtag, channel.feed_url, token
        );
    }
    println!("\nState file: {}", config.state_file.display());

    Ok(())
}
