use std::path::PathBuf;
use std::time::Duration;

use pressgraph_core::telegram::TelegramClient;
use pressgraph_core::{AppConfig, ChannelConfig, MessagingConfig, Pipeline};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const SEND_PATH: &str = "/botTESTTOKEN/sendMessage";

fn config(server: &MockServer, state_file: PathBuf, access_token: Option<&str>) -> AppConfig {
    AppConfig {
        channels: vec![ChannelConfig {
            feed_url: format!("{}/feed.xml", server.uri()),
            short_name: "example-news".to_string(),
            author_name: "Example Press".to_string(),
            hashtag: "example".to_string(),
            channel_url: "https://example.com/press/".to_string(),
            access_token: access_token.map(String::from),
        }],
        messaging: MessagingConfig {
            bot_token: "TESTTOKEN".to_string(),
            chat_id: "-100200300".to_string(),
            fallback_chat_id: "-100999888".to_string(),
            api_base: server.uri(),
        },
        telegraph_api_base: server.uri(),
        state_file,
        notice_thread_id: 9,
    }
}

fn pipeline(config: &AppConfig) -> Pipeline {
    // Keep delivery retries fast if a test ever exercises them.
    let telegram = TelegramClient::new(&config.messaging)
        .unwrap()
        .with_retry_delay(Duration::from_millis(1));
    Pipeline::new(config).unwrap().with_telegram(telegram)
}

fn feed_xml(server: &MockServer, items: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
<title>Example Press</title><link>{}/press/</link><description>press</description>
{items}
</channel></rss>"#,
        server.uri()
    )
}

fn on_site_item(server: &MockServer, slug: &str, title: &str, pub_date: &str) -> String {
    format!(
        "<item><title>{title}</title><link>{}/press/{slug}</link>\
         <pubDate>{pub_date}</pubDate><guid>{slug}</guid>\
         <description>{title} description</description></item>",
        server.uri()
    )
}

const ARTICLE_PAGE: &str = r#"<html><body>
<h1 class="entry-title">Launch Day</h1>
<div class="entry-content"><p>We launched.</p><script>track()</script></div>
</body></html>"#;

async fn mount_feed(server: &MockServer, xml: String) {
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(xml, "application/rss+xml"))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, slug: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/press/{slug}")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html.to_string(), "text/html"))
        .mount(server)
        .await;
}

async fn mount_telegraph(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/createAccount"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"access_token": "fresh-token"}
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/createPage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"url": "https://telegra.ph/Launch-Day"}
        })))
        .mount(server)
        .await;
}

async fn mount_telegram(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"message_id": 1}
        })))
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, url_path: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == url_path)
        .collect()
}

#[tokio::test]
async fn publishes_new_entry_and_records_done_key() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("rss.txt");

    let items = on_site_item(&server, "1", "Launch Day", "Tue, 01 Jan 2024 10:00:00 +0000");
    mount_feed(&server, feed_xml(&server, &items)).await;
    mount_page(&server, "1", ARTICLE_PAGE).await;
    mount_telegraph(&server).await;
    mount_telegram(&server).await;

    let config = config(&server, state_file.clone(), Some("tok"));
    pipeline(&config)
        .process_channel(&config.channels[0])
        .await
        .unwrap();

    // Page created and announced.
    assert_eq!(requests_to(&server, "/createPage").await.len(), 1);
    let sends = requests_to(&server, SEND_PATH).await;
    assert_eq!(sends.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&sends[0].body).unwrap();
    let text = body["text"].as_str().unwrap();
    assert!(text.contains("#example #NEWS"));
    assert!(text.contains("https://telegra.ph/Launch-Day"));
    assert!(text.contains("2024-01-01 18:00:00"));

    // Done-key appended after the send succeeded.
    let state = std::fs::read_to_string(&state_file).unwrap();
    assert_eq!(state, "Example Press,1,Launch Day\n");

    // Channel brought its own token, so no account was created.
    assert!(requests_to(&server, "/createAccount").await.is_empty());
}

#[tokio::test]
async fn entries_are_processed_oldest_first() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    // Feed order is newest-first.
    let items = format!(
        "{}{}",
        on_site_item(&server, "new", "Newer", "Wed, 02 Jan 2024 10:00:00 +0000"),
        on_site_item(&server, "old", "Older", "Tue, 01 Jan 2024 10:00:00 +0000"),
    );
    mount_feed(&server, feed_xml(&server, &items)).await;
    mount_page(&server, "new", ARTICLE_PAGE).await;
    mount_page(&server, "old", ARTICLE_PAGE).await;
    mount_telegraph(&server).await;
    mount_telegram(&server).await;

    let config = config(&server, dir.path().join("rss.txt"), Some("tok"));
    pipeline(&config)
        .process_channel(&config.channels[0])
        .await
        .unwrap();

    let sends = requests_to(&server, SEND_PATH).await;
    assert_eq!(sends.len(), 2);
    let first: serde_json::Value = serde_json::from_slice(&sends[0].body).unwrap();
    let second: serde_json::Value = serde_json::from_slice(&sends[1].body).unwrap();
    assert!(first["text"].as_str().unwrap().contains("/press/old"));
    assert!(second["text"].as_str().unwrap().contains("/press/new"));
}

#[tokio::test]
async fn second_run_with_shared_state_is_idempotent() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("rss.txt");

    let items = on_site_item(&server, "1", "Launch Day", "Tue, 01 Jan 2024 10:00:00 +0000");
    mount_feed(&server, feed_xml(&server, &items)).await;
    mount_page(&server, "1", ARTICLE_PAGE).await;
    mount_telegraph(&server).await;
    mount_telegram(&server).await;

    let config = config(&server, state_file.clone(), Some("tok"));
    let pipeline = pipeline(&config);
    pipeline.process_channel(&config.channels[0]).await.unwrap();
    pipeline.process_channel(&config.channels[0]).await.unwrap();

    // No additional page fetch, publish or send on the second run.
    assert_eq!(requests_to(&server, "/press/1").await.len(), 1);
    assert_eq!(requests_to(&server, "/createPage").await.len(), 1);
    assert_eq!(requests_to(&server, SEND_PATH).await.len(), 1);
    let state = std::fs::read_to_string(&state_file).unwrap();
    assert_eq!(state.lines().count(), 1);
}

#[tokio::test]
async fn off_site_entry_gets_short_notice_without_extraction() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("rss.txt");

    let items = "<item><title>Partner News</title>\
         <link>https://partner.example.org/post/5</link>\
         <pubDate>Tue, 01 Jan 2024 10:00:00 +0000</pubDate><guid>p5</guid>\
         <description>Partner update</description></item>";
    mount_feed(&server, feed_xml(&server, items)).await;
    mount_telegraph(&server).await;
    mount_telegram(&server).await;

    let config = config(&server, state_file.clone(), Some("tok"));
    pipeline(&config)
        .process_channel(&config.channels[0])
        .await
        .unwrap();

    // Short notice only: no page fetch, no page creation.
    assert!(requests_to(&server, "/createPage").await.is_empty());
    let sends = requests_to(&server, SEND_PATH).await;
    assert_eq!(sends.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&sends[0].body).unwrap();
    let text = body["text"].as_str().unwrap();
    assert!(text.starts_with("<blockquote>Partner update…</blockquote>"));
    assert!(text.contains("https://partner.example.org/post/5"));

    let state = std::fs::read_to_string(&state_file).unwrap();
    assert_eq!(state, "Example Press,p5,Partner News\n");
}

#[tokio::test]
async fn unextractable_page_is_skipped_and_retried_next_run() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("rss.txt");

    let items = on_site_item(&server, "1", "Launch Day", "Tue, 01 Jan 2024 10:00:00 +0000");
    mount_feed(&server, feed_xml(&server, &items)).await;
    mount_page(&server, "1", "<html><body><p>unrelated layout</p></body></html>").await;
    mount_telegraph(&server).await;
    mount_telegram(&server).await;

    let config = config(&server, state_file.clone(), Some("tok"));
    pipeline(&config)
        .process_channel(&config.channels[0])
        .await
        .unwrap();

    // Nothing published, nothing sent, nothing recorded.
    assert!(requests_to(&server, "/createPage").await.is_empty());
    assert!(requests_to(&server, SEND_PATH).await.is_empty());
    assert!(!state_file.exists());
}

#[tokio::test]
async fn page_creation_failure_degrades_notification() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("rss.txt");

    let items = on_site_item(&server, "1", "Launch Day", "Tue, 01 Jan 2024 10:00:00 +0000");
    mount_feed(&server, feed_xml(&server, &items)).await;
    mount_page(&server, "1", ARTICLE_PAGE).await;
    Mock::given(method("POST"))
        .and(path("/createPage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "error": "CONTENT_REQUIRED"
        })))
        .mount(&server)
        .await;
    mount_telegram(&server).await;

    let config = config(&server, state_file.clone(), Some("tok"));
    pipeline(&config)
        .process_channel(&config.channels[0])
        .await
        .unwrap();

    // Announced without a page link, and still recorded as done.
    let sends = requests_to(&server, SEND_PATH).await;
    assert_eq!(sends.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&sends[0].body).unwrap();
    assert!(!body["text"].as_str().unwrap().contains("telegra.ph"));
    assert!(state_file.exists());
}

#[tokio::test]
async fn delivery_failure_leaves_entry_unrecorded() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("rss.txt");

    let items = on_site_item(&server, "1", "Launch Day", "Tue, 01 Jan 2024 10:00:00 +0000");
    mount_feed(&server, feed_xml(&server, &items)).await;
    mount_page(&server, "1", ARTICLE_PAGE).await;
    mount_telegraph(&server).await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = config(&server, state_file.clone(), Some("tok"));
    pipeline(&config)
        .process_channel(&config.channels[0])
        .await
        .unwrap();

    // Full-article branch records only after a successful send.
    assert_eq!(requests_to(&server, SEND_PATH).await.len(), 10);
    assert!(!state_file.exists());
}

#[tokio::test]
async fn account_is_created_lazily_when_no_token_configured() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let items = on_site_item(&server, "1", "Launch Day", "Tue, 01 Jan 2024 10:00:00 +0000");
    mount_feed(&server, feed_xml(&server, &items)).await;
    mount_page(&server, "1", ARTICLE_PAGE).await;
    mount_telegraph(&server).await;
    mount_telegram(&server).await;

    let config = config(&server, dir.path().join("rss.txt"), None);
    pipeline(&config)
        .process_channel(&config.channels[0])
        .await
        .unwrap();

    assert_eq!(requests_to(&server, "/createAccount").await.len(), 1);
    let pages = requests_to(&server, "/createPage").await;
    let body = String::from_utf8(pages[0].body.clone()).unwrap();
    assert!(body.contains("access_token=fresh-token"));
}

#[tokio::test]
async fn broken_entry_does_not_block_the_batch() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("rss.txt");

    // Older entry's page 404s; newer one is fine.
    let items = format!(
        "{}{}",
        on_site_item(&server, "good", "Good", "Wed, 02 Jan 2024 10:00:00 +0000"),
        on_site_item(&server, "bad", "Bad", "Tue, 01 Jan 2024 10:00:00 +0000"),
    );
    mount_feed(&server, feed_xml(&server, &items)).await;
    Mock::given(method("GET"))
        .and(path("/press/bad"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(&server, "good", ARTICLE_PAGE).await;
    mount_telegraph(&server).await;
    mount_telegram(&server).await;

    let config = config(&server, state_file.clone(), Some("tok"));
    pipeline(&config)
        .process_channel(&config.channels[0])
        .await
        .unwrap();

    // The bad entry is skipped and unrecorded; the good one goes through.
    let state = std::fs::read_to_string(&state_file).unwrap();
    assert_eq!(state, "Example Press,good,Good\n");
    assert_eq!(requests_to(&server, SEND_PATH).await.len(), 1);
}
