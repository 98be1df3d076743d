use std::borrow::Cow;
use std::fmt::Write as _;

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{timefmt, Result};

/// Title selectors tried in order.
const TITLE_SELECTORS: &[&str] = &["h1.entry-title", "h3.entry-title"];
/// Body selectors tried in order.
const CONTENT_SELECTORS: &[&str] = &["div.entry-content", "div.mkdf-post-text-main"];
/// Author credit: the byline anchor and the display-name span inside it.
const AUTHOR_SELECTOR: &str = "li.meta-author a[rel='author']";
const AUTHOR_NAME_SELECTOR: &str = "span.fn";

/// Elements removed from the body before conversion.
const STRIP_TAGS: &[&str] = &["script", "style", "iframe"];
const STRIP_CLASSES: &[&str] = &["social-share"];

/// Elements serialized without children or a closing tag.
const VOID_TAGS: &[&str] = &["br", "hr", "img"];

/// An article assembled from a fetched press-release page. Derived per
/// fetch, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    /// Publication time normalized to UTC+8, `YYYY-MM-DD HH:MM:SS`.
    pub date: String,
    /// Editor credit scraped from the page; empty strings when absent.
    pub editor_name: String,
    pub editor_url: String,
    /// Metadata line plus cleaned body HTML.
    pub content_html: String,
}

/// Outcome of article extraction. A page where neither title nor body
/// selector matches is skippable, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Extracted(Article),
    NotExtractable,
}

/// Fetch a press-release page and extract an [`Article`] from it.
pub async fn fetch_article(
    client: &reqwest::Client,
    url: &str,
    pub_date: &str,
) -> Result<Extraction> {
    let html = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    parse_article(&html, pub_date, url)
}

/// Extract title, body, author credit and normalized time from page HTML.
///
/// Returns [`Extraction::NotExtractable`] when the title or body selectors
/// all fail; missing author sub-fields degrade to empty strings.
pub fn parse_article(html: &str, pub_date: &str, page_url: &str) -> Result<Extraction> {
    let doc = Html::parse_document(html);

    let Some(title_el) = select_first(&doc, TITLE_SELECTORS) else {
        return Ok(Extraction::NotExtractable);
    };
    let Some(content_el) = select_first(&doc, CONTENT_SELECTORS) else {
        return Ok(Extraction::NotExtractable);
    };

    let title = title_el.text().collect::<String>().trim().to_string();
    let date = timefmt::normalize_pub_date(pub_date)?;
    let (editor_name, editor_url) = find_editor(&doc);

    let origin = site_origin(page_url);
    let body = clean_content(content_el, origin.as_deref());
    let info = metadata_line(&date, &editor_name, &editor_url);

    Ok(Extraction::Extracted(Article {
        title,
        date,
        editor_name,
        editor_url,
        content_html: format!("{info}{body}"),
    }))
}

fn select_first<'a>(doc: &'a Html, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(*s).ok())
        .find_map(|sel| doc.select(&sel).next())
}

fn find_editor(doc: &Html) -> (String, String) {
    let Ok(author_sel) = Selector::parse(AUTHOR_SELECTOR) else {
        return (String::new(), String::new());
    };
    let Some(anchor) = doc.select(&author_sel).next() else {
        return (String::new(), String::new());
    };

    let url = anchor.value().attr("href").unwrap_or_default().to_string();
    let name = Selector::parse(AUTHOR_NAME_SELECTOR)
        .ok()
        .and_then(|sel| anchor.select(&sel).next())
        .map(|span| span.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    (name, url)
}

/// `<p><em>…</em></p>` line announcing the local publish time, with a linked
/// editor credit when both name and URL were found, a plain one when only
/// the name was, and the time alone otherwise.
fn metadata_line(date: &str, editor_name: &str, editor_url: &str) -> String {
    if editor_name.is_empty() {
        format!("<p><em>發布時間：{date}</em></p>")
    } else if !editor_url.is_empty() {
        format!(
            "<p><em>發布時間：{date} by&nbsp;<a href=\"{editor_url}\" target=\"_blank\">{}</a></em></p>",
            html_escape::encode_text(editor_name)
        )
    } else {
        format!(
            "<p><em>發布時間：{date} by&nbsp;{}</em></p>",
            html_escape::encode_text(editor_name)
        )
    }
}

fn site_origin(page_url: &str) -> Option<String> {
    let url = Url::parse(page_url).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Re-serialize the body subtree, leaving out stripped elements and
/// rewriting site-root-relative image sources against the page origin.
/// The DOM is immutable, so cleanup happens during serialization.
fn clean_content(element: ElementRef<'_>, origin: Option<&str>) -> String {
    let mut out = String::new();
    write_element(element, origin, &mut out);
    out
}

fn write_node(node: NodeRef<'_, Node>, origin: Option<&str>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            out.push_str(&html_escape::encode_text(&**text));
        }
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                write_element(element, origin, out);
            }
        }
        _ => {}
    }
}

fn write_element(element: ElementRef<'_>, origin: Option<&str>, out: &mut String) {
    let el = element.value();
    let name = el.name();

    if STRIP_TAGS.contains(&name) || el.classes().any(|class| STRIP_CLASSES.contains(&class)) {
        return;
    }

    let _ = write!(out, "<{name}");
    for (attr_name, value) in el.attrs() {
        let value = if name == "img" && attr_name == "src" && value.starts_with('/') {
            match origin {
                Some(origin) => Cow::Owned(format!("{origin}{value}")),
                None => Cow::Borrowed(value),
            }
        } else {
            Cow::Borrowed(value)
        };
        let _ = write!(
            out,
            " {attr_name}=\"{}\"",
            html_escape::encode_double_quoted_attribute(value.as_ref())
        );
    }
    out.push('>');

    if VOID_TAGS.contains(&name) {
        return;
    }

    for child in element.children() {
        write_node(child, origin, out);
    }
    let _ = write!(out, "</{name}>");
}
