//! Snapshot page rendering.
//!
//! Builds the HTML document stored alongside the item collection, so the
//! read path serves bytes without touching the items at all. Regenerated
//! only when the collection changes (`ContentCache::put` invokes it at
//! most once per write).

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sha2::{Digest, Sha256};

use crate::{NovynyError, Result};

use super::normalize::strip_chars_suffix;
use super::types::Article;

/// HTML renderer for the cached snapshot.
pub struct Renderer {
    timezone: Tz,
    site_title: String,
}

impl Renderer {
    /// Create a renderer for the given display timezone and site title.
    pub fn new(timezone: &str, site_title: &str) -> Result<Self> {
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| NovynyError::Config(format!("unknown timezone: {timezone}")))?;
        Ok(Self {
            timezone,
            site_title: site_title.to_string(),
        })
    }

    /// Render the full snapshot page.
    pub fn render_page(&self, items: &[Article]) -> String {
        let mut body = String::new();
        for article in items {
            let text = match &article.content_full {
                Some(full) => full.clone(),
                None => strip_chars_suffix(&article.content),
            };
            body.push_str(&format!(
                concat!(
                    "<article id=\"{id}\">\n",
                    "<h2><a href=\"{url}\">{title}</a></h2>\n",
                    "<p class=\"meta\">{published} — {domain}</p>\n",
                    "{description}",
                    "<div class=\"text\">{text}</div>\n",
                    "</article>\n"
                ),
                id = article_id(&article.url),
                url = escape_html(&article.url),
                title = escape_html(&article.title),
                published = format_published(article.published_at, self.timezone),
                domain = escape_html(article.source_domain()),
                description = if article.description.is_empty() {
                    String::new()
                } else {
                    format!("<p class=\"lead\">{}</p>\n", escape_html(&article.description))
                },
                text = paragraphs_html(&text),
            ));
        }

        self.document(&body)
    }

    /// The placeholder served before the first snapshot exists.
    pub fn loading_page(&self) -> String {
        self.document("<p class=\"loading\">Новини завантажуються, спробуйте за хвилину…</p>\n")
    }

    fn document(&self, body: &str) -> String {
        format!(
            concat!(
                "<!DOCTYPE html>\n",
                "<html lang=\"uk\">\n",
                "<head>\n",
                "<meta charset=\"utf-8\">\n",
                "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
                "<title>{title}</title>\n",
                "<link rel=\"stylesheet\" href=\"/css.css\">\n",
                "</head>\n",
                "<body>\n",
                "<h1>{title}</h1>\n",
                "{body}",
                "</body>\n",
                "</html>\n"
            ),
            title = escape_html(&self.site_title),
            body = body,
        )
    }
}

/// Stable per-article element id derived from the URL.
pub fn article_id(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let hex: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
    format!("article-{hex}")
}

/// Format a publication time as `d.mm.yyyy, h:mm` in the display timezone.
pub fn format_published(published_at: DateTime<Utc>, timezone: Tz) -> String {
    let local = published_at.with_timezone(&timezone);
    local.format("%-d.%m.%Y, %-H:%M").to_string()
}

fn paragraphs_html(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| format!("<p>{}</p>", escape_html(line)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
