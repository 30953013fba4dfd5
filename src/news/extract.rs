//! Full-text extraction client.
//!
//! Given an article URL, asks an extraction API for the cleaned HTML and
//! reduces it to paragraph text. Transport errors and non-success
//! responses are logged and become "no content"; the pipeline treats a
//! missing `content_full` as the retry signal for the next cycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::Deserialize;
use tracing::error;

use crate::config::ExtractorConfig;
use crate::{NovynyError, Result};

use super::policy::looks_ukrainian;

/// Response field carrying the extracted markup.
const EXTRACT_FIELD: &str = "clean_html";

/// Full-text provider for a single article URL.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Cleaned full text for the URL, or `None` when extraction failed or
    /// produced nothing usable. Never an error.
    async fn extract(&self, url: &str) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    clean_html: Option<String>,
}

/// Client for an extractorapi-style service, rotating across several
/// provisioned API keys to spread quota usage.
pub struct ExtractorApiClient {
    client: Client,
    url: String,
    api_keys: Vec<String>,
    next_key: AtomicUsize,
}

impl ExtractorApiClient {
    /// Create a new client. The key order is shuffled once so that
    /// instances started together do not wear down the same key first.
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        if config.api_keys.is_empty() {
            return Err(NovynyError::Extract("no API keys configured".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NovynyError::Extract(format!("failed to create HTTP client: {e}")))?;

        let mut api_keys = config.api_keys;
        api_keys.shuffle(&mut rand::rng());

        Ok(Self {
            client,
            url: config.url,
            api_keys,
            next_key: AtomicUsize::new(0),
        })
    }

    fn next_key(&self) -> &str {
        let idx = self.next_key.fetch_add(1, Ordering::Relaxed) % self.api_keys.len();
        &self.api_keys[idx]
    }
}

#[async_trait]
impl ContentExtractor for ExtractorApiClient {
    async fn extract(&self, url: &str) -> Option<String> {
        let response = match self
            .client
            .get(&self.url)
            .query(&[
                ("apikey", self.next_key()),
                ("fields", EXTRACT_FIELD),
                ("url", url),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Article extraction failure: {e} ({url})");
                return None;
            }
        };

        if !response.status().is_success() {
            error!(
                "Article extraction error: {} ({url})",
                response.status()
            );
            return None;
        }

        let extracted: ExtractResponse = match response.json().await {
            Ok(extracted) => extracted,
            Err(e) => {
                error!("Article extraction parse failure: {e} ({url})");
                return None;
            }
        };

        let html = extracted.clean_html?;
        let text = paragraphs_text(&html);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Reduce extracted HTML to the text of its `<p>` elements, one line per
/// paragraph, skipping provider self-promotion and paragraphs that fail
/// the language heuristic.
pub fn paragraphs_text(html: &str) -> String {
    let mut paragraphs = Vec::new();
    let mut rest = html;

    while let Some(open) = find_paragraph_open(rest) {
        let after_tag = match rest[open..].find('>') {
            Some(end) => &rest[open + end + 1..],
            None => break,
        };
        let (inner, remainder) = match find_paragraph_close(after_tag) {
            Some(close) => (&after_tag[..close], &after_tag[close + 4..]),
            None => (after_tag, ""),
        };
        let text = strip_tags(inner);
        if !text.is_empty()
            && looks_ukrainian(&text)
            && !text.to_lowercase().contains("extractorapi")
        {
            paragraphs.push(text);
        }
        rest = remainder;
    }

    paragraphs.join("\n")
}

fn find_paragraph_open(html: &str) -> Option<usize> {
    let bytes = html.as_bytes();
    let mut idx = 0;
    while idx + 1 < bytes.len() {
        if bytes[idx] == b'<' && matches!(bytes[idx + 1], b'p' | b'P') {
            // "<p>" or "<p ...>", not "<pre>" or "<param>"
            match bytes.get(idx + 2) {
                Some(b'>') | Some(b' ') | Some(b'\n') | Some(b'\t') => return Some(idx),
                _ => {}
            }
        }
        idx += 1;
    }
    None
}

fn find_paragraph_close(html: &str) -> Option<usize> {
    let bytes = html.as_bytes();
    (0..bytes.len().saturating_sub(3)).find(|&idx| {
        bytes[idx] == b'<'
            && bytes[idx + 1] == b'/'
            && matches!(bytes[idx + 2], b'p' | b'P')
            && bytes[idx + 3] == b'>'
    })
}

/// Strip markup tags and decode the common HTML entities, collapsing
/// whitespace.
fn strip_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut in_entity = false;
    let mut entity = String::new();

    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            '&' if !in_tag => {
                in_entity = true;
                entity.clear();
            }
            ';' if in_entity => {
                in_entity = false;
                match entity.as_str() {
                    "amp" => result.push('&'),
                    "lt" => result.push('<'),
                    "gt" => result.push('>'),
                    "quot" => result.push('"'),
                    "apos" => result.push('\''),
                    "nbsp" => result.push(' '),
                    _ if entity.starts_with('#') => {
                        if let Some(code) = parse_numeric_entity(&entity) {
                            if let Some(c) = char::from_u32(code) {
                                result.push(c);
                            }
                        }
                    }
                    _ => {
                        result.push('&');
                        result.push_str(&entity);
                        result.push(';');
                    }
                }
            }
            _ if in_entity => {
                entity.push(ch);
            }
            _ if !in_tag => {
                result.push(ch);
            }
            _ => {}
        }
    }

    let result: String = result.split_whitespace().collect::<Vec<&str>>().join(" ");
    result.trim().to_string()
}

/// Parse a numeric HTML entity (e.g., "#123" or "#x7B").
fn parse_numeric_entity(entity: &str) -> Option<u32> {
    if entity.starts_with("#x") || entity.starts_with("#X") {
        u32::from_str_radix(&entity[2..], 16).ok()
    } else if let Some(digits) = entity.strip_prefix('#') {
        digits.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_joined_by_newline() {
        let html = "<div><p>Перший абзац</p><p>Другий абзац</p></div>";
        assert_eq!(paragraphs_text(html), "Перший абзац\nДругий абзац");
    }

    #[test]
    fn test_paragraph_attributes_and_nested_tags() {
        let html = r##"<p class="lead">Текст <b>жирний</b> і <a href="#">посилання</a></p>"##;
        assert_eq!(paragraphs_text(html), "Текст жирний і посилання");
    }

    #[test]
    fn test_skips_provider_promotion() {
        let html = "<p>Новина</p><p>Powered by ExtractorAPI</p>";
        assert_eq!(paragraphs_text(html), "Новина");
    }

    #[test]
    fn test_skips_foreign_script_paragraphs() {
        let html = "<p>Українська новина</p><p>Подробности на русском языке объявлены</p>";
        assert_eq!(paragraphs_text(html), "Українська новина");
    }

    #[test]
    fn test_ignores_pre_and_param_tags() {
        let html = "<pre>code</pre><p>Абзац</p>";
        assert_eq!(paragraphs_text(html), "Абзац");
    }

    #[test]
    fn test_empty_html() {
        assert_eq!(paragraphs_text(""), "");
        assert_eq!(paragraphs_text("<div>без абзаців</div>"), "");
    }

    #[test]
    fn test_strip_tags_entities() {
        assert_eq!(strip_tags("A&nbsp;B &amp; C"), "A B & C");
        assert_eq!(strip_tags("&#x41;&#66;"), "AB");
        assert_eq!(strip_tags("<span>x</span> y"), "x y");
    }

    #[test]
    fn test_parse_numeric_entity() {
        assert_eq!(parse_numeric_entity("#65"), Some(65));
        assert_eq!(parse_numeric_entity("#x41"), Some(65));
        assert_eq!(parse_numeric_entity("invalid"), None);
    }

    #[test]
    fn test_key_rotation_round_robin() {
        let config = ExtractorConfig {
            api_keys: vec!["k1".to_string(), "k2".to_string()],
            ..Default::default()
        };
        let client = ExtractorApiClient::new(config).unwrap();
        let first = client.next_key().to_string();
        let second = client.next_key().to_string();
        let third = client.next_key().to_string();
        assert_ne!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn test_requires_api_keys() {
        let config = ExtractorConfig {
            api_keys: vec![],
            ..Default::default()
        };
        assert!(ExtractorApiClient::new(config).is_err());
    }
}
