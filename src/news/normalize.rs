//! Full-text cleanup heuristics applied after enrichment.
//!
//! Extracted article bodies arrive with site boilerplate (consent banners,
//! "report an error" footers, bare share links) and often duplicate the
//! feed's own description. These functions strip the noise and, when the
//! description is missing or echoes the title, derive a replacement from
//! the first sentence-like prefix of the text.

use std::sync::LazyLock;

use regex::Regex;

use super::policy::looks_ukrainian;

/// Character ceiling on a derived description.
const DESCRIPTION_CEILING: usize = 300;

static ERROR_REPORT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)якщо.+помилк.+ctrl\s*\+\s*enter").unwrap());

static COOKIE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)використ\w*\s+файл\w*\s+cookie").unwrap());

static URL_ONLY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://\S+$").unwrap());

static CHARS_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[\d+ chars\]$").unwrap());

fn is_boilerplate(line: &str) -> bool {
    ERROR_REPORT_LINE.is_match(line)
        || COOKIE_LINE.is_match(line)
        || URL_ONLY_LINE.is_match(line)
        || line.contains("читайте текст після реклами")
}

/// Strip boilerplate from an extracted article body: blank lines, consent
/// banners, error-report footers, lines that are nothing but a URL, and
/// runs of immediately-repeated lines.
pub fn clean_full_text(text: &str) -> String {
    let lines: Vec<&str> = text
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_boilerplate(line))
        .collect();

    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let mut j = i + 1;
        while j < lines.len() && lines[j] == lines[i] {
            j += 1;
        }
        // A line that repeats back-to-back is navigation or ad junk;
        // drop the whole run.
        if j - i == 1 {
            kept.push(lines[i]);
        }
        i = j;
    }
    kept.join("\n")
}

/// Remove the upstream teaser's trailing `[NNN chars]` marker.
pub fn strip_chars_suffix(teaser: &str) -> String {
    CHARS_SUFFIX.replace(teaser, "").into_owned()
}

/// Derive a display description for an enriched item.
///
/// Keeps the feed's description when it is valid and neither echoes the
/// title nor merely repeats the opening of the full text; otherwise lifts
/// the first sentence-like line out of the text, subject to a length
/// ceiling, falling back to an empty description. Returns the (possibly
/// trimmed) description and the (possibly shortened) content.
pub fn derive_description(title: &str, description: &str, content: &str) -> (String, String) {
    let mut content = content.to_string();
    let semititle = char_prefix(title, title.chars().count() / 2);

    let mut desc = if !description.is_empty()
        && looks_ukrainian(description)
        && !starts_with_prefix(description, &semititle)
    {
        trim_text_overlap(description, &content)
    } else {
        String::new()
    };

    if description.is_empty() {
        if let Some(first) = content.lines().next() {
            if is_sentence_like(first) {
                desc = first.trim().to_string();
                content = content[first.len()..].trim_start_matches('\n').to_string();
            }
        }
        if starts_with_prefix(&desc, &semititle) {
            desc.clear();
        }
    }

    if desc.is_empty() {
        if let Some((first, rest)) = content.split_once('\n') {
            let mut candidate = first.trim_end_matches([' ', '.']).to_string();
            let mut remainder = rest.trim_start_matches('\n').to_string();
            if candidate.chars().count() > DESCRIPTION_CEILING {
                // Too long for a description; keep only the first sentence
                // and leave the full text intact.
                match candidate.find(". ") {
                    Some(idx) => candidate.truncate(idx),
                    None => candidate.clear(),
                }
                remainder = content.clone();
            }
            if !candidate.is_empty() && remainder.chars().count() > candidate.chars().count() {
                desc = candidate;
                content = remainder;
            }
        }
    }

    if desc == title && !description.is_empty() {
        desc = description.to_string();
    }

    (desc, content)
}

/// A line reads as a complete headline-like sentence when it does not stop
/// mid-thought: anything not ending in a single period, or ending in an
/// ellipsis.
fn is_sentence_like(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && (!line.ends_with('.') || line.ends_with("..."))
}

/// Cut the tail of `description` where it starts overlapping the opening
/// of `content`, then trim trailing punctuation.
fn trim_text_overlap(description: &str, content: &str) -> String {
    let probe = char_prefix(content, description.chars().count() / 4);
    let mut desc = description.to_string();
    if !probe.is_empty() {
        if let Some(idx) = desc.find(&probe) {
            desc.truncate(idx);
        }
    }
    desc.trim_end_matches([' ', '.']).to_string()
}

fn starts_with_prefix(text: &str, prefix: &str) -> bool {
    !prefix.is_empty() && text.starts_with(prefix)
}

fn char_prefix(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}
