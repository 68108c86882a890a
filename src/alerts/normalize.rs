// src/alerts/normalize.rs
//! Provider shapes → [`AlertDraft`].
//!
//! Two shapes are understood: a JSON object carrying a `messages` or `items`
//! array of message-like objects, and an RSS 2.0 document.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::alerts::types::AlertDraft;

/// Maximum stored length of `content`, in characters.
pub const CONTENT_MAX_CHARS: usize = 500;
/// Entries taken from a single response.
pub const PER_SOURCE_LIMIT: usize = 10;

/// Strip tags, decode entities, normalize quotes, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags (<br> becomes a space so words don't fuse)
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > CONTENT_MAX_CHARS {
        out = out.chars().take(CONTENT_MAX_CHARS).collect();
    }
    out
}

/// Stable id for entries that do not carry one.
pub fn content_id(prefix: &str, parts: &[&str]) -> String {
    let mut h = Sha256::new();
    for p in parts {
        h.update(p.as_bytes());
        h.update([0u8]);
    }
    let digest = h.finalize();
    let hex: String = digest[..6].iter().map(|b| format!("{b:02x}")).collect();
    format!("{prefix}-{hex}")
}

/// RFC 3339 or RFC 2822 text.
pub fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    OffsetDateTime::parse(s, &Rfc2822)
        .ok()
        .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), 0))
}

/// Unix seconds, or milliseconds when the magnitude says so.
fn parse_date_num(n: f64) -> Option<DateTime<Utc>> {
    if !n.is_finite() || n <= 0.0 {
        return None;
    }
    let secs = if n > 1e12 { n / 1000.0 } else { n };
    DateTime::from_timestamp(secs as i64, 0)
}

fn date_from_value(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => n.as_f64().and_then(parse_date_num),
        _ => None,
    }
}

fn first_str<'a>(msg: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|f| msg.get(*f).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

fn id_from_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `{ "messages": [...] }` or `{ "items": [...] }`.
///
/// Per message: id ← `id` (fallback: content hash); date ← `date` | `timestamp`
/// (fallback: `now`); content ← `text` | `content` | `message`; link ← `link`
/// (fallback: `<channel_url>/<id>`, or the channel itself without an id).
/// Messages without text are skipped.
pub fn drafts_from_json(
    payload: &Value,
    channel_url: &str,
    now: DateTime<Utc>,
) -> Result<Vec<AlertDraft>> {
    let messages = payload
        .get("messages")
        .and_then(Value::as_array)
        .or_else(|| payload.get("items").and_then(Value::as_array))
        .ok_or_else(|| anyhow!("json payload has no messages/items array"))?;

    let channel = channel_url.trim_end_matches('/');
    let mut out = Vec::with_capacity(messages.len().min(PER_SOURCE_LIMIT));
    for msg in messages.iter().take(PER_SOURCE_LIMIT) {
        let content = normalize_text(first_str(msg, &["text", "content", "message"]).unwrap_or(""));
        if content.is_empty() {
            continue;
        }
        let raw_id = msg.get("id").and_then(id_from_value);
        let date = ["date", "timestamp"]
            .iter()
            .filter_map(|f| msg.get(*f))
            .find_map(date_from_value)
            .unwrap_or(now);
        let link = match (first_str(msg, &["link"]), raw_id.as_deref()) {
            (Some(l), _) => l.trim().to_string(),
            (None, Some(id)) => format!("{channel}/{id}"),
            (None, None) => channel.to_string(),
        };
        let id = match raw_id {
            Some(id) => format!("zachxbt-{id}"),
            None => content_id("zachxbt", &[&link, &content]),
        };
        out.push(AlertDraft {
            id,
            date,
            content,
            link,
        });
    }
    Ok(out)
}

// ------------------------------------------------------------
// RSS
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

// XML only knows five named entities; feeds routinely use HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

/// Feed entries: content prefers the description over the title.
pub fn drafts_from_rss(
    xml: &str,
    channel_url: &str,
    now: DateTime<Utc>,
) -> Result<Vec<AlertDraft>> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing alert rss xml")?;

    let mut out = Vec::with_capacity(rss.channel.item.len().min(PER_SOURCE_LIMIT));
    for it in rss.channel.item.into_iter().take(PER_SOURCE_LIMIT) {
        let description = normalize_text(it.description.as_deref().unwrap_or_default());
        let content = if description.is_empty() {
            normalize_text(it.title.as_deref().unwrap_or_default())
        } else {
            description
        };
        if content.is_empty() {
            continue;
        }
        let link = it
            .link
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| channel_url.to_string());
        let date = it
            .pub_date
            .as_deref()
            .and_then(parse_date_str)
            .unwrap_or(now);
        out.push(AlertDraft {
            id: content_id("zachxbt-rss", &[&link, &content]),
            date,
            content,
            link,
        });
    }
    Ok(out)
}

/// Drop repeated ids, keeping the first occurrence.
pub fn dedup_by_id(drafts: Vec<AlertDraft>) -> Vec<AlertDraft> {
    let mut seen = HashSet::new();
    drafts
        .into_iter()
        .filter(|d| seen.insert(d.id.clone()))
        .collect()
}
