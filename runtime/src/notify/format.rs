//! Message bodies. Markup is Telegram's legacy Markdown subset.

use crate::model::{ExtractedItem, ExtractionResult, ItemList};
use std::fmt::Write;

pub const ACK_TEXT: &str = "🔄 Fetching latest models...";
pub const FETCH_ERROR_TEXT: &str = "❌ Error fetching models. Please try again later.";
pub const UNAUTHORIZED_TEXT: &str =
    "❌ Unauthorized. This command can only be used in the configured chat.";
pub const BUSY_TEXT: &str = "⏳ A fetch is already running. Please try again later.";
pub const HELP_TEXT: &str = "🤖 *MakerWorld Scraper Bot*\n\n\
Commands:\n\
• `/repeat` - Fetch latest models immediately\n\
• `/help` - Show this help message\n\n\
The bot checks for new models hourly and sends updates automatically.";

/// Join a site root and a path with exactly one `/` between them.
/// Absolute URLs are returned unchanged.
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

/// Escape the characters legacy Markdown treats as entity delimiters.
/// Only valid outside an entity.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Text for the inside of a `*bold*` entity. Legacy Markdown has no escapes
/// inside an entity, so a `*` closes the bold, emits an escaped star and
/// reopens it. Everything else stays raw.
pub fn bold_text(text: &str) -> String {
    text.replace('*', "*\\**")
}

/// One model announcement.
pub fn item_message(item: &ExtractedItem, base_url: &str, timestamp: &str) -> String {
    let title = bold_text(item.get("title").unwrap_or("Untitled"));
    let link = join_url(base_url, item.get("href").unwrap_or_default());
    format!("🔍 *New 3D Model Found!*\n\n*{title}*\n🔗 {link}\n\n📅 Time: {timestamp}")
}

fn entry_line(out: &mut String, n: usize, item: &ExtractedItem, base_url: &str) {
    let _ = match (item.get("title"), item.get("href"), item.get("src")) {
        (Some(title), Some(href), _) => writeln!(
            out,
            "{n}. *{}*\n   🔗 {}",
            bold_text(title),
            join_url(base_url, href)
        ),
        (None, Some(href), _) => writeln!(out, "{n}. 🔗 {}", join_url(base_url, href)),
        (_, None, Some(src)) => writeln!(out, "{n}. 🖼 {}", join_url(base_url, src)),
        _ => {
            let values: Vec<_> = item.fields().map(|(_, v)| escape_markdown(v)).collect();
            writeln!(out, "{n}. {}", values.join(" · "))
        }
    };
}

fn section(out: &mut String, list: &ItemList, base_url: &str) {
    let _ = writeln!(
        out,
        "\n*{}* ({})",
        bold_text(&list.name),
        list.items.len()
    );
    if list.items.is_empty() {
        out.push_str("_nothing found_\n");
    }
    for (i, item) in list.items.iter().enumerate() {
        entry_line(out, i + 1, item, base_url);
    }
}

/// All lists in one message: a section per list, numbered entries.
pub fn digest_message(result: &ExtractionResult, base_url: &str) -> String {
    let mut out = String::from("📊 *MakerWorld Top Models*\n");
    for list in result.lists() {
        section(&mut out, list, base_url);
    }
    let _ = write!(out, "\n📅 Time: {}", result.timestamp());
    out
}
