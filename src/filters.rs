//! Presentation helpers applied to values before they reach a page.
//!
//! These are the small formatting functions page documents use for dates,
//! durations, outbound links and obfuscated e-mail addresses.

use chrono::{format::Item, format::StrftimeItems, DateTime};
use std::fmt::Write;

/// Offset between a 32-bit account id and a 64-bit individual Steam id.
pub const STEAM_ID_OFFSET: u64 = 76_561_197_960_265_728;

/// Default pattern for [`timestamp_to_datestring`].
pub const DEFAULT_DATE_FORMAT: &str = "%b %d, %Y %H:%M";

/// Encode every character as a numeric HTML entity.
///
/// Used primarily for obfuscating email addresses.
#[must_use]
pub fn escape_every_character(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 6);
    for c in text.chars() {
        let _ = write!(out, "&#{};", u32::from(c));
    }
    out
}

/// Format a unix timestamp (UTC) with a strftime pattern.
///
/// Out-of-range timestamps and malformed patterns fall back to the raw number
/// rather than failing the whole page.
#[must_use]
pub fn timestamp_to_datestring(timestamp: i64, format: &str) -> String {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return timestamp.to_string();
    }

    match DateTime::from_timestamp(timestamp, 0) {
        Some(dt) => dt.format_with_items(items.into_iter()).to_string(),
        None => timestamp.to_string(),
    }
}

/// Render a number of seconds the way Python renders a `timedelta`.
///
/// `None` is treated as zero. Negative durations borrow whole days, so
/// `-1` renders as `-1 day, 23:59:59`.
#[must_use]
pub fn seconds_to_time(seconds: Option<i64>) -> String {
    let seconds = seconds.unwrap_or(0);
    let days = seconds.div_euclid(86_400);
    let rem = seconds.rem_euclid(86_400);
    let clock = format!("{}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);

    if days == 0 {
        clock
    } else {
        let plural = if days.abs() == 1 { "" } else { "s" };
        format!("{days} day{plural}, {clock}")
    }
}

#[must_use]
pub fn dota_wiki_link(text: &str) -> String {
    format!("http://dota2wiki.com/wiki/{}", text.replace(' ', "_"))
}

#[must_use]
pub fn dotabuff_hero_link(text: &str) -> String {
    format!(
        "http://dotabuff.com/heroes/{}",
        text.replace(' ', "-").to_lowercase()
    )
}

#[must_use]
pub fn dotabuff_item_link(text: &str) -> String {
    format!(
        "http://dotabuff.com/items/{}",
        text.replace(' ', "-").to_lowercase()
    )
}

#[must_use]
pub fn dotabuff_match_link(match_id: i64) -> String {
    format!("http://dotabuff.com/matches/{match_id}")
}

#[must_use]
pub const fn steamid_from_accountid(account_id: u32) -> u64 {
    account_id as u64 + STEAM_ID_OFFSET
}

#[must_use]
pub const fn accountid_from_steamid(steam_id: u64) -> u32 {
    (steam_id & 0xFFFF_FFFF) as u32
}
