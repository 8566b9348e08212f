//! Media URL recognition and normalization.
//!
//! Two layers:
//! - video URLs: watch-page, short-link and embed-link forms are reduced to an
//!   11-character id and canonicalized to one watch-page URL;
//! - general web input: bare hostnames, `http(s)` URLs, IPv4 literals and
//!   `localhost` are accepted and given a default scheme, anything else turns
//!   into a search query.
//!
//! An empty string returned from a normalizer means the input was rejected.

use std::sync::OnceLock;

use regex::Regex;

const VIDEO_ID: &str = "([a-zA-Z0-9_-]{11})";
const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";
const SEARCH_URL_PREFIX: &str = "https://www.google.com/search?q=";
const DEFAULT_SCHEME: &str = "https://";

struct VideoPatterns {
    watch: Regex,
    short: Regex,
    embed: Regex,
    id: Regex,
}

struct WebPatterns {
    host: Regex,
    localhost: Regex,
    ipv4: Regex,
}

fn video_patterns() -> &'static VideoPatterns {
    static PATTERNS: OnceLock<VideoPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| VideoPatterns {
        watch: Regex::new(&format!(
            r"(?:https?://)?(?:www\.)?youtube\.com/watch\?.*v={VIDEO_ID}"
        ))
        .expect("watch pattern"),
        short: Regex::new(&format!(r"(?:https?://)?youtu\.be/{VIDEO_ID}")).expect("short pattern"),
        embed: Regex::new(&format!(
            r"(?:https?://)?(?:www\.)?youtube\.com/embed/{VIDEO_ID}"
        ))
        .expect("embed pattern"),
        id: Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("id pattern"),
    })
}

fn web_patterns() -> &'static WebPatterns {
    static PATTERNS: OnceLock<WebPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| WebPatterns {
        host: Regex::new(
            r"(?i)^(https?://)?([a-z0-9]([a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}(:\d{1,5})?(/\S*)?$",
        )
        .expect("host pattern"),
        localhost: Regex::new(r"(?i)^(https?://)?localhost(:\d{1,5})?(/\S*)?$")
            .expect("localhost pattern"),
        ipv4: Regex::new(
            r"(?i)^(https?://)?((25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)(:\d{1,5})?(/\S*)?$",
        )
        .expect("ipv4 pattern"),
    })
}

/// Extract the 11-character video id from a watch, short or embed URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let patterns = video_patterns();
    [&patterns.watch, &patterns.short, &patterns.embed]
        .into_iter()
        .find_map(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Returns `true` when the input is a recognised video URL.
pub fn is_valid(url: &str) -> bool {
    extract_video_id(url).is_some()
}

/// Canonical watch-page URL for the input, or an empty string when unrecognised.
pub fn normalize(url: &str) -> String {
    extract_video_id(url)
        .map(|id| format_watch_url(&id))
        .unwrap_or_default()
}

/// Build the canonical watch-page URL for an id; empty when the id is malformed.
pub fn format_watch_url(video_id: &str) -> String {
    if !is_valid_video_id(video_id) {
        return String::new();
    }
    format!("{WATCH_URL_PREFIX}{video_id}")
}

pub fn is_valid_video_id(video_id: &str) -> bool {
    video_patterns().id.is_match(video_id)
}

/// Accepts bare hostnames, `http(s)` URLs, IPv4 literals and `localhost`.
pub fn is_valid_web_url(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return false;
    }
    let patterns = web_patterns();
    patterns.host.is_match(trimmed)
        || patterns.localhost.is_match(trimmed)
        || patterns.ipv4.is_match(trimmed)
}

/// Prefix `https://` when the input carries no scheme.
pub fn normalize_web_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{trimmed}")
    }
}

/// Search-engine query URL for free text.
pub fn to_search_url(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return SEARCH_URL_PREFIX.to_string();
    }
    // Form encoding: spaces become '+'.
    let encoded = urlencoding::encode(trimmed).replace("%20", "+");
    format!("{SEARCH_URL_PREFIX}{encoded}")
}

/// Turn address-bar input into something loadable: a URL when it looks like
/// one, otherwise a search query.
pub fn process_input(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if is_valid_web_url(trimmed) {
        normalize_web_url(trimmed)
    } else {
        to_search_url(trimmed)
    }
}
