//! URL utilities for script addresses and playback query parameters

use url::Url;

/// Origin used to absolutize relative player-script paths.
pub const PLATFORM_ORIGIN: &str = "https://www.youtube.com";

/// Script URL tokens come in three forms: protocol-relative (`//host/...`),
/// origin-relative (`/s/player/...`), and absolute.
pub fn normalize_script_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else if url.starts_with('/') {
        format!("{PLATFORM_ORIGIN}{url}")
    } else {
        url.to_string()
    }
}

/// The text between the first occurrence of `start` and the next `end`.
pub fn extract_between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let to = text[from..].find(end)? + from;
    Some(&text[from..to])
}

/// Sets `key=value` in the URL query, replacing any existing occurrence and
/// preserving every other parameter.
pub fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (k, v) in &kept {
        pairs.append_pair(k, v);
    }
    pairs.append_pair(key, value);
}
