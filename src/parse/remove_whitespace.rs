use std::{borrow::Cow, sync::OnceLock};

use regex::Regex;

/// Drops every whitespace character, including the ones between words.
/// Date headers like `"03.17 (월)"` become `"03.17(월)"`.
pub fn remove_whitespace(s: &str) -> Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\s+").expect("regex should be valid"));
    re.replace_all(s.trim(), "")
}
