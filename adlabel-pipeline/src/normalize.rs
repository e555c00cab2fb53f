//! Cleanup for free-text ad fields (creative bodies, transcripts).

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Longest body kept, in characters, before the ellipsis.
pub const MAX_BODY_CHARS: usize = 400;
pub const ELLIPSIS: &str = "...";

const FILLER_PATTERN: &str =
    r"(?i)\b(uh|um|you know|like|I mean|just|really|so|okay|literally|actually)\b";
const HASHTAG_PATTERN: &str = r"#\w+";

fn filler_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FILLER_PATTERN).expect("filler pattern compiles"))
}

fn hashtag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(HASHTAG_PATTERN).expect("hashtag pattern compiles"))
}

/// Clean one free-text field.
///
/// Hashtags are lifted out first (deduplicated, first-seen order), filler
/// words are dropped from what remains, whitespace runs become single
/// spaces, the body is cut to [`MAX_BODY_CHARS`] plus [`ELLIPSIS`], and the
/// hashtags are appended at the end.
///
/// ```
/// use adlabel_pipeline::normalize::normalize;
///
/// assert_eq!(
///     normalize("Um, we   really need you.\n\n#Vote #gotv #Vote"),
///     ", we need you. #Vote #gotv"
/// );
/// assert_eq!(normalize(" \n\t "), "");
/// ```
pub fn normalize(text: &str) -> String {
    let mut seen = HashSet::new();
    let hashtags: Vec<&str> = hashtag_re()
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|tag| seen.insert(*tag))
        .collect();

    let without_tags = hashtag_re().replace_all(text, " ");
    let without_fillers = filler_re().replace_all(&without_tags, "");
    let body = truncate(collapse_whitespace(&without_fillers));

    match (body.is_empty(), hashtags.is_empty()) {
        (_, true) => body,
        (true, false) => hashtags.join(" "),
        (false, false) => format!("{body} {}", hashtags.join(" ")),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(body: String) -> String {
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &body[..cut]),
        None => body,
    }
}
