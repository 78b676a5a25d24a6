//! Bridge line extraction from raw page text.
//!
//! Pages are scanned as plain text; surrounding HTML or script content is
//! never parsed. Two line shapes are recognised:
//!
//! ```text
//! obfs4 <host>:<port> <FINGERPRINT> cert=<token> iat-mode=<digits>
//! webtunnel <host>:<port> <FINGERPRINT> url=<token> ver=<token>
//! ```
//!
//! The host is matched loosely here; the classifier decides whether it is
//! a usable address.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static OBFS4_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"obfs4 \S+:\d+ [A-F0-9]{40} cert=\S+ iat-mode=\d+").unwrap()
});
static WEBTUNNEL_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"webtunnel \S+:\d+ [A-F0-9]{40} url=\S+ ver=\S+").unwrap()
});

/// Returns every distinct bridge line found in `text`.
///
/// Matches are returned exactly as they appear, first occurrence wins,
/// obfs4 matches before webtunnel matches. No matches is not an error.
pub fn extract_bridge_lines(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut lines = Vec::new();

    for re in [&*OBFS4_LINE_RE, &*WEBTUNNEL_LINE_RE] {
        for m in re.find_iter(text) {
            let line = m.as_str();
            if seen.insert(line) {
                lines.push(line.to_string());
            }
        }
    }

    lines
}
