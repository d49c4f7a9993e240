// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-line `lineno:hash| text` anchoring shared by [`super::read_file`] and
//! [`super::edit_file`]. Anchoring on a content hash instead of a bare line
//! number lets the edit tool locate a line even when earlier edits in the
//! same turn shifted every line number below it.

/// MD5 over the line's whitespace-stripped content, truncated to its first
/// two hex digits. Two hex digits keep the anchor compact; collisions are
/// expected and resolved by [`resolve_hash_to_index`].
pub fn generate_line_hash(line: &str) -> String {
    let digest = md5::compute(line.trim().as_bytes());
    format!("{:02x}", digest[0])
}

/// Render one line in hashline format: `<1-indexed lineno>:<hash>| <content>`.
pub fn format_hashline(lineno: usize, content: &str) -> String {
    format!("{}:{}| {}", lineno, generate_line_hash(content), content)
}

/// Given the 0-indexed positions of every line whose hash equals the
/// requested one, pick the match closest to `hint_lineno` (1-indexed); if no
/// hint is given, or several matches tie on distance, return the first
/// (lowest-index) match.
pub fn resolve_hash_to_index(matches: &[usize], hint_lineno: Option<usize>) -> Option<usize> {
    if matches.is_empty() {
        return None;
    }
    let Some(hint) = hint_lineno else {
        return Some(matches[0]);
    };
    let hint_idx = hint.saturating_sub(1);
    let mut best = matches[0];
    let mut best_dist = best.abs_diff(hint_idx);
    for &m in &matches[1..] {
        let dist = m.abs_diff(hint_idx);
        if dist < best_dist {
            best = m;
            best_dist = dist;
        }
    }
    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_whitespace_insensitive() {
        assert_eq!(generate_line_hash("  x=1  "), generate_line_hash("x=1"));
    }

    #[test]
    fn hash_is_two_hex_digits() {
        let h = generate_line_hash("anything");
        assert_eq!(h.len(), 2);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn resolve_returns_first_when_no_hint() {
        assert_eq!(resolve_hash_to_index(&[2, 5, 9], None), Some(2));
    }

    #[test]
    fn resolve_returns_closest_to_hint() {
        assert_eq!(resolve_hash_to_index(&[2, 5, 9], Some(7)), Some(5));
    }

    #[test]
    fn resolve_empty_matches_returns_none() {
        assert_eq!(resolve_hash_to_index(&[], Some(3)), None);
    }
}
