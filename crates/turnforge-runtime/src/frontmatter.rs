// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared `---`-delimited YAML front-matter splitting, used by both subagent
//! and skill markdown discovery.

/// Splits `---\n<yaml>\n---\n<body>` into `(yaml, body)`. If the text does
/// not open with a front-matter fence, the whole text is returned as the
/// body with no front-matter.
pub fn split(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text.strip_prefix("---") else {
        return (None, text);
    };
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    let Some(end) = rest.find("\n---") else {
        return (None, text);
    };
    let yaml = &rest[..end];
    let after = &rest[end + 4..];
    let body = after
        .strip_prefix('\n')
        .unwrap_or(after)
        .trim_start_matches('\r');
    (Some(yaml), body)
}
