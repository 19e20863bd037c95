//! Unpacker for `eval(function(p,a,c,k,e,d){...})` packed scripts
//!
//! Several embed hosts ship their player setup through Dean Edwards'
//! packer. The payload is a template whose word tokens index into a
//! `|`-separated keyword table, encoded in the given radix.

use regex::Regex;
use std::sync::LazyLock;

const PACKED_MARKER: &str = "eval(function(p,a,c,k,e,";

static PACKED_ARGS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)\}\s*\(\s*'((?:[^'\\]|\\.)*)'\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*'((?:[^'\\]|\\.)*)'\s*\.split\(\s*'\|'\s*\)"#,
    )
    .ok()
});

static WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b\w+\b").ok());

pub fn is_packed(script: &str) -> bool {
    script.contains(PACKED_MARKER)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn digit_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => Some(c as u32 - '0' as u32),
        'a'..='z' => Some(c as u32 - 'a' as u32 + 10),
        'A'..='Z' => Some(c as u32 - 'A' as u32 + 36),
        _ => None,
    }
}

/// Decodes a packer word in the given radix (up to 62)
fn decode_word(word: &str, radix: u32) -> Option<usize> {
    let mut value: usize = 0;
    for c in word.chars() {
        let digit = digit_value(c)?;
        if digit >= radix {
            return None;
        }
        value = value.checked_mul(radix as usize)?.checked_add(digit as usize)?;
    }
    Some(value)
}

/// Unpacks every packed block in `html`, in document order
pub fn unpack_all(html: &str) -> Vec<String> {
    let Some(args) = PACKED_ARGS.as_ref() else {
        return Vec::new();
    };
    let Some(word) = WORD.as_ref() else {
        return Vec::new();
    };

    args.captures_iter(html)
        .filter_map(|caps| {
            let payload = unescape(caps.get(1)?.as_str());
            let radix: u32 = caps.get(2)?.as_str().parse().ok()?;
            let keywords: Vec<&str> = caps.get(4)?.as_str().split('|').collect();
            if !(2..=62).contains(&radix) {
                return None;
            }

            let unpacked = word.replace_all(&payload, |m: &regex::Captures<'_>| {
                let token = &m[0];
                decode_word(token, radix)
                    .and_then(|i| keywords.get(i))
                    .filter(|k| !k.is_empty())
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| token.to_string())
            });
            Some(unpacked.into_owned())
        })
        .collect()
}

/// Page text with every packed script appended in unpacked form
pub fn expand_packed(html: &str) -> String {
    if !is_packed(html) {
        return html.to_string();
    }
    let mut expanded = html.to_string();
    for block in unpack_all(html) {
        expanded.push('\n');
        expanded.push_str(&block);
    }
    expanded
}
