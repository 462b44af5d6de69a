//! Plain-text rendering of note bodies.
//!
//! Bodies are HTML fragments produced by a content-editable surface. Titles and
//! status-bar counts are computed on the rendered text, where block elements
//! and `<br>` start new lines and markup is dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::repo::UNTITLED;

static BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^</?(?:h[1-6]|p|div|li|ul|ol|blockquote|pre|tr|table|section|article|header|footer)(?:\s[^>]*)?/?>$",
    )
    .expect("valid block tag pattern")
});

static BREAK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^<br(?:\s[^>]*)?/?>$").expect("valid line break pattern"));

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]{2,8});").expect("valid entity pattern")
});

static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\n]+").expect("valid space pattern"));

/// Character and line counts shown next to the editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextStats {
    pub chars: usize,
    pub lines: usize,
}

/// Renders an HTML fragment to the text a reader would see.
///
/// A block boundary ends the current line unless it is already ended, so
/// nested or adjacent blocks never add blank lines. Every `<br>` ends a line,
/// which keeps deliberately empty lines (an emptied heading, a blank
/// paragraph) in place.
pub fn plain_text(html: &str) -> String {
    let flattened = SPACES.replace_all(html, " ");
    let mut out = String::new();
    let mut last = 0;
    for tag in TAG.find_iter(&flattened) {
        push_text(&mut out, &flattened[last..tag.start()]);
        last = tag.end();
        if BREAK_TAG.is_match(tag.as_str()) {
            trim_line_end(&mut out);
            out.push('\n');
        } else if BLOCK_TAG.is_match(tag.as_str()) {
            trim_line_end(&mut out);
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
        }
    }
    push_text(&mut out, &flattened[last..]);
    out.truncate(out.trim_end().len());
    out
}

fn push_text(out: &mut String, raw: &str) {
    let text = decode_entities(raw);
    if out.is_empty() || out.ends_with('\n') {
        out.push_str(text.trim_start_matches([' ', '\t']));
    } else {
        out.push_str(&text);
    }
}

fn trim_line_end(out: &mut String) {
    out.truncate(out.trim_end_matches([' ', '\t']).len());
}

/// First rendered line, trimmed, or `"Untitled"` when that line is blank.
pub fn derive_title(plain: &str) -> String {
    let first = plain.split('\n').next().unwrap_or_default().trim();
    if first.is_empty() {
        UNTITLED.to_string()
    } else {
        first.to_string()
    }
}

pub fn title_from_html(html: &str) -> String {
    derive_title(&plain_text(html))
}

pub fn stats(plain: &str) -> TextStats {
    let chars = plain.graphemes(true).count();
    let lines = if plain.trim().is_empty() {
        0
    } else {
        plain.split('\n').count()
    };
    TextStats { chars, lines }
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            decode_entity(entity).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(entity: &str) -> Option<String> {
    let decoded = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)?
        }
    };
    Some(decoded.to_string())
}
