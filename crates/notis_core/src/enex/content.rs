//! ENML body normalization and title derivation.
//!
//! # Responsibility
//! - Strip layout markup (`en-note`, `div`, `br`) from note bodies while
//!   keeping semantic tags such as `<en-media>` and `<en-todo>`.
//! - Derive a readable title for notes exported as "Untitled Note".
//! - Decide whether a raw note carries anything worth importing.
//!
//! # Invariants
//! - Declarations, processing instructions and comments never survive.
//! - Character references are decoded exactly once.

use super::reader::RawNote;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

/// Title Evernote assigns to notes saved without one.
pub const UNTITLED_NOTE: &str = "Untitled Note";
/// Fallback title for untitled notes whose body is just an attachment.
pub const SAVED_IMAGE_TITLE: &str = "Saved Image";

const DERIVED_TITLE_MAX_CHARS: usize = 50;
const SKIPPED_TAGS: [&str; 3] = ["en-note", "div", "br"];

static MARKUP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<!--.*?-->|<![^>]*>|<\?.*?\?>|<(/?)([A-Za-z][A-Za-z0-9:_-]*)((?:\s+[^\s=/>]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?)*)\s*/?>"#)
        .expect("valid markup regex")
});
static ATTRIBUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s=/>]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("valid attribute regex")
});

/// One lexical piece of an ENML body.
enum Token<'a> {
    Text(&'a str),
    /// Declaration, processing instruction or comment.
    Declaration,
    Tag {
        closing: bool,
        name: String,
        attributes: Vec<(String, String)>,
    },
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for caps in MARKUP_RE.captures_iter(html) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > cursor {
            tokens.push(Token::Text(&html[cursor..whole.start()]));
        }
        cursor = whole.end();

        let Some(name) = caps.get(2) else {
            tokens.push(Token::Declaration);
            continue;
        };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let attributes = caps
            .get(3)
            .map(|m| parse_attributes(m.as_str()))
            .unwrap_or_default();
        tokens.push(Token::Tag {
            closing,
            name: name.as_str().to_ascii_lowercase(),
            attributes,
        });
    }

    if cursor < html.len() {
        tokens.push(Token::Text(&html[cursor..]));
    }
    tokens
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    ATTRIBUTE_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| html_escape::decode_html_entities(m.as_str()).into_owned())
                .unwrap_or_default();
            Some((key, value))
        })
        .collect()
}

/// Removes layout markup from an ENML body.
///
/// Tags with attributes are re-emitted self-closing as `<tag a="v" />`,
/// one space before each attribute and before `/>`. Tags without
/// attributes keep their open/close form.
pub fn normalize_content(html: &str) -> String {
    let mut output = String::with_capacity(html.len());

    for token in tokenize(html.trim()) {
        match token {
            Token::Text(text) => output.push_str(&html_escape::decode_html_entities(text)),
            Token::Declaration => {}
            Token::Tag { name, .. } if SKIPPED_TAGS.contains(&name.as_str()) => {}
            Token::Tag {
                closing: true,
                name,
                ..
            } => {
                output.push_str("</");
                output.push_str(&name);
                output.push('>');
            }
            Token::Tag {
                closing: false,
                name,
                attributes,
            } if attributes.is_empty() => {
                output.push('<');
                output.push_str(&name);
                output.push('>');
            }
            Token::Tag {
                name, attributes, ..
            } => {
                output.push('<');
                output.push_str(&name);
                for (key, value) in attributes {
                    output.push_str(&format!(" {key}=\"{value}\""));
                }
                output.push_str(" />");
            }
        }
    }

    output.trim().to_string()
}

/// Returns the title to persist for a note.
///
/// Only `Untitled Note` is rewritten: markup boundaries in `raw_content`
/// become sentence breaks and the first sentence (max 50 chars) is used.
/// If no text is left and the normalized body starts with an attachment,
/// the title becomes `Saved Image`.
pub fn derive_title(title: &str, raw_content: &str, normalized_content: &str) -> String {
    if title != UNTITLED_NOTE {
        return title.to_string();
    }

    let mut flattened = String::with_capacity(raw_content.len());
    for token in tokenize(raw_content) {
        match token {
            Token::Text(text) => flattened.push_str(&html_escape::decode_html_entities(text)),
            Token::Declaration | Token::Tag { .. } => flattened.push('.'),
        }
    }

    let sentence = flattened
        .trim()
        .trim_matches('.')
        .split('.')
        .next()
        .unwrap_or("")
        .trim();
    let derived: String = sentence.chars().take(DERIVED_TITLE_MAX_CHARS).collect();

    if !derived.is_empty() {
        derived
    } else if normalized_content.starts_with("<en-media") {
        SAVED_IMAGE_TITLE.to_string()
    } else {
        title.to_string()
    }
}

/// Normalizes a raw note in place and reports whether it should be imported.
///
/// Notes with neither a meaningful title nor any body are dropped.
pub fn prepare_note(mut note: RawNote) -> Option<RawNote> {
    let normalized = normalize_content(&note.content);
    note.title = derive_title(note.title.trim(), &note.content, &normalized);
    note.content = normalized;

    let untitled = note.title.is_empty() || note.title == UNTITLED_NOTE;
    if untitled && note.content.is_empty() {
        debug!("event=note_skip module=enex status=skipped reason=empty_title_and_content");
        return None;
    }
    Some(note)
}

#[cfg(test)]
mod tests {
    use super::{derive_title, normalize_content, prepare_note, SAVED_IMAGE_TITLE, UNTITLED_NOTE};
    use crate::enex::RawNote;

    const ENML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<!DOCTYPE en-note SYSTEM "http://xml.evernote.com/pub/enml2.dtd">
<en-note><div>Fix the <b>sink</b> &amp; tap</div><br/><div><en-media hash="abc123" type="image/png"/></div></en-note>"#;

    #[test]
    fn normalize_strips_layout_and_keeps_semantic_tags() {
        let normalized = normalize_content(ENML);
        assert_eq!(
            normalized,
            r#"Fix the <b>sink</b> & tap<en-media hash="abc123" type="image/png" />"#
        );
    }

    #[test]
    fn attribute_spacing_is_rewritten_to_single_spaces() {
        assert_eq!(
            normalize_content("<en-note><SPAN   style='color:red'\n  id=x>hi</span></en-note>"),
            r#"<span style="color:red" id="x" />hi</span>"#
        );
    }

    #[test]
    fn normalize_drops_comments_and_lowercases_names() {
        assert_eq!(
            normalize_content("<EN-NOTE><!-- hidden --><SPAN>x</SPAN></EN-NOTE>"),
            "<span>x</span>"
        );
    }

    #[test]
    fn titled_notes_keep_their_title() {
        assert_eq!(derive_title("Groceries", "<div>milk</div>", "milk"), "Groceries");
    }

    #[test]
    fn untitled_note_uses_first_sentence() {
        let raw = "<en-note><div>Buy milk. Then eggs</div><div>second block</div></en-note>";
        assert_eq!(
            derive_title(UNTITLED_NOTE, raw, &normalize_content(raw)),
            "Buy milk"
        );
    }

    #[test]
    fn untitled_note_title_is_capped_at_fifty_chars() {
        let long = "a".repeat(80);
        let raw = format!("<en-note><div>{long}</div></en-note>");
        let title = derive_title(UNTITLED_NOTE, &raw, &normalize_content(&raw));
        assert_eq!(title.chars().count(), 50);
    }

    #[test]
    fn untitled_image_only_note_becomes_saved_image() {
        let raw = r#"<en-note><en-media hash="f00" type="image/jpeg"/></en-note>"#;
        assert_eq!(
            derive_title(UNTITLED_NOTE, raw, &normalize_content(raw)),
            SAVED_IMAGE_TITLE
        );
    }

    #[test]
    fn prepare_note_skips_empty_untitled_notes() {
        let empty = RawNote {
            title: UNTITLED_NOTE.to_string(),
            content: "<en-note><div><br/></div></en-note>".to_string(),
            ..RawNote::default()
        };
        assert!(prepare_note(empty).is_none());

        let titled = RawNote {
            title: "Keep me".to_string(),
            ..RawNote::default()
        };
        let kept = prepare_note(titled).expect("titled note is kept");
        assert_eq!(kept.title, "Keep me");
        assert_eq!(kept.content, "");
    }
}
