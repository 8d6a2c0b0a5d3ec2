//! validates message markup before it goes out
//!
//! Telegram rejects a whole message when its html is malformed, so rendered
//! text gets a lenient well-formedness walk first. Any structural problem
//! degrades the complete original string to stripped plain text; there is no
//! partial sanitization path.

use thiserror::Error;

/// void elements which never take a closing tag
const AUTO_CLOSE: &[&str] = &[
    "area", "base", "basefont", "br", "col", "frame", "hr", "img", "input", "isindex", "link",
    "meta", "param",
];

/// structural problems found while walking markup
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkupError {
    #[error("input ended inside a tag")]
    UnterminatedTag,
    #[error("'<' is not followed by a tag name")]
    InvalidTagName,
    #[error("element <{0}> is never closed")]
    UnclosedElement(String),
}

/// Returns `text` unchanged when it is well-formed enough for telegram,
/// otherwise the whole string stripped down to plain text.
pub fn sanitize(text: &str) -> String {
    match validate(text) {
        Ok(()) => {
            tracing::debug!("markup is valid, passing it through");
            text.to_string()
        }
        Err(err) => {
            tracing::warn!(error = %err, "markup is not valid, stripping all tags");
            strip(text)
        }
    }
}

/// outcome of scanning one `<` position
enum TagScan {
    /// a complete tag ending at `end` (one past the closing `>`)
    Tag { end: usize, kind: TagKind },
    /// the `<` does not open markup at all
    NotATag,
    /// markup starts but the input ends before it is terminated
    Unterminated,
}

enum TagKind {
    Open { name: String, self_closing: bool },
    Close { name: String },
    /// comments, doctype declarations, processing instructions
    Other,
}

/// Lenient well-formedness walk: void elements auto-close, unmatched end
/// tags are ignored, entities and comments are not inspected. Errors are
/// tags cut off by the end of input, `<` without a tag name, and elements
/// left open when the input ends.
fn validate(text: &str) -> Result<(), MarkupError> {
    let chars: Vec<char> = text.chars().collect();
    let mut stack: Vec<String> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '<' {
            i += 1;
            continue;
        }

        match scan_tag(&chars, i) {
            TagScan::Tag { end, kind } => {
                match kind {
                    TagKind::Open { name, self_closing } => {
                        if !self_closing && !AUTO_CLOSE.contains(&name.as_str()) {
                            stack.push(name);
                        }
                    }
                    TagKind::Close { name } => {
                        // an end tag closes everything down to its opener;
                        // one without an opener is ignored
                        if let Some(position) = stack.iter().rposition(|open| *open == name) {
                            stack.truncate(position);
                        }
                    }
                    TagKind::Other => {}
                }
                i = end;
            }
            TagScan::NotATag => return Err(MarkupError::InvalidTagName),
            TagScan::Unterminated => return Err(MarkupError::UnterminatedTag),
        }
    }

    match stack.pop() {
        Some(name) => Err(MarkupError::UnclosedElement(name)),
        None => Ok(()),
    }
}

/// Strict fallback: every tag is removed, text is kept, stray `<` becomes an
/// entity so the result stays valid for the html parse mode.
fn strip(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '<' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        match scan_tag(&chars, i) {
            TagScan::Tag { end, .. } => i = end,
            // a tag cut off by the end of input leaves nothing to keep
            TagScan::Unterminated => break,
            TagScan::NotATag => {
                out.push_str("&lt;");
                i += 1;
            }
        }
    }

    out
}

/// Scans the tag starting at `start` (which must hold `<`).
fn scan_tag(chars: &[char], start: usize) -> TagScan {
    match chars.get(start + 1) {
        None => TagScan::Unterminated,
        Some('!') => {
            if chars[start + 1..].starts_with(&['!', '-', '-']) {
                match find_terminator(chars, start + 4, &['-', '-', '>']) {
                    Some(end) => TagScan::Tag { end, kind: TagKind::Other },
                    None => TagScan::Unterminated,
                }
            } else {
                match find_terminator(chars, start + 2, &['>']) {
                    Some(end) => TagScan::Tag { end, kind: TagKind::Other },
                    None => TagScan::Unterminated,
                }
            }
        }
        Some('?') => match find_terminator(chars, start + 2, &['>']) {
            Some(end) => TagScan::Tag { end, kind: TagKind::Other },
            None => TagScan::Unterminated,
        },
        Some('/') => {
            let (name, after) = scan_name(chars, start + 2);
            if name.is_empty() {
                return TagScan::NotATag;
            }
            match find_terminator(chars, after, &['>']) {
                Some(end) => TagScan::Tag { end, kind: TagKind::Close { name } },
                None => TagScan::Unterminated,
            }
        }
        Some(c) if c.is_ascii_alphabetic() => {
            let (name, mut i) = scan_name(chars, start + 1);
            let mut quote: Option<char> = None;

            while i < chars.len() {
                let c = chars[i];
                match quote {
                    Some(q) if c == q => quote = None,
                    Some(_) => {}
                    None if c == '"' || c == '\'' => quote = Some(c),
                    None if c == '>' => {
                        let self_closing = chars[i - 1] == '/';
                        return TagScan::Tag {
                            end: i + 1,
                            kind: TagKind::Open { name, self_closing },
                        };
                    }
                    None => {}
                }
                i += 1;
            }

            TagScan::Unterminated
        }
        Some(_) => TagScan::NotATag,
    }
}

/// Reads a lowercased tag name starting at `start`; returns it together with
/// the index of the first character after the name.
fn scan_name(chars: &[char], start: usize) -> (String, usize) {
    let mut name = String::new();
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_alphanumeric() || c == '-' || c == ':' {
            name.extend(c.to_lowercase());
            i += 1;
        } else {
            break;
        }
    }

    (name, i)
}

/// Index one past the first occurrence of `pattern` at or after `start`.
fn find_terminator(chars: &[char], start: usize, pattern: &[char]) -> Option<usize> {
    if start > chars.len() {
        return None;
    }
    chars[start..]
        .windows(pattern.len())
        .position(|window| window == pattern)
        .map(|offset| start + offset + pattern.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_markup_passes_through_unchanged() {
        let text = "<b>ok</b>";
        assert_eq!(sanitize(text), text);
    }

    #[test]
    fn unterminated_element_strips_all_tags() {
        assert_eq!(sanitize("<b>unterminated"), "unterminated");
    }

    #[test]
    fn void_elements_need_no_closing_tag() {
        let text = "line one<br>line two";
        assert_eq!(sanitize(text), text);
    }

    #[test]
    fn attributes_and_entities_are_tolerated() {
        let text = "<a href='http://x/graph'>10.0.0.1[node]</a> &amp; more";
        assert_eq!(sanitize(text), text);
    }

    #[test]
    fn unmatched_end_tags_are_ignored() {
        let text = "<b>bold</i></b>";
        assert_eq!(sanitize(text), text);
    }

    #[test]
    fn stray_angle_bracket_degrades_to_plain_text() {
        // "< 6" is not a tag, so the whole message is stripped and the
        // bracket escaped for the html parse mode
        assert_eq!(sanitize("5 < 6 is <b>true</b>"), "5 &lt; 6 is true");
    }

    #[test]
    fn failure_strips_the_entire_message_not_just_the_broken_part() {
        assert_eq!(sanitize("<b>fine</b> then <i>broken"), "fine then broken");
    }

    #[test]
    fn tag_cut_off_at_end_of_input_is_dropped() {
        assert_eq!(sanitize("value: 3 <cod"), "value: 3 ");
    }

    #[test]
    fn comments_are_not_inspected() {
        let text = "before<!-- <b> anything -->after";
        assert_eq!(sanitize(text), text);
    }

    #[test]
    fn validate_reports_the_open_element() {
        assert_eq!(
            validate("<code>x"),
            Err(MarkupError::UnclosedElement(String::from("code")))
        );
    }
}
