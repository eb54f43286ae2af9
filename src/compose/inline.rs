//! Inline markdown formatting: `**bold**`, `*italic*` and `_italic_`.
//!
//! The parser is a single left-to-right pass. At each step it picks the
//! earliest marker in the remaining text (ties go to `**`, then `*`, then
//! `_`), emits the plain text before it, and looks for the matching closer
//! of the same marker. An opener without a closer is not an error: the opener
//! and everything after it are kept verbatim as plain text.
//!
//! Markers do not nest. `**a *b* c**` is one bold span containing the literal
//! asterisks of the inner run.

use serde::{Deserialize, Serialize};

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
            italic: false,
        }
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: true,
        }
    }

    /// Same style as `other`.
    pub fn same_style(&self, other: &Span) -> bool {
        self.bold == other.bold && self.italic == other.italic
    }
}

#[derive(Debug, Clone, Copy)]
struct Marker {
    token: &'static str,
    bold: bool,
}

const BOLD: Marker = Marker {
    token: "**",
    bold: true,
};
const STAR: Marker = Marker {
    token: "*",
    bold: false,
};
const UNDERSCORE: Marker = Marker {
    token: "_",
    bold: false,
};

/// Earliest marker in `text`; a lone `*` sharing its index with `**` is not
/// a candidate.
fn next_marker(text: &str) -> Option<(usize, Marker)> {
    let bold = text.find(BOLD.token);
    let star = text.find(STAR.token).filter(|i| Some(*i) != bold);
    let under = text.find(UNDERSCORE.token);

    [(bold, BOLD), (star, STAR), (under, UNDERSCORE)]
        .into_iter()
        .filter_map(|(idx, m)| idx.map(|i| (i, m)))
        // min_by_key keeps the first of equal keys, which is the priority order
        .min_by_key(|(i, _)| *i)
}

fn push(spans: &mut Vec<Span>, text: &str, bold: bool, italic: bool) {
    if text.trim().is_empty() {
        return;
    }
    spans.push(Span {
        text: text.to_string(),
        bold,
        italic,
    });
}

/// Split one line into styled spans.
///
/// Spans whose text is blank are dropped, so an empty emphasis like `****`
/// produces nothing.
pub fn format(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut rest = line;

    while !rest.is_empty() {
        let Some((idx, marker)) = next_marker(rest) else {
            push(&mut spans, rest, false, false);
            break;
        };

        push(&mut spans, &rest[..idx], false, false);

        let after = &rest[idx + marker.token.len()..];
        match after.find(marker.token) {
            Some(close) => {
                push(&mut spans, &after[..close], marker.bold, !marker.bold);
                rest = &after[close + marker.token.len()..];
            }
            None => {
                push(&mut spans, &rest[idx..], false, false);
                break;
            }
        }
    }

    spans
}

/// Concatenated text of a span list.
pub fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_line_is_one_span() {
        assert_eq!(format("Just text."), vec![Span::plain("Just text.")]);
    }

    #[test]
    fn bold_inside_sentence() {
        assert_eq!(
            format("a **key** term"),
            vec![Span::plain("a "), Span::bold("key"), Span::plain(" term")]
        );
    }

    #[test]
    fn star_and_underscore_are_italic() {
        assert_eq!(
            format("*Hamlet* and _Macbeth_"),
            vec![
                Span::italic("Hamlet"),
                Span::plain(" and "),
                Span::italic("Macbeth")
            ]
        );
    }

    #[test]
    fn unclosed_marker_keeps_rest_verbatim() {
        assert_eq!(
            format("price is 5 * 3 today"),
            vec![Span::plain("price is 5 "), Span::plain("* 3 today")]
        );
        assert_eq!(format("**never closed"), vec![Span::plain("**never closed")]);
    }

    #[test]
    fn earliest_marker_wins() {
        // `_` comes first, so the `**` pair lives inside the italic run.
        assert_eq!(
            format("_x **y** z_"),
            vec![Span::italic("x **y** z")]
        );
    }

    #[test]
    fn double_star_beats_single_star_at_same_index() {
        assert_eq!(format("**b**"), vec![Span::bold("b")]);
    }

    #[test]
    fn blank_spans_are_dropped() {
        assert_eq!(format("****"), Vec::<Span>::new());
        assert_eq!(format("   "), Vec::<Span>::new());
        assert_eq!(format("** ** tail"), vec![Span::plain(" tail")]);
    }

    #[test]
    fn plain_text_concatenates() {
        let spans = format("**Intro** to _Rust_");
        assert_eq!(plain_text(&spans), "Intro to Rust");
    }
}
