//! Greedy line wrapping.
//!
//! Two wrappers exist:
//!
//! * [`wrap_text`] wraps a single-style string. It has a short-line
//!   allowance: when a word would overflow, the line is only closed if it
//!   already holds more than 20 characters or the incoming word is longer
//!   than 15 characters. Short lines may therefore run slightly past the
//!   limit. It is used for free-standing strings such as cover-page titles.
//!
//! * [`wrap_spans`] wraps styled spans and always breaks on overflow, so
//!   every line fits except one holding a single over-long word. The
//!   pagination engine and the ToC formatter use this one.

use super::fonts::{FontRegistry, FontRole};
use super::inline::Span;

const SHORT_LINE_CHARS: usize = 20;
const LONG_WORD_CHARS: usize = 15;

/// One wrapped line of styled spans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    /// Rendered width, resolving each span against `base`.
    pub fn width(&self, fonts: &FontRegistry, base: FontRole, size: f32) -> f32 {
        self.spans
            .iter()
            .map(|s| fonts.width_of(base.styled(s.bold, s.italic), &s.text, size))
            .sum()
    }

    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Number of whitespace-separated words on the line.
    pub fn word_count(&self) -> usize {
        self.text().split_whitespace().count()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Wrap a single-style string to `max_width`.
pub fn wrap_text(
    text: &str,
    max_width: f32,
    fonts: &FontRegistry,
    role: FontRole,
    size: f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split(' ') {
        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{line} {word}")
        };

        let overflows = fonts.width_of(role, &candidate, size) > max_width && !line.is_empty();
        if overflows && (line.len() > SHORT_LINE_CHARS || word.len() > LONG_WORD_CHARS) {
            let closed = line.trim();
            if !closed.is_empty() {
                lines.push(closed.to_string());
            }
            line = word.to_string();
        } else {
            line = candidate;
        }
    }

    let last = line.trim();
    if !last.is_empty() {
        lines.push(last.to_string());
    }
    lines
}

/// A whitespace-delimited word as `(span, text)` pieces. A word crosses
/// spans when a style change falls inside it, as in `**Intro**duction`.
type Word<'a> = Vec<(&'a Span, &'a str)>;

fn split_words(spans: &[Span]) -> Vec<Word<'_>> {
    let mut words: Vec<Word<'_>> = Vec::new();
    let mut open = false;

    for span in spans {
        let text = span.text.as_str();
        if text.starts_with(char::is_whitespace) {
            open = false;
        }
        for (i, piece) in text.split_whitespace().enumerate() {
            match words.last_mut() {
                Some(word) if i == 0 && open => word.push((span, piece)),
                _ => words.push(vec![(span, piece)]),
            }
        }
        open = !text.ends_with(char::is_whitespace) && !text.trim().is_empty();
    }
    words
}

fn push_word(line: &mut Line, word: &[(&Span, &str)], spaced: bool) {
    for (i, (span, piece)) in word.iter().enumerate() {
        let sep = if i == 0 && spaced { " " } else { "" };
        match line.spans.last_mut() {
            Some(last) if last.same_style(span) => {
                last.text.push_str(sep);
                last.text.push_str(piece);
            }
            _ => line.spans.push(Span {
                text: format!("{sep}{piece}"),
                ..(*span).clone()
            }),
        }
    }
}

/// Wrap styled spans to `max_width`.
///
/// Each piece of a word is measured in the face its span resolves to on top
/// of `base`, and a word is never split across lines. Adjacent pieces of one
/// style share a span; a style change opens a new span, carrying the
/// separating space when there is one.
pub fn wrap_spans(
    spans: &[Span],
    max_width: f32,
    fonts: &FontRegistry,
    base: FontRole,
    size: f32,
) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut current = Line::default();
    let mut current_width = 0.0_f32;

    for word in split_words(spans) {
        let word_width: f32 = word
            .iter()
            .map(|(span, piece)| fonts.width_of(base.styled(span.bold, span.italic), piece, size))
            .sum();
        let lead_role = base.styled(word[0].0.bold, word[0].0.italic);
        let lead = if current.is_empty() {
            0.0
        } else {
            fonts.width_of(lead_role, " ", size)
        };
        let test_width = current_width + lead + word_width;

        if test_width > max_width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            push_word(&mut current, &word, false);
            current_width = word_width;
            continue;
        }

        let spaced = !current.is_empty();
        push_word(&mut current, &word, spaced);
        current_width = test_width;
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
