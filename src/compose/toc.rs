//! Table-of-contents layout.
//!
//! Recognised line shapes:
//!
//! ```text
//! # TABLE OF CONTENTS                         centred heading, 20pt
//! >> **Introduction** ........................ 1     main entry, 14pt
//!     * [Background] ........................ 1      sub entry, 12pt, indent 40
//! anything else                                      wrapped body text, 11pt
//! ```
//!
//! Entry titles wrap inside `number_column_x - start_x - 20`. Only the last
//! wrapped line carries the dot leader and the page number; the number always
//! sits at the number column in 12pt regardless of entry level.

use super::canvas::{Color, Page};
use super::fonts::{FontRegistry, FontRole};
use super::inline::{format, Span};
use super::paginate::{draw_line, Paginator};
use super::wrap::{wrap_spans, Line};
use crate::config::PageLayout;
use once_cell::sync::Lazy;
use regex::Regex;

const DOTS_START_MARGIN: f32 = 20.0;
const DOT_GAP: f32 = 8.0;
const DOT_SPACING: f32 = 3.0;
const DOT_GREY: Color = Color::grey(0.6);
const PAGE_LABEL_SIZE: f32 = 12.0;

const HEADING_SIZE: f32 = 20.0;
const HEADING_LINE: f32 = 28.0;
const MAIN_SIZE: f32 = 14.0;
const MAIN_LINE: f32 = 22.0;
const SUB_SIZE: f32 = 12.0;
const SUB_LINE: f32 = 18.0;
const SUB_INDENT: f32 = 40.0;
const TEXT_SIZE: f32 = 11.0;
const TEXT_LINE: f32 = 20.0;
/// Extra space after headings and main entries.
const GROUP_GAP: f32 = 8.0;

static MAIN_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*\.+\s*(\d+)$").expect("valid regex"));
static SUB_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(.+?)\](.*)$").expect("valid regex"));
static TRAILING_PAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\.+\s*(\d+)$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocLevel {
    Main,
    Sub,
}

impl TocLevel {
    fn font_size(self) -> f32 {
        match self {
            TocLevel::Main => MAIN_SIZE,
            TocLevel::Sub => SUB_SIZE,
        }
    }

    fn base_role(self) -> FontRole {
        match self {
            TocLevel::Main => FontRole::Bold,
            TocLevel::Sub => FontRole::Regular,
        }
    }

    fn indent(self) -> f32 {
        match self {
            TocLevel::Main => 0.0,
            TocLevel::Sub => SUB_INDENT,
        }
    }

    fn line_height(self) -> f32 {
        match self {
            TocLevel::Main => MAIN_LINE,
            TocLevel::Sub => SUB_LINE,
        }
    }
}

/// A numbered ToC entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub level: TocLevel,
    pub title_spans: Vec<Span>,
    pub page_label: String,
}

/// One classified line of a ToC segment.
#[derive(Debug, Clone, PartialEq)]
pub enum TocLine {
    Heading(Vec<Span>),
    Entry(TocEntry),
    /// Entry shape without a trailing page number.
    Unnumbered { level: TocLevel, spans: Vec<Span> },
    Text(Vec<Span>),
}

/// Classify one raw ToC line.
pub fn parse_toc_line(line: &str) -> TocLine {
    if let Some(rest) = heading_text(line) {
        return TocLine::Heading(format(rest));
    }

    if let Some(rest) = line.strip_prefix(">> ") {
        let content = rest.trim();
        return match MAIN_ENTRY.captures(content) {
            Some(caps) => TocLine::Entry(TocEntry {
                level: TocLevel::Main,
                title_spans: format(caps[1].trim()),
                page_label: caps[2].to_string(),
            }),
            None => TocLine::Unnumbered {
                level: TocLevel::Main,
                spans: format(content),
            },
        };
    }

    let sub = line
        .strip_prefix("    * [")
        .or_else(|| line.strip_prefix("* ["))
        .map(|_| line.trim_start().trim_start_matches('*').trim());
    if let Some(content) = sub {
        if let Some(caps) = SUB_BRACKET.captures(content) {
            let title = format(caps[1].trim());
            return match TRAILING_PAGE.captures(&caps[2]) {
                Some(page) => TocLine::Entry(TocEntry {
                    level: TocLevel::Sub,
                    title_spans: title,
                    page_label: page[1].to_string(),
                }),
                None => TocLine::Unnumbered {
                    level: TocLevel::Sub,
                    spans: title,
                },
            };
        }
    }

    TocLine::Text(format(line))
}

/// `#`-prefixed heading text, if the line is one.
fn heading_text(line: &str) -> Option<&str> {
    let hashes = line.len() - line.trim_start_matches('#').len();
    if hashes == 0 {
        return None;
    }
    line[hashes..].strip_prefix(' ').map(str::trim)
}

/// Draw one numbered entry at (`x`, `y`) and return the baseline of its last
/// wrapped line.
pub fn layout_toc_entry(
    page: &mut Page,
    fonts: &FontRegistry,
    layout: &PageLayout,
    entry: &TocEntry,
    x: f32,
    y: f32,
) -> f32 {
    let size = entry.level.font_size();
    let base = entry.level.base_role();
    let column = layout.number_column_x();
    let available = column - x - DOTS_START_MARGIN;

    let mut lines = wrap_spans(&entry.title_spans, available, fonts, base, size);
    if lines.is_empty() {
        lines.push(Line::default());
    }

    let mut y = y;
    let last = lines.len() - 1;
    for (i, line) in lines.iter().enumerate() {
        draw_line(page, fonts, line, x, y, base, size, Color::BLACK);
        if i < last {
            y -= size + 2.0;
            continue;
        }

        page.text(
            entry.page_label.clone(),
            column,
            y,
            PAGE_LABEL_SIZE,
            FontRole::Regular,
            Color::BLACK,
        );
        let line_width = line.width(fonts, base, size);
        for dot_x in dot_leader(x + line_width + DOT_GAP, column - DOT_GAP) {
            page.text(".", dot_x, y + 1.0, size - 1.0, FontRole::Regular, DOT_GREY);
        }
    }
    y
}

/// Positions of the leader dots between `start` and `end`; empty when the
/// span is not positive.
pub fn dot_leader(start: f32, end: f32) -> Vec<f32> {
    let span = end - start;
    if span <= 0.0 {
        return Vec::new();
    }
    let count = (span / DOT_SPACING).floor() as usize;
    (0..count).map(|i| start + i as f32 * DOT_SPACING).collect()
}

/// Lay out a ToC segment starting at the paginator's cursor. Overflow
/// continues on new special pages. Returns the final cursor.
pub fn format_toc(p: &mut Paginator<'_>, segment: &str) -> f32 {
    let fonts = p.fonts();
    let layout = *p.layout();
    let margin = layout.margin;
    let content_width = layout.content_width();

    for raw in segment.lines().filter(|l| !l.trim().is_empty()) {
        match parse_toc_line(raw.trim_end()) {
            TocLine::Heading(spans) => {
                p.ensure_room(HEADING_LINE, true);
                let line = Line { spans };
                let width = line.width(fonts, FontRole::Regular, HEADING_SIZE);
                let x = margin + (content_width - width) / 2.0;
                let y = p.y();
                draw_line(
                    p.page_mut(),
                    fonts,
                    &line,
                    x,
                    y,
                    FontRole::Regular,
                    HEADING_SIZE,
                    Color::grey(0.1),
                );
                p.set_y(y - HEADING_LINE - GROUP_GAP);
            }
            TocLine::Entry(entry) => {
                let level = entry.level;
                p.ensure_room(level.line_height(), true);
                let y = p.y();
                let end = layout_toc_entry(
                    p.page_mut(),
                    fonts,
                    &layout,
                    &entry,
                    margin + level.indent(),
                    y,
                );
                p.set_y(end - level.line_height() - group_gap(level));
            }
            TocLine::Unnumbered { level, spans } => {
                p.ensure_room(level.line_height(), true);
                let y = p.y();
                draw_line(
                    p.page_mut(),
                    fonts,
                    &Line { spans },
                    margin + level.indent(),
                    y,
                    level.base_role(),
                    level.font_size(),
                    Color::BLACK,
                );
                p.set_y(y - level.line_height() - group_gap(level));
            }
            TocLine::Text(spans) => {
                for line in wrap_spans(&spans, content_width, fonts, FontRole::Regular, TEXT_SIZE) {
                    p.ensure_room(TEXT_LINE, true);
                    let y = p.y();
                    draw_line(
                        p.page_mut(),
                        fonts,
                        &line,
                        margin,
                        y,
                        FontRole::Regular,
                        TEXT_SIZE,
                        Color::BLACK,
                    );
                    p.set_y(y - TEXT_LINE);
                }
            }
        }
    }
    p.y()
}

fn group_gap(level: TocLevel) -> f32 {
    match level {
        TocLevel::Main => GROUP_GAP,
        TocLevel::Sub => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::canvas::DrawOp;

    #[test]
    fn parses_main_entry() {
        let line = parse_toc_line(">> **Introduction** ........................ 1");
        assert_eq!(
            line,
            TocLine::Entry(TocEntry {
                level: TocLevel::Main,
                title_spans: vec![Span::bold("Introduction")],
                page_label: "1".into(),
            })
        );
    }

    #[test]
    fn parses_sub_entry_both_indents() {
        for raw in [
            "    * [Research Design] ........................ 12",
            "* [Research Design] ..... 12",
        ] {
            match parse_toc_line(raw) {
                TocLine::Entry(e) => {
                    assert_eq!(e.level, TocLevel::Sub);
                    assert_eq!(e.title_spans, vec![Span::plain("Research Design")]);
                    assert_eq!(e.page_label, "12");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn heading_and_fallbacks() {
        assert!(matches!(
            parse_toc_line("# TABLE OF CONTENTS"),
            TocLine::Heading(_)
        ));
        assert!(matches!(
            parse_toc_line(">> **Appendix**"),
            TocLine::Unnumbered {
                level: TocLevel::Main,
                ..
            }
        ));
        assert!(matches!(
            parse_toc_line("Some stray sentence."),
            TocLine::Text(_)
        ));
    }

    #[test]
    fn dot_leader_never_negative() {
        assert!(dot_leader(500.0, 504.0).len() == 1);
        assert!(dot_leader(504.0, 504.0).is_empty());
        assert!(dot_leader(510.0, 504.0).is_empty());
        let dots = dot_leader(100.0, 130.0);
        assert_eq!(dots.len(), 10);
        assert_eq!(dots[1] - dots[0], 3.0);
    }

    fn label_and_dots(page: &Page) -> (Option<(f32, f32)>, usize) {
        let mut label = None;
        let mut dots = 0;
        for op in &page.ops {
            if let DrawOp::Text { text, x, y, size, .. } = op {
                if text == "." {
                    dots += 1;
                } else if *size == PAGE_LABEL_SIZE && text.chars().all(|c| c.is_ascii_digit()) {
                    label = Some((*x, *y));
                }
            }
        }
        (label, dots)
    }

    #[test]
    fn short_entry_gets_number_at_column_and_dots() {
        let fonts = FontRegistry::standard();
        let layout = PageLayout::US_LETTER;
        let mut page = Page::new(1, true, 612.0, 792.0);
        let entry = TocEntry {
            level: TocLevel::Main,
            title_spans: vec![Span::bold("Intro")],
            page_label: "3".into(),
        };
        let end = layout_toc_entry(&mut page, &fonts, &layout, &entry, 72.0, 700.0);
        assert_eq!(end, 700.0);
        let (label, dots) = label_and_dots(&page);
        assert_eq!(label, Some((512.0, 700.0)));
        assert!(dots > 50);
    }

    #[test]
    fn wrapped_title_numbers_only_last_line() {
        let fonts = FontRegistry::standard();
        let layout = PageLayout::US_LETTER;
        let mut page = Page::new(1, true, 612.0, 792.0);
        let long = "An Extended Critical Examination of Postcolonial Narrative Strategies in Contemporary Fiction";
        let entry = TocEntry {
            level: TocLevel::Sub,
            title_spans: vec![Span::plain(long)],
            page_label: "7".into(),
        };
        let end = layout_toc_entry(&mut page, &fonts, &layout, &entry, 112.0, 600.0);
        assert!(end < 600.0);
        assert_eq!((600.0 - end) % 14.0, 0.0);
        let (label, _) = label_and_dots(&page);
        assert_eq!(label, Some((512.0, end)));
        let labels = page
            .texts()
            .filter(|t| *t == "7")
            .count();
        assert_eq!(labels, 1);
    }

    #[test]
    fn title_reaching_column_gets_no_dots() {
        let fonts = FontRegistry::standard();
        let layout = PageLayout::US_LETTER;
        let mut page = Page::new(1, true, 612.0, 792.0);
        // One unbreakable word wider than the available width.
        let entry = TocEntry {
            level: TocLevel::Main,
            title_spans: vec![Span::bold("W".repeat(40))],
            page_label: "9".into(),
        };
        layout_toc_entry(&mut page, &fonts, &layout, &entry, 72.0, 700.0);
        let (label, dots) = label_and_dots(&page);
        assert_eq!(dots, 0);
        assert_eq!(label, Some((512.0, 700.0)));
    }

    #[test]
    fn long_toc_overflows_onto_special_pages() {
        use crate::compose::paginate::{paginate, SegmentMode};
        let fonts = FontRegistry::standard();
        let mut text = String::from("# TABLE OF CONTENTS\n");
        for i in 1..=40 {
            text.push_str(&format!(">> **Section {i}** ............................ {i}\n"));
        }
        let doc = paginate(&text, &fonts, &PageLayout::US_LETTER, None, SegmentMode::Detect);
        assert!(doc.page_count() >= 2);
        assert!(doc.pages.iter().all(|p| p.is_special));
    }
}
