//! Page-break pagination.
//!
//! ## Model
//!
//! The source text is cut into segments at [`PAGE_BREAK_TOKEN`]. Every segment
//! opens a fresh page; inside a segment, blocks flow top to bottom and a new
//! page is started whenever the next wrapped line would land in the footer
//! band:
//!
//! ```text
//! y < margin + footer_height + line_height + 20   →  overflow page
//! ```
//!
//! ## Special pages
//!
//! A segment whose first line is a table-of-contents, outline, references or
//! works-cited heading opens a *special* page: the header banner is left out
//! and the first baseline moves up to `height - margin - 20`. Only that page
//! is special; overflow pages it spills onto carry the normal chrome. A
//! segment opening with a ToC heading is handed to
//! [`crate::compose::toc::format_toc`] instead of the block renderer.
//!
//! ## Chrome
//!
//! Header rule, footer rule and the page number are drawn on every page. The
//! banner text (the configured document title) only on non-special pages.

use super::blocks::{is_special_segment, is_toc_segment, parse_blocks};
use super::canvas::{Color, Document, Page};
use super::fonts::{FontRegistry, FontRole};
use super::toc::format_toc;
use super::wrap::{wrap_spans, Line};
use crate::config::PageLayout;
use crate::prompts::PAGE_BREAK_TOKEN;
use tracing::debug;

const RULE_GREY: Color = Color::grey(0.7);
const BANNER_GREY: Color = Color::grey(0.2);
const NUMBER_GREY: Color = Color::grey(0.5);

/// How the segments of a fragment are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentMode {
    /// Detect special and ToC segments from their first line.
    Detect,
    /// Every segment is a special ToC page (outline fragment).
    Toc,
    /// Every segment is a special page rendered as blocks (references fragment).
    Special,
}

/// Split generated text on the page-break token, dropping empty segments.
pub fn split_segments(text: &str) -> Vec<&str> {
    text.split(PAGE_BREAK_TOKEN)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lay out `text` into pages.
///
/// Never fails: text with no content still yields one page carrying only
/// chrome, so every fragment is a valid document.
pub fn paginate(
    text: &str,
    fonts: &FontRegistry,
    layout: &PageLayout,
    header_title: Option<&str>,
    mode: SegmentMode,
) -> Document {
    let mut p = Paginator::new(fonts, *layout, header_title);
    let segments = split_segments(text);

    for segment in &segments {
        let (special, toc) = match mode {
            SegmentMode::Detect => (is_special_segment(segment), is_toc_segment(segment)),
            SegmentMode::Toc => (true, true),
            SegmentMode::Special => (true, false),
        };
        p.start_page(special);
        if toc {
            format_toc(&mut p, segment);
        } else {
            p.lay_out_blocks(segment);
        }
    }

    if p.pages.is_empty() {
        p.start_page(false);
    }

    debug!(
        segments = segments.len(),
        pages = p.pages.len(),
        "paginated fragment"
    );
    p.finish()
}

/// Layout cursor shared by the block renderer and the ToC formatter.
pub struct Paginator<'a> {
    fonts: &'a FontRegistry,
    layout: PageLayout,
    header_title: Option<String>,
    pages: Vec<Page>,
    y: f32,
    title_used: bool,
}

impl<'a> Paginator<'a> {
    pub fn new(fonts: &'a FontRegistry, layout: PageLayout, header_title: Option<&str>) -> Self {
        Self {
            fonts,
            layout,
            header_title: header_title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            pages: Vec::new(),
            y: layout.normal_top(),
            title_used: false,
        }
    }

    pub fn fonts(&self) -> &'a FontRegistry {
        self.fonts
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn set_y(&mut self, y: f32) {
        self.y = y;
    }

    /// Open a new page with chrome and reset the cursor.
    pub fn start_page(&mut self, special: bool) {
        let l = self.layout;
        let mut page = Page::new(self.pages.len() as u32 + 1, special, l.width, l.height);

        if let (false, Some(title)) = (special, self.header_title.as_deref()) {
            page.text(
                title,
                l.margin,
                l.height - l.margin - 15.0,
                12.0,
                FontRole::Bold,
                BANNER_GREY,
            );
        }
        let header_y = l.height - l.margin - 25.0;
        page.rule((l.margin, header_y), (l.width - l.margin, header_y), 1.0, RULE_GREY);
        let footer_y = l.margin + l.footer_height;
        page.rule((l.margin, footer_y), (l.width - l.margin, footer_y), 1.0, RULE_GREY);

        let number = page.number.to_string();
        let number_width = self.fonts.width_of(FontRole::Regular, &number, 10.0);
        page.text(
            number,
            l.width - l.margin - number_width,
            l.margin + 10.0,
            10.0,
            FontRole::Regular,
            NUMBER_GREY,
        );

        self.y = if special { l.special_top() } else { l.normal_top() };
        self.pages.push(page);
    }

    /// Start an overflow page if a line of `line_height` no longer fits.
    pub fn ensure_room(&mut self, line_height: f32, special: bool) {
        if self.pages.is_empty() || self.y < self.layout.overflow_threshold(line_height) {
            self.start_page(special);
        }
    }

    /// The page being drawn on.
    pub fn page_mut(&mut self) -> &mut Page {
        if self.pages.is_empty() {
            self.start_page(false);
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn lay_out_blocks(&mut self, segment: &str) {
        let blocks = parse_blocks(segment, &mut self.title_used);
        let fonts = self.fonts;
        let margin = self.layout.margin;
        let content_width = self.layout.content_width();

        for block in blocks {
            let profile = block.profile();
            let lines = wrap_spans(
                &block.spans,
                content_width - profile.indent,
                fonts,
                profile.role,
                profile.font_size,
            );

            for (i, line) in lines.iter().enumerate() {
                self.ensure_room(profile.line_height, false);
                let y = self.y;
                let page = self.page_mut();

                if let (0, Some(bullet)) = (i, profile.bullet) {
                    page.text(
                        bullet.glyph,
                        margin + bullet.offset,
                        y,
                        profile.font_size,
                        FontRole::Regular,
                        profile.color,
                    );
                }
                draw_line(
                    page,
                    fonts,
                    line,
                    margin + profile.indent,
                    y,
                    profile.role,
                    profile.font_size,
                    profile.color,
                );
                self.y -= profile.line_height;
            }
            self.y -= profile.spacing_after;
        }
    }

    pub fn finish(self) -> Document {
        Document { pages: self.pages }
    }
}

/// Draw the spans of `line` left to right from `x`; returns the end x.
#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_line(
    page: &mut Page,
    fonts: &FontRegistry,
    line: &Line,
    x: f32,
    y: f32,
    base: FontRole,
    size: f32,
    color: Color,
) -> f32 {
    let mut x = x;
    for span in &line.spans {
        let role = base.styled(span.bold, span.italic);
        page.text(span.text.clone(), x, y, size, role, color);
        x += fonts.width_of(role, &span.text, size);
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> Document {
        let fonts = FontRegistry::standard();
        paginate(text, &fonts, &PageLayout::US_LETTER, None, SegmentMode::Detect)
    }

    #[test]
    fn page_breaks_force_pages() {
        let doc = run("# T\nOne\n===PAGE BREAK===\nTwo\n===PAGE BREAK===\nThree");
        assert_eq!(doc.page_count(), 3);
        let numbers: Vec<u32> = doc.pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn empty_segments_are_dropped() {
        let doc = run("A\n===PAGE BREAK===\n   \n===PAGE BREAK===\nB===PAGE BREAK===");
        assert_eq!(doc.page_count(), 2);
    }

    #[test]
    fn empty_text_still_yields_a_page() {
        let doc = run("");
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.pages[0].rule_count(), 2);
    }

    #[test]
    fn long_segment_overflows() {
        let para = "word ".repeat(120);
        let text = vec![para.trim(); 12].join("\n");
        let doc = run(&text);
        assert!(doc.page_count() > 1);
        let layout = PageLayout::US_LETTER;
        for page in &doc.pages {
            for (text, _x, y, _size) in page.text_ops() {
                if text == "word" || text.starts_with("word ") {
                    assert!(y >= layout.overflow_threshold(18.0) - 18.0, "line at {y}");
                }
            }
        }
    }

    #[test]
    fn special_page_has_no_banner_and_higher_top() {
        let fonts = FontRegistry::standard();
        let doc = paginate(
            "## References\nSmith, J. (2020).\n===PAGE BREAK===\n## Body\nText",
            &fonts,
            &PageLayout::US_LETTER,
            Some("My Essay"),
            SegmentMode::Detect,
        );
        let special = &doc.pages[0];
        let normal = &doc.pages[1];
        assert!(special.is_special);
        assert!(!normal.is_special);
        assert!(!special.texts().any(|t| t == "My Essay"));
        assert!(normal.texts().any(|t| t == "My Essay"));
        assert_eq!(special.rule_count(), 2);
        assert_eq!(normal.rule_count(), 2);

        let first_y = |p: &Page, needle: &str| {
            p.text_ops().find(|(t, ..)| *t == needle).map(|(_, _, y, _)| y)
        };
        assert_eq!(first_y(special, "References"), Some(700.0));
        assert_eq!(first_y(normal, "Body"), Some(650.0));
    }

    #[test]
    fn page_number_is_right_flush() {
        let fonts = FontRegistry::standard();
        let doc = run("x");
        let (text, x, y, size) = doc.pages[0]
            .text_ops()
            .find(|(t, ..)| *t == "1")
            .unwrap();
        assert_eq!(text, "1");
        assert_eq!(size, 10.0);
        assert_eq!(y, 82.0);
        let w = fonts.width_of(FontRole::Regular, "1", 10.0);
        assert!((x + w - 540.0).abs() < 1e-3);
    }

    #[test]
    fn list_items_get_bullets() {
        let doc = run("- shallow\n  * nested");
        let ops: Vec<_> = doc.pages[0].text_ops().collect();
        assert!(ops.iter().any(|(t, x, ..)| *t == "-" && *x == 77.0));
        assert!(ops.iter().any(|(t, x, ..)| *t == "*" && *x == 97.0));
        assert!(ops.iter().any(|(t, x, ..)| *t == "shallow" && *x == 92.0));
        assert!(ops.iter().any(|(t, x, ..)| *t == "nested" && *x == 112.0));
    }

    #[test]
    fn references_mode_marks_every_segment_special() {
        let fonts = FontRegistry::standard();
        let doc = paginate(
            "Entry one\n===PAGE BREAK===\nEntry two",
            &fonts,
            &PageLayout::US_LETTER,
            Some("Banner"),
            SegmentMode::Special,
        );
        assert!(doc.pages.iter().all(|p| p.is_special));
        assert!(!doc.all_text().contains("Banner"));
    }
}
