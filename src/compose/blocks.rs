//! Block classification and layout profiles.
//!
//! A source line becomes one [`Block`]. Its leading marker decides the kind;
//! the kind decides font, size, leading, spacing and indentation through
//! [`BlockKind::profile`].

use super::canvas::Color;
use super::fonts::FontRole;
use super::inline::{format, Span};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// `# `: the document title, used once per document.
    Title,
    /// `## `, and any `# ` after the title.
    H2,
    /// `### `
    H3,
    /// `#### `
    H4,
    /// `- ` / `* ` (shallow) or `  * ` (nested).
    ListItem { nested: bool },
    Body,
}

/// Bullet glyph drawn before the first wrapped line of a list item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bullet {
    pub glyph: &'static str,
    /// Offset from the left margin.
    pub offset: f32,
}

/// Typographic settings of a block kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profile {
    pub role: FontRole,
    pub font_size: f32,
    pub line_height: f32,
    pub spacing_after: f32,
    pub indent: f32,
    pub color: Color,
    pub bullet: Option<Bullet>,
}

const BODY: Profile = Profile {
    role: FontRole::Regular,
    font_size: 11.0,
    line_height: 18.0,
    spacing_after: 8.0,
    indent: 0.0,
    color: Color::BLACK,
    bullet: None,
};

impl BlockKind {
    pub fn profile(self) -> Profile {
        match self {
            BlockKind::Title => Profile {
                role: FontRole::Title,
                font_size: 24.0,
                line_height: 30.0,
                spacing_after: 20.0,
                color: Color::grey(0.1),
                ..BODY
            },
            BlockKind::H2 => Profile {
                role: FontRole::Bold,
                font_size: 18.0,
                line_height: 24.0,
                spacing_after: 15.0,
                color: Color::grey(0.2),
                ..BODY
            },
            BlockKind::H3 => Profile {
                role: FontRole::Bold,
                font_size: 14.0,
                line_height: 20.0,
                spacing_after: 12.0,
                color: Color::grey(0.3),
                ..BODY
            },
            BlockKind::H4 => Profile {
                role: FontRole::Bold,
                font_size: 12.0,
                line_height: 18.0,
                spacing_after: 10.0,
                color: Color::grey(0.3),
                ..BODY
            },
            BlockKind::ListItem { nested: true } => Profile {
                spacing_after: 4.0,
                indent: 40.0,
                bullet: Some(Bullet {
                    glyph: "*",
                    offset: 25.0,
                }),
                ..BODY
            },
            BlockKind::ListItem { nested: false } => Profile {
                spacing_after: 6.0,
                indent: 20.0,
                bullet: Some(Bullet {
                    glyph: "-",
                    offset: 5.0,
                }),
                ..BODY
            },
            BlockKind::Body => BODY,
        }
    }
}

/// One classified source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub spans: Vec<Span>,
}

impl Block {
    pub fn profile(&self) -> Profile {
        self.kind.profile()
    }
}

/// Split off the block marker. Heading prefixes are disjoint thanks to the
/// trailing space; list markers are not indented-tolerant, `  * ` is the only
/// nested form.
pub fn classify(line: &str) -> (BlockKind, &str) {
    const MARKERS: [(&str, BlockKind); 7] = [
        ("# ", BlockKind::Title),
        ("## ", BlockKind::H2),
        ("### ", BlockKind::H3),
        ("#### ", BlockKind::H4),
        ("  * ", BlockKind::ListItem { nested: true }),
        ("- ", BlockKind::ListItem { nested: false }),
        ("* ", BlockKind::ListItem { nested: false }),
    ];
    for (prefix, kind) in MARKERS {
        if let Some(rest) = line.strip_prefix(prefix) {
            return (kind, rest);
        }
    }
    (BlockKind::Body, line)
}

/// Classify every non-blank line of a segment.
///
/// `title_used` carries across segments: once a title has been emitted, later
/// `# ` lines are demoted to H2.
pub fn parse_blocks(segment: &str, title_used: &mut bool) -> Vec<Block> {
    segment
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let (mut kind, content) = classify(line.trim_end());
            if kind == BlockKind::Title {
                if *title_used {
                    kind = BlockKind::H2;
                }
                *title_used = true;
            }
            Block {
                kind,
                spans: format(content),
            }
        })
        .collect()
}

static SPECIAL_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^#{1,2}\s+(table of contents|outline|references|works cited)\b")
        .expect("valid regex")
});

static TOC_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^#{1,2}\s+table of contents\b").expect("valid regex"));

fn first_line(segment: &str) -> &str {
    segment
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
}

/// Segment opens with a ToC, outline, references or works-cited heading.
pub fn is_special_segment(segment: &str) -> bool {
    SPECIAL_HEADING.is_match(first_line(segment))
}

/// Segment opens with a table-of-contents heading.
pub fn is_toc_segment(segment: &str) -> bool {
    TOC_HEADING.is_match(first_line(segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_markers() {
        assert_eq!(classify("# Title").0, BlockKind::Title);
        assert_eq!(classify("## Intro").0, BlockKind::H2);
        assert_eq!(classify("### Detail").0, BlockKind::H3);
        assert_eq!(classify("#### Fine").0, BlockKind::H4);
        assert_eq!(classify("  * deep").0, BlockKind::ListItem { nested: true });
        assert_eq!(classify("- item").0, BlockKind::ListItem { nested: false });
        assert_eq!(classify("* item").0, BlockKind::ListItem { nested: false });
        assert_eq!(classify("1. numbered").0, BlockKind::Body);
        assert_eq!(classify("#hashtag").0, BlockKind::Body);
        assert_eq!(classify("- item").1, "item");
    }

    #[test]
    fn second_title_is_demoted() {
        let mut used = false;
        let blocks = parse_blocks("# First\ntext\n# Second", &mut used);
        assert_eq!(blocks[0].kind, BlockKind::Title);
        assert_eq!(blocks[1].kind, BlockKind::Body);
        assert_eq!(blocks[2].kind, BlockKind::H2);

        let later = parse_blocks("# Third", &mut used);
        assert_eq!(later[0].kind, BlockKind::H2);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut used = false;
        assert_eq!(parse_blocks("\n\n  \npara\n\n", &mut used).len(), 1);
    }

    #[test]
    fn profiles_shrink_with_heading_depth() {
        let sizes: Vec<f32> = [BlockKind::Title, BlockKind::H2, BlockKind::H3, BlockKind::H4]
            .iter()
            .map(|k| k.profile().font_size)
            .collect();
        assert!(sizes.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(BlockKind::Title.profile().role, FontRole::Title);
    }

    #[test]
    fn bullets_depend_on_depth() {
        let shallow = BlockKind::ListItem { nested: false }.profile();
        let deep = BlockKind::ListItem { nested: true }.profile();
        assert_eq!(shallow.bullet.unwrap().glyph, "-");
        assert_eq!(deep.bullet.unwrap().glyph, "*");
        assert!(deep.indent > shallow.indent);
    }

    #[test]
    fn special_and_toc_detection() {
        assert!(is_special_segment("## References\n- A. Author (2020)"));
        assert!(is_special_segment("\n# Works Cited\n"));
        assert!(is_special_segment("## Outline"));
        assert!(is_toc_segment("# TABLE OF CONTENTS\n>> **Intro** ... 1"));
        assert!(is_toc_segment("## Table of Contents"));
        assert!(!is_toc_segment("## References"));
        assert!(!is_special_segment("## Introduction\nThe references below..."));
        assert!(!is_special_segment("Body text mentioning ## references"));
    }
}
