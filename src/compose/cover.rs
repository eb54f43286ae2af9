//! Generated cover page.
//!
//! Layout, top to bottom: framed border, optional logo (120pt wide, centred),
//! institution name in capitals, college name, a short rule, the title box and
//! the submission box with "SUBMITTED BY" on the left and "SUBMITTED TO" on
//! the right. Group submissions list their members instead of a single
//! student.

use super::canvas::{Color, Document, Page, RasterImage};
use super::fonts::{FontRegistry, FontRole};
use super::wrap::wrap_text;
use crate::config::PageLayout;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Details printed on an automatically generated cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverDetails {
    pub university_name: String,
    #[serde(default)]
    pub college_name: String,
    pub assignment_title: String,
    #[serde(default)]
    pub instructor_name: String,
    pub submission_date: NaiveDate,
    #[serde(default)]
    pub section: String,
    pub submitter: Submitter,
    /// Logo fetched when the cover is rendered; unreachable logos are skipped.
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Submitter {
    Individual {
        student_name: String,
        #[serde(default)]
        student_id: String,
    },
    Group {
        members: Vec<String>,
    },
}

impl CoverDetails {
    /// Date as printed on the cover, e.g. `Mar 04 2025`.
    pub fn formatted_date(&self) -> String {
        self.submission_date.format("%b %d %Y").to_string()
    }
}

const LOGO_WIDTH: f32 = 120.0;
const TITLE_BOX: (f32, f32) = (400.0, 80.0);
const INFO_BOX_WIDTH: f32 = 450.0;
const INFO_BOX_MIN_HEIGHT: f32 = 160.0;
const LABEL_SIZE: f32 = 11.0;
const VALUE_SIZE: f32 = 12.0;
const LABEL_GREY: Color = Color::grey(0.4);

/// Decode logo bytes (PNG or JPEG) for drawing.
pub fn decode_logo(bytes: &[u8]) -> Option<RasterImage> {
    match image::load_from_memory(bytes) {
        Ok(img) => {
            let rgb = img.to_rgb8();
            Some(RasterImage {
                width: rgb.width(),
                height: rgb.height(),
                rgb: rgb.into_raw(),
            })
        }
        Err(e) => {
            warn!("Could not decode cover logo, skipping: {e}");
            None
        }
    }
}

/// Lay out the cover page.
pub fn render_cover(
    details: &CoverDetails,
    logo: Option<RasterImage>,
    fonts: &FontRegistry,
    layout: &PageLayout,
) -> Document {
    let w = layout.width;
    let h = layout.height;
    let cx = w / 2.0;
    let mut page = Page::new(1, true, w, h);

    let inset = layout.margin / 2.0;
    page.rect(
        inset,
        inset,
        w - layout.margin,
        h - layout.margin,
        None,
        Some((Color::grey(0.2), 2.0)),
    );

    let mut y = h - 100.0;

    match logo.filter(|l| l.width > 0 && l.height > 0) {
        Some(img) => {
            let logo_h = img.height as f32 / img.width as f32 * LOGO_WIDTH;
            page.image(Arc::new(img), cx - LOGO_WIDTH / 2.0, y - logo_h, LOGO_WIDTH, logo_h);
            y -= logo_h + 30.0;
        }
        None => y -= 30.0,
    }

    let centred = |page: &mut Page, text: &str, y: f32, size: f32, role: FontRole, color: Color| {
        let tw = fonts.width_of(role, text, size);
        page.text(text, cx - tw / 2.0, y, size, role, color);
    };

    centred(
        &mut page,
        &details.university_name.to_uppercase(),
        y,
        22.0,
        FontRole::Bold,
        Color::grey(0.1),
    );
    y -= 40.0;
    if !details.college_name.trim().is_empty() {
        centred(&mut page, &details.college_name, y, 16.0, FontRole::Regular, Color::grey(0.2));
    }
    y -= 60.0;

    page.rule((cx - 150.0, y), (cx + 150.0, y), 2.0, Color::grey(0.3));
    y -= 40.0;

    // Title box
    let (box_w, box_h) = TITLE_BOX;
    page.rect(
        cx - box_w / 2.0,
        y - box_h,
        box_w,
        box_h,
        Some(Color::grey(0.97)),
        Some((Color::grey(0.7), 1.0)),
    );
    centred(&mut page, "ASSIGNMENT TITLE", y - 25.0, 14.0, FontRole::Bold, LABEL_GREY);

    let title_lines = wrap_text(&details.assignment_title, box_w - 40.0, fonts, FontRole::Title, 18.0);
    match title_lines.as_slice() {
        [] => {}
        [only] => centred(&mut page, only, y - 50.0, 18.0, FontRole::Title, Color::BLACK),
        [first, rest @ ..] => {
            centred(&mut page, first, y - 45.0, 18.0, FontRole::Title, Color::BLACK);
            centred(&mut page, &rest.join(" "), y - 65.0, 18.0, FontRole::Title, Color::BLACK);
        }
    }
    y -= box_h + 60.0;

    // Submission box
    let members = match &details.submitter {
        Submitter::Group { members } => members.len(),
        Submitter::Individual { .. } => 0,
    };
    let info_h = INFO_BOX_MIN_HEIGHT.max(80.0 + 18.0 * members as f32);
    let info_x = cx - INFO_BOX_WIDTH / 2.0;
    page.rect(
        info_x,
        y - info_h,
        INFO_BOX_WIDTH,
        info_h,
        Some(Color::rgb(0.98, 0.98, 1.0)),
        Some((Color::rgb(0.6, 0.6, 0.8), 1.0)),
    );

    let left = info_x + 30.0;
    let right = cx + 20.0;
    let top = y - 30.0;

    page.text("SUBMITTED BY", left, top, LABEL_SIZE, FontRole::Bold, Color::rgb(0.3, 0.3, 0.6));
    let mut row = top - 25.0;
    match &details.submitter {
        Submitter::Individual {
            student_name,
            student_id,
        } => {
            for (label, value) in [
                ("Student Name:", student_name.as_str()),
                ("Student ID:", student_id.as_str()),
                ("Section:", details.section.as_str()),
            ] {
                labelled(&mut page, label, value, left, row, 90.0);
                row -= 20.0;
            }
        }
        Submitter::Group { members } => {
            page.text("Group Members:", left, row, LABEL_SIZE, FontRole::Bold, LABEL_GREY);
            row -= 18.0;
            for name in members {
                page.text(name.as_str(), left + 10.0, row, VALUE_SIZE, FontRole::Serif, Color::BLACK);
                row -= 18.0;
            }
            if !details.section.trim().is_empty() {
                labelled(&mut page, "Section:", &details.section, left, row, 90.0);
            }
        }
    }

    page.text("SUBMITTED TO", right, top, LABEL_SIZE, FontRole::Bold, Color::rgb(0.6, 0.3, 0.3));
    labelled(&mut page, "Instructor:", &details.instructor_name, right, top - 25.0, 70.0);
    labelled(
        &mut page,
        "Submission Date:",
        &details.formatted_date(),
        right,
        top - 65.0,
        100.0,
    );

    Document { pages: vec![page] }
}

fn labelled(page: &mut Page, label: &str, value: &str, x: f32, y: f32, value_offset: f32) {
    page.text(label, x, y, LABEL_SIZE, FontRole::Bold, LABEL_GREY);
    page.text(value, x + value_offset, y, VALUE_SIZE, FontRole::Serif, Color::BLACK);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::canvas::DrawOp;

    fn details(submitter: Submitter) -> CoverDetails {
        CoverDetails {
            university_name: "Northbridge University".into(),
            college_name: "College of Humanities".into(),
            assignment_title: "Narrative Voice in Modern Fiction".into(),
            instructor_name: "Dr. Hale".into(),
            submission_date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            section: "B".into(),
            submitter,
            logo_url: None,
        }
    }

    #[test]
    fn individual_cover_contents() {
        let fonts = FontRegistry::standard();
        let d = details(Submitter::Individual {
            student_name: "Ana Ruiz".into(),
            student_id: "20231".into(),
        });
        let doc = render_cover(&d, None, &fonts, &PageLayout::US_LETTER);
        assert_eq!(doc.page_count(), 1);
        let text = doc.all_text();
        for needle in [
            "NORTHBRIDGE UNIVERSITY",
            "ASSIGNMENT TITLE",
            "Narrative Voice in Modern Fiction",
            "Ana Ruiz",
            "20231",
            "Dr. Hale",
            "Mar 04 2025",
        ] {
            assert!(text.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn group_cover_lists_members() {
        let fonts = FontRegistry::standard();
        let d = details(Submitter::Group {
            members: vec!["A. One".into(), "B. Two".into(), "C. Three".into()],
        });
        let doc = render_cover(&d, None, &fonts, &PageLayout::US_LETTER);
        let text = doc.all_text();
        assert!(text.contains("Group Members:"));
        assert!(text.contains("C. Three"));
    }

    #[test]
    fn long_title_uses_two_lines() {
        let fonts = FontRegistry::standard();
        let mut d = details(Submitter::Individual {
            student_name: "X".into(),
            student_id: "1".into(),
        });
        d.assignment_title =
            "A Comparative Study of Renewable Energy Adoption Across Developing Economies".into();
        let doc = render_cover(&d, None, &fonts, &PageLayout::US_LETTER);
        let title_runs = doc.pages[0]
            .ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Text { role: FontRole::Title, .. }))
            .count();
        assert_eq!(title_runs, 2);
    }

    #[test]
    fn logo_is_drawn_when_present() {
        let fonts = FontRegistry::standard();
        let d = details(Submitter::Individual {
            student_name: "X".into(),
            student_id: "1".into(),
        });
        let logo = RasterImage {
            width: 4,
            height: 2,
            rgb: vec![0; 24],
        };
        let doc = render_cover(&d, Some(logo), &fonts, &PageLayout::US_LETTER);
        let image = doc.pages[0].ops.iter().find_map(|op| match op {
            DrawOp::Image { width, height, .. } => Some((*width, *height)),
            _ => None,
        });
        assert_eq!(image, Some((120.0, 60.0)));
    }

    #[test]
    fn undecodable_logo_is_skipped() {
        assert!(decode_logo(b"not an image").is_none());
    }

    #[test]
    fn submitter_serde_shape() {
        let json = r#"{"type":"group","members":["a","b"]}"#;
        let s: Submitter = serde_json::from_str(json).unwrap();
        assert_eq!(
            s,
            Submitter::Group {
                members: vec!["a".into(), "b".into()]
            }
        );
    }
}
