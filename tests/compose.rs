//! Composition engine, end to end: generated text in, merged PDF out.
//!
//! No pdfium and no network; every document here is written by the crate
//! itself and read back with lopdf.

use chrono::NaiveDate;
use edgequake_assignment::compose::{normalize_cover, split_segments};
use edgequake_assignment::pipeline::postprocess::{clean_generated_text, enforce_page_budget};
use edgequake_assignment::{
    assemble, compose_cover, compose_fragment, merge, page_count, AssignmentError, CoverDetails,
    FragmentKind, Fragments, PageBreakPolicy, PageLayout, Submitter,
};
use lopdf::content::Content;
use lopdf::{Document, Object};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn details() -> CoverDetails {
    CoverDetails {
        university_name: "Northbridge University".into(),
        college_name: "College of Humanities".into(),
        assignment_title: "Narrative Voice".into(),
        instructor_name: "Dr. Hale".into(),
        submission_date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
        section: "B".into(),
        submitter: Submitter::Individual {
            student_name: "Ana Ruiz".into(),
            student_id: "20231".into(),
        },
        logo_url: None,
    }
}

/// All `Tj` strings of each page, joined with spaces.
fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| {
            let content = Content::decode(&doc.get_page_content(id).unwrap()).unwrap();
            content
                .operations
                .iter()
                .filter(|op| op.operator == "Tj")
                .filter_map(|op| match op.operands.first() {
                    Some(Object::String(s, _)) => Some(String::from_utf8_lossy(s).into_owned()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

const BODY: &str = "\
```markdown
# Narrative Voice in Modern Fiction

The narrator\u{2019}s stance shapes **every** reading of the text.

===PAGE BREAK===

## First-Person Narration

- Intimacy with the reader
- *Unreliable* accounts

=== PAGE BREAK ===

## Conclusion

Voice is a structural choice, not ornament.
```";

const OUTLINE: &str = "\
# TABLE OF CONTENTS
>> **Introduction** ........ 1
    * [Background] ........ 1
>> **First-Person Narration** ........ 2
>> **Conclusion** ........ 3";

const REFERENCES: &str = "\
# References

Booth, W. C. (1961). *The Rhetoric of Fiction*. University of Chicago Press.

Genette, G. (1980). *Narrative Discourse*. Cornell University Press.";

// ── Body ─────────────────────────────────────────────────────────────────────

#[test]
fn cleaned_body_has_one_page_per_segment() {
    let text = clean_generated_text(BODY);
    assert_eq!(split_segments(&text).len(), 3);

    let text = enforce_page_budget(&text, 3, PageBreakPolicy::Strict).unwrap();
    let pdf = compose_fragment(FragmentKind::Body, &text, &PageLayout::US_LETTER, Some("Narrative Voice"))
        .unwrap();
    assert_eq!(page_count(&pdf).unwrap(), 3);

    let pages = page_texts(&pdf);
    assert!(pages[0].contains("Narrative Voice"), "page 1: {}", pages[0]);
    assert!(pages[1].contains("First-Person"), "page 2: {}", pages[1]);
    assert!(pages[2].contains("Conclusion"), "page 3: {}", pages[2]);
}

#[test]
fn clamp_folds_surplus_pages_into_the_last() {
    let text = clean_generated_text(BODY);
    let clamped = enforce_page_budget(&text, 2, PageBreakPolicy::Clamp).unwrap();
    let pdf = compose_fragment(FragmentKind::Body, &clamped, &PageLayout::US_LETTER, None).unwrap();
    assert_eq!(page_count(&pdf).unwrap(), 2);
    assert!(page_texts(&pdf)[1].contains("Conclusion"));
}

#[test]
fn strict_rejects_a_short_body() {
    let text = clean_generated_text(BODY);
    let err = enforce_page_budget(&text, 5, PageBreakPolicy::Strict).unwrap_err();
    assert!(matches!(err, AssignmentError::UpstreamGeneration { .. }));
}

#[test]
fn long_segment_overflows_onto_extra_pages() {
    let paragraph = "Sentences about narrative distance and focalisation. ".repeat(40);
    let text = vec![paragraph; 12].join("\n\n");
    let pdf = compose_fragment(FragmentKind::Body, &text, &PageLayout::US_LETTER, None).unwrap();
    assert!(page_count(&pdf).unwrap() > 1);
}

// ── Full document ────────────────────────────────────────────────────────────

#[test]
fn assembled_document_is_cover_outline_references_body() {
    let layout = PageLayout::US_LETTER;
    let body_text = clean_generated_text(BODY);
    let fragments = Fragments {
        cover: Some(compose_cover(&details(), None, &layout).unwrap()),
        outline: Some(compose_fragment(FragmentKind::Outline, OUTLINE, &layout, None).unwrap()),
        references: Some(
            compose_fragment(FragmentKind::References, REFERENCES, &layout, None).unwrap(),
        ),
        body: compose_fragment(FragmentKind::Body, &body_text, &layout, Some("Narrative Voice"))
            .unwrap(),
    };

    let merged = assemble(&fragments).unwrap();
    let pages = page_texts(&merged);
    assert_eq!(pages.len(), 6);
    assert!(pages[0].contains("NORTHBRIDGE UNIVERSITY"), "cover: {}", pages[0]);
    assert!(pages[1].contains("TABLE OF CONTENTS"), "outline: {}", pages[1]);
    assert!(pages[2].contains("Booth"), "references: {}", pages[2]);
    assert!(pages[3].contains("Narrative Voice in Modern Fiction"), "body: {}", pages[3]);
}

#[test]
fn references_page_carries_no_banner() {
    let pdf = compose_fragment(
        FragmentKind::References,
        REFERENCES,
        &PageLayout::US_LETTER,
        Some("Banner Title"),
    )
    .unwrap();
    assert!(!page_texts(&pdf)[0].contains("Banner Title"));
}

#[test]
fn custom_cover_goes_first() {
    let layout = PageLayout::US_LETTER;
    let cover = normalize_cover(&compose_cover(&details(), None, &layout).unwrap()).unwrap();
    let body = compose_fragment(FragmentKind::Body, "Only page.", &layout, None).unwrap();

    let merged = assemble(&Fragments {
        cover: Some(cover),
        outline: None,
        references: None,
        body,
    })
    .unwrap();
    let pages = page_texts(&merged);
    assert_eq!(pages.len(), 2);
    assert!(pages[0].contains("SUBMITTED BY"));
    assert!(pages[1].contains("Only page."));
}

#[test]
fn multi_page_cover_is_rejected() {
    let layout = PageLayout::US_LETTER;
    let two = compose_fragment(FragmentKind::Body, "a\n===PAGE BREAK===\nb", &layout, None).unwrap();
    assert!(matches!(
        normalize_cover(&two),
        Err(AssignmentError::MalformedInput { .. })
    ));
}

#[test]
fn merge_preserves_fragment_order_and_counts() {
    let layout = PageLayout::US_LETTER;
    let a = compose_fragment(FragmentKind::Body, "alpha\n===PAGE BREAK===\nbeta", &layout, None).unwrap();
    let b = compose_fragment(FragmentKind::Body, "gamma", &layout, None).unwrap();
    let merged = merge(&[a, b]).unwrap();
    let pages = page_texts(&merged);
    assert_eq!(pages.len(), 3);
    assert!(pages[0].contains("alpha"));
    assert!(pages[1].contains("beta"));
    assert!(pages[2].contains("gamma"));
}
