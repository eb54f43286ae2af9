//! Post-processing: deterministic cleanup of model-written text.
//!
//! The composition engine reads a small markdown dialect and draws with
//! WinAnsi fonts, so generated text is normalised before it reaches the
//! paginator. Every rule is a pure `&str -> String` function.
//!
//! Rules (applied in order by [`clean_generated_text`]):
//! 1. Strip outer markdown fences
//! 2. Normalise line endings (CRLF → LF)
//! 3. Trim trailing whitespace per line
//! 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 5. Transliterate typographic punctuation to ASCII
//! 6. Canonicalise page-break lines (`=== Page Break ===` → `===PAGE BREAK===`)
//! 7. Replace image links with their alt text
//! 8. Collapse runs of blank lines
//! 9. End with exactly one newline
//!
//! [`enforce_page_budget`] then reconciles the number of page breaks with the
//! requested page count according to [`PageBreakPolicy`].

use crate::compose::paginate::split_segments;
use crate::config::PageBreakPolicy;
use crate::error::AssignmentError;
use crate::prompts::PAGE_BREAK_TOKEN;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

pub fn clean_generated_text(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = remove_invisible_chars(&s);
    let s = transliterate_punctuation(&s);
    let s = canonicalise_page_breaks(&s);
    let s = replace_image_links(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\r?\n(.*)\n```\s*$").expect("valid regex"));

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

// ── Rule 5: Typographic punctuation → ASCII ─────────────────────────────────

fn transliterate_punctuation(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => out.push('"'),
            '\u{2013}' | '\u{2212}' => out.push('-'),
            '\u{2014}' => out.push_str("--"),
            '\u{2026}' => out.push_str("..."),
            '\u{2022}' => out.push('-'),
            '\u{00A0}' | '\u{2009}' | '\u{202F}' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

// ── Rule 6: Canonical page breaks ────────────────────────────────────────────

static RE_PAGE_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*[=*_\-]{0,3}[ \t]*={2,}[ \t]*page[ \t]*break[ \t]*={2,}[ \t]*[=*_\-]{0,3}[ \t]*$")
        .expect("valid regex")
});

fn canonicalise_page_breaks(input: &str) -> String {
    RE_PAGE_BREAK.replace_all(input, PAGE_BREAK_TOKEN).to_string()
}

// ── Rule 7: Image links ──────────────────────────────────────────────────────
//
// The engine cannot draw images from the body, and models sometimes invent
// figure links anyway. The alt text survives as an italic caption.

static RE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").expect("valid regex"));

fn replace_image_links(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let alt = caps[1].trim();
            if alt.is_empty() {
                String::new()
            } else {
                format!("*{alt}*")
            }
        })
        .to_string()
}

// ── Rule 8: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 9: Single final newline ─────────────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{trimmed}\n")
    }
}

// ── Page budget ──────────────────────────────────────────────────────────────

/// Reconcile the page segments of `text` with `budget` requested pages.
///
/// Returns the text to paginate. Under [`PageBreakPolicy::Clamp`], surplus
/// trailing segments are folded into the last allowed page; under
/// [`PageBreakPolicy::Strict`], any mismatch is an upstream failure.
pub fn enforce_page_budget(
    text: &str,
    budget: u8,
    policy: PageBreakPolicy,
) -> Result<String, AssignmentError> {
    let segments = split_segments(text);
    let budget = usize::from(budget.max(1));
    let produced = segments.len();

    if segments.is_empty() {
        return Err(AssignmentError::upstream("body", "model returned no content"));
    }
    if produced == budget {
        return Ok(text.to_string());
    }

    match policy {
        PageBreakPolicy::BestEffort => {
            warn!(produced, budget, "page count differs from request, keeping as generated");
            Ok(text.to_string())
        }
        PageBreakPolicy::Strict => Err(AssignmentError::upstream(
            "body",
            format!("expected {budget} page(s), model produced {produced}"),
        )),
        PageBreakPolicy::Clamp if produced < budget => {
            warn!(produced, budget, "model produced fewer pages than requested");
            Ok(text.to_string())
        }
        PageBreakPolicy::Clamp => {
            warn!(produced, budget, "folding surplus pages into the last page");
            let (kept, surplus) = segments.split_at(budget - 1);
            let tail = surplus.join("\n\n");
            let mut pages: Vec<&str> = kept.to_vec();
            pages.push(&tail);
            Ok(pages.join(&format!("\n{PAGE_BREAK_TOKEN}\n")))
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_markdown_fences("```markdown\n# Hello\nWorld\n```"), "# Hello\nWorld");
        assert_eq!(strip_markdown_fences("```\n# Hello\n```"), "# Hello");
        assert_eq!(strip_markdown_fences("# Hello"), "# Hello");
    }

    #[test]
    fn test_transliterate() {
        assert_eq!(
            transliterate_punctuation("\u{201C}Quote\u{201D} \u{2014} it\u{2019}s\u{2026}"),
            "\"Quote\" -- it's..."
        );
    }

    #[test]
    fn test_canonical_page_breaks() {
        let input = "a\n=== Page Break ===\nb\n**===PAGE BREAK===**\nc\n===PAGE BREAK===\nd";
        let out = canonicalise_page_breaks(input);
        assert_eq!(out.matches(PAGE_BREAK_TOKEN).count(), 3);
        assert!(!out.contains("Page Break"));
        assert!(!out.contains("**"));
    }

    #[test]
    fn inline_page_break_text_is_left_alone() {
        let input = "The marker ===PAGE BREAK=== mid-sentence";
        assert_eq!(canonicalise_page_breaks(input), input);
    }

    #[test]
    fn test_image_links_become_captions() {
        assert_eq!(replace_image_links("![Growth chart](chart.png)"), "*Growth chart*");
        assert_eq!(replace_image_links("x ![](a.png) y"), "x  y");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_clean_full_pipeline() {
        let input = "```markdown\n# Title\r\n\r\nIt\u{2019}s   \n\n\n\n=== page break ===\n## Next\n```";
        let out = clean_generated_text(input);
        assert!(out.starts_with("# Title\n\nIt's\n"));
        assert!(out.contains("\n===PAGE BREAK===\n"));
        assert!(out.ends_with("## Next\n"));
    }

    fn body(pages: usize) -> String {
        (1..=pages)
            .map(|i| format!("Page {i}"))
            .collect::<Vec<_>>()
            .join(&format!("\n{PAGE_BREAK_TOKEN}\n"))
    }

    #[test]
    fn exact_budget_passes_every_policy() {
        for policy in [PageBreakPolicy::Clamp, PageBreakPolicy::Strict, PageBreakPolicy::BestEffort] {
            assert_eq!(enforce_page_budget(&body(3), 3, policy).unwrap(), body(3));
        }
    }

    #[test]
    fn clamp_folds_surplus_pages() {
        let out = enforce_page_budget(&body(5), 3, PageBreakPolicy::Clamp).unwrap();
        let segs = split_segments(&out);
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[2], "Page 3\n\nPage 4\n\nPage 5");
    }

    #[test]
    fn clamp_keeps_short_bodies() {
        let out = enforce_page_budget(&body(2), 4, PageBreakPolicy::Clamp).unwrap();
        assert_eq!(split_segments(&out).len(), 2);
    }

    #[test]
    fn strict_rejects_mismatch() {
        let err = enforce_page_budget(&body(4), 3, PageBreakPolicy::Strict).unwrap_err();
        assert!(matches!(err, AssignmentError::UpstreamGeneration { .. }));
        assert!(err.to_string().contains("expected 3"));
    }

    #[test]
    fn best_effort_keeps_everything() {
        let out = enforce_page_budget(&body(6), 2, PageBreakPolicy::BestEffort).unwrap();
        assert_eq!(split_segments(&out).len(), 6);
    }

    #[test]
    fn empty_body_is_upstream_failure() {
        let err = enforce_page_budget("  \n", 2, PageBreakPolicy::BestEffort).unwrap_err();
        assert!(matches!(err, AssignmentError::UpstreamGeneration { .. }));
    }
}
