//! Prompts for the three generation tasks.
//!
//! All prompt text lives here so the parsers in [`crate::compose`] and the
//! instructions the model receives cannot drift apart silently: the body
//! prompt names [`PAGE_BREAK_TOKEN`], the outline prompt spells out exactly the
//! line shapes [`crate::compose::toc`] recognises.

/// Delimiter between generated pages.
pub const PAGE_BREAK_TOKEN: &str = "===PAGE BREAK===";

/// System message shared by every task.
pub const SYSTEM_PROMPT: &str = "You are a distinguished academic writing specialist. \
You read the attached document pages and produce exactly the requested output in plain \
markdown, using only standard ASCII characters. You never add commentary before or after \
the requested content and never wrap it in code fences.";

/// Body prompt for a document of `pages` pages.
pub fn body_prompt(pages: u8) -> String {
    let breaks = pages.saturating_sub(1);
    format!(
        r#"Transform the attached document into a comprehensive, high-quality academic assignment.

CORE MISSION
Write exactly {pages} page(s) of rigorous academic content.

CONTENT
- Each page holds 550-650 words of substantive content
- Keep a sophisticated, authoritative academic tone
- Develop arguments supported by evidence and critical analysis
- Insert "{token}" at the end of each complete page except the last: exactly {breaks} time(s) in total
- Use only standard ASCII characters (no emojis or special symbols)

FORMATTING
- # for the main document title, once, at the very beginning
- ## for major sections (Introduction, Analysis, Conclusion, ...)
- ### for subsections, #### for fine-grained topics
- **bold** for key concepts, *italic* for titles of works and foreign terms
- "- " for bullet points, "  * " for nested bullet points
- 1., 2., 3. for sequential arguments

STRUCTURE
1. Introduction (10-15%): context, a clear thesis, a preview of the argument
2. Main body (70-75%): three or four developed themes with transitions and counterarguments
3. Conclusion (8-12%): synthesis, implications, further research

Deliver only the assignment content with its page breaks."#,
        pages = pages,
        token = PAGE_BREAK_TOKEN,
        breaks = breaks,
    )
}

/// Outline (table of contents) prompt.
pub const OUTLINE_PROMPT: &str = r#"Create a table of contents for the attached document.

Follow this EXACT format with NO deviations:

1. Start with: # TABLE OF CONTENTS
2. Use ONLY these two entry formats:
   - Main sections: ">> **Section Title** ........................ 3"
   - Subsections: "    * [Subtopic Title] ........................ 5"

Rules:
- Main sections start with ">> **" and end with "** ........................ [number]"
- Subsections start with "    * [" and end with "] ........................ [number]"
- No other heading formats
- Page numbers are the pages of the attached document where each section starts
- Use only ASCII characters

Example:
# TABLE OF CONTENTS

>> **Introduction** ........................ 1
    * [Background and Context] ........................ 1
    * [Research Objectives] ........................ 2

>> **Literature Review** ........................ 3
    * [Theoretical Framework] ........................ 3

>> **Conclusion** ........................ 6

Output only the formatted table of contents."#;

/// References prompt.
pub const REFERENCES_PROMPT: &str = r#"Compile a references page for the attached academic document.

Format:
- Start with: ## References
- One entry per line, starting with "- "
- APA 7th edition style, sorted alphabetically by first author
- Include 8 to 15 credible academic sources relevant to the document's arguments
- Use *italic* for titles of books and journals
- Use only ASCII characters

Output only the references page."#;
