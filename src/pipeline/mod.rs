//! Generation stages between an uploaded document and composable text.
//!
//! Each submodule implements one step, so the worker can be tested with a
//! scripted [`llm::TextGenerator`] while the real one is exercised end to end.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ postprocess ──▶ compose
//! (upload)  (pdfium)   (base64)   (VLM)   (cleanup)
//! ```
//!
//! 1. [`input`]: resolve an upload (bytes, base64, URL) to PDF bytes
//! 2. [`render`]: rasterise pages; runs in `spawn_blocking` because pdfium
//!    is not async-safe
//! 3. [`encode`]: PNG-encode and base64-wrap each page image
//! 4. [`llm`]: the [`llm::TextGenerator`] seam and its provider-backed
//!    implementation with retry/backoff
//! 5. [`postprocess`]: deterministic cleanup and page-budget enforcement

pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
