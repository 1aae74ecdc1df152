//! Body normalizer: turns minified HTML/CSS/JS text into a line-oriented,
//! indented form that a code-generating agent can read.
//!
//! Normalization is total. Any input that is too large, or any pass that
//! fails, yields the input unchanged. JSON bodies pass through as they are.

mod markup;
mod reflow;
mod wrap;

use crate::types::Body;
use regex::Regex;
use std::sync::OnceLock;

/// Inputs longer than this many characters are returned unchanged.
pub const MAX_NORMALIZE_CHARS: usize = 100_000;

/// Target line width for reflow and the final long-line split.
pub const MAX_LINE_WIDTH: usize = 120;

/// Normalize a captured body. Only textual bodies are rewritten.
pub fn normalize(body: Body) -> Body {
    match body {
        Body::Text(text) => Body::Text(normalize_text(&text)),
        json @ Body::Json(_) => json,
    }
}

/// Normalize one text body.
pub fn normalize_text(text: &str) -> String {
    if text.chars().count() > MAX_NORMALIZE_CHARS {
        return text.to_string();
    }
    match std::panic::catch_unwind(|| run_pipeline(text)) {
        Ok(out) => out,
        Err(_) => {
            tracing::warn!(len = text.len(), "Normalizer failed, keeping body as-is");
            text.to_string()
        }
    }
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n(?:[ \t]*\n){3,}").expect("valid regex"))
}

fn run_pipeline(text: &str) -> String {
    let mut doc = if markup::looks_like_markup(text) {
        let segments = markup::segment(text);
        let rendered = markup::render(&segments);
        let indented = markup::reindent(&rendered);
        markup::ensure_doctype_and_charset(&indented)
    } else {
        text.to_string()
    };

    doc = blank_run_re().replace_all(&doc, "\n\n").into_owned();
    wrap::split_long_lines(&doc, MAX_LINE_WIDTH)
}
