//! Post-processing: deterministic finishing of backend output.
//!
//! Engines differ in what they can enforce natively. Tesseract honours a
//! character whitelist itself and prints bare text; a vision model cannot be
//! constrained and sometimes wraps its answer in code fences. The rules
//! below fill in only what a backend's [`BackendCapabilities`] say it lacks,
//! so every backend's output meets the same contract.
//!
//! hOCR output is markup and is never filtered or rewritten, only trimmed
//! when asked.

use crate::backend::BackendCapabilities;
use crate::request::{OutputFormat, RecognitionOptions};
use once_cell::sync::Lazy;
use regex::Regex;

/// Apply the request's text contract to raw backend output.
///
/// Rules (applied in order, plain output only unless noted):
/// 1. Strip outer code fences (unless `caps.clean_text`)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode (unless `caps.clean_text`)
/// 4. Drop characters outside the whitelist, whitespace kept (unless `caps.whitelist`)
/// 5. Trim leading/trailing whitespace when `options.trim` (all formats)
pub fn finish_text(raw: &str, options: &RecognitionOptions, caps: BackendCapabilities) -> String {
    let mut text = match options.output_format {
        OutputFormat::Hocr => raw.to_string(),
        OutputFormat::Plain if caps.clean_text => normalise_line_endings(raw),
        OutputFormat::Plain => {
            let s = strip_code_fences(raw);
            let s = normalise_line_endings(&s);
            remove_invisible_chars(&s)
        }
    };

    if options.output_format == OutputFormat::Plain
        && !caps.whitelist
        && !options.whitelist.is_empty()
    {
        text = apply_whitelist(&text, &options.whitelist);
    }

    if options.trim {
        text = text.trim().to_string();
    }
    text
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:text|plaintext|markdown)?\n(.*)\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Whitelist filter ─────────────────────────────────────────────────

fn apply_whitelist(input: &str, whitelist: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_whitespace() || whitelist.contains(*c))
        .collect()
}
