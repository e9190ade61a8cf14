//! Prompts for the vision OCR backend.
//!
//! Kept apart from [`crate::backend::vision`] so unit tests can inspect the
//! exact text sent to the model without a provider.

use crate::request::RecognitionOptions;

/// System prompt for transcribing one image unit.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe the text visible in the image exactly.

Rules:
1. Output ONLY the transcribed text, nothing else
2. Preserve line breaks and reading order
3. Do NOT describe the image, translate, summarise or correct spelling
4. Do NOT wrap the output in code fences or quotes
5. If the image contains no legible text, output nothing"#;

/// The full system prompt for a request: base rules plus the request's
/// languages and whitelist.
pub fn ocr_prompt(options: &RecognitionOptions) -> String {
    let mut prompt = String::from(OCR_SYSTEM_PROMPT);
    prompt.push_str(&format!(
        "\n\nThe text is written in: {} (Tesseract language codes).",
        options.languages.join(", ")
    ));
    if !options.whitelist.is_empty() {
        prompt.push_str(&format!(
            "\nThe text consists only of these characters: {}",
            options.whitelist
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_languages() {
        let opts = RecognitionOptions::new("vision", &["eng", "fra"]);
        let p = ocr_prompt(&opts);
        assert!(p.starts_with(OCR_SYSTEM_PROMPT));
        assert!(p.contains("eng, fra"));
        assert!(!p.contains("only of these characters"));
    }

    #[test]
    fn prompt_mentions_whitelist() {
        let opts = RecognitionOptions::new("vision", &["eng"]).with_whitelist("0123456789");
        assert!(ocr_prompt(&opts).contains("only of these characters: 0123456789"));
    }
}
