// Prompt text and image helpers shared by every classification backend.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Instructions for the JSON answer, shared by both prompts.
const ANSWER_FORMAT: &str = r#"Respond in JSON format:
{
    "classification": "toxic|spam|harassment|safe",
    "confidence": 0.95,
    "reasoning": "Explanation here"
}"#;

pub fn text_prompt(text: &str) -> String {
    format!(
        "Analyze the following text for content moderation. Classify it as one of: toxic, spam, harassment, or safe.\n\
         Provide a confidence score (0-1) and reasoning.\n\n\
         Text: {text}\n\n\
         {ANSWER_FORMAT}"
    )
}

pub fn image_prompt() -> String {
    format!(
        "Analyze this image for content moderation. Classify it as one of: toxic, spam, harassment, or safe.\n\
         Provide a confidence score (0-1) and reasoning.\n\n\
         {ANSWER_FORMAT}"
    )
}

/// Guess the MIME type of a base64-encoded image from its magic bytes.
///
/// Only the first few bytes are decoded. Anything unrecognised, including
/// invalid base64, is reported as JPEG.
pub fn image_mime_type(encoded_image: &str) -> &'static str {
    // 16 base64 chars decode to exactly 12 bytes, enough for every signature below.
    let prefix: String = encoded_image.trim().chars().take(16).collect();
    let Ok(bytes) = STANDARD.decode(prefix.as_bytes()) else {
        return "image/jpeg";
    };

    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}
