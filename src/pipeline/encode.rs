//! Attachment encoding: uploaded bytes → base64 `ImageData`.
//!
//! Multimodal chat APIs (Gemini, OpenAI, Anthropic) take inline files as
//! base64 payloads in the JSON request body, tagged with their MIME type.
//! Gemini reads PDFs through the same channel as images.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Encode an upload for the model request.
///
/// Images get `detail: "high"` so small print survives the provider's
/// tiling; without it a scanned page is read from a single low-res tile.
pub fn encode_attachment(bytes: &[u8], content_type: &str) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} attachment → {} bytes base64", content_type, b64.len());

    let data = ImageData::new(b64, content_type);
    if content_type.starts_with("image/") {
        data.with_detail("high")
    } else {
        data
    }
}
