//! Image encoding: raw file bytes → base64 [`ImageInput`].
//!
//! The uploaded bytes are sent unchanged. Re-encoding would lose JPEG
//! quality and change nothing the model can read.

use crate::format::DocumentFormat;
use crate::pipeline::llm::ImageInput;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// MIME type for an image file name; unrecognised extensions map to JPEG.
pub fn mime_for(file_name: &str) -> &'static str {
    DocumentFormat::from_file_name(file_name)
        .map(DocumentFormat::image_mime)
        .unwrap_or("image/jpeg")
}

/// Base64-wrap image bytes for the vision request body.
pub fn encode_image(bytes: &[u8], file_name: &str) -> ImageInput {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image → {} bytes base64", b64.len());
    ImageInput::new(b64, mime_for(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_keeps_bytes_verbatim() {
        let bytes = [0x89, b'P', b'N', b'G', 0, 1, 2, 3];
        let img = encode_image(&bytes, "scan.png");
        assert_eq!(img.mime_type, "image/png");
        let decoded = STANDARD.decode(&img.base64).expect("valid base64");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn mime_falls_back_to_jpeg() {
        assert_eq!(mime_for("photo.JPG"), "image/jpeg");
        assert_eq!(mime_for("photo.webp"), "image/jpeg");
        assert_eq!(mime_for("noext"), "image/jpeg");
        assert_eq!(mime_for("diagram.PNG"), "image/png");
    }
}
