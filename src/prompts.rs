//! Prompts and user-facing placeholder texts.
//!
//! Every degraded extraction produces a chunk whose first line is a
//! `[<kind>: <file name>]` header, so a reader of the chunk store can tell
//! which upload it came from even when no real text was recovered.

/// Default prompt for reading text out of an image.
///
/// The model is told to answer with a fixed marker when the image holds no
/// text; [`is_no_text_marker`] recognises that answer.
pub const IMAGE_TEXT_PROMPT: &str = "この画像に含まれるすべてのテキストを抽出してください。\
テキストがない場合は「テキストなし」と応答してください。\n\
Extract all text contained in this image. If there is no text, reply with \"no text\".";

/// Answers that mean "the image contains no text" (compared case-insensitively).
pub const NO_TEXT_MARKERS: [&str; 2] = ["テキストなし", "no text"];

/// Returns `true` if `response` is empty or one of the [`NO_TEXT_MARKERS`].
pub fn is_no_text_marker(response: &str) -> bool {
    let normalised = response.trim().to_lowercase();
    normalised.is_empty() || NO_TEXT_MARKERS.iter().any(|m| normalised == *m)
}

/// Header line naming the document kind and the uploaded file.
pub fn header(kind: &str, file_name: &str) -> String {
    format!("[{kind}: {file_name}]")
}

/// Placeholder for an image that yielded no text.
pub fn image_without_text(file_name: &str) -> String {
    format!("{}\nNo text could be extracted from the image.", header("Image", file_name))
}

/// Placeholder for a converted document whose PDF had no text layer.
pub fn document_without_text(kind: &str, file_name: &str) -> String {
    format!("{}\nNo text content was found.", header(kind, file_name))
}

/// Placeholder for a conversion that hit its time limit.
pub fn conversion_timed_out(kind: &str, file_name: &str) -> String {
    format!("{}\nProcessing timed out.", header(kind, file_name))
}

/// Placeholder carrying an arbitrary failure description.
pub fn processing_failed(kind: &str, file_name: &str, error: &dyn std::fmt::Display) -> String {
    format!("{}\nProcessing error: {error}", header(kind, file_name))
}
