//! Supported document formats and the extractor family each one uses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A file format the pipeline knows how to extract.
///
/// The set is closed: [`DocumentFormat::from_extension`] returns `None` for
/// anything else and the processor rejects the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
    Pptx,
    Ppt,
    Png,
    Jpg,
    Jpeg,
    Txt,
    Md,
}

/// How a format is turned into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Parsed in-process by pdfium.
    Pdf,
    /// Parsed in-process from the OOXML slide parts.
    Slides,
    /// Rendered to PDF by an external converter, then parsed as PDF.
    Converted,
    /// Read by a vision model.
    Vision,
    /// Split into fixed-size windows.
    Text,
}

impl DocumentFormat {
    const ALL: [DocumentFormat; 10] = [
        DocumentFormat::Pdf,
        DocumentFormat::Docx,
        DocumentFormat::Doc,
        DocumentFormat::Pptx,
        DocumentFormat::Ppt,
        DocumentFormat::Png,
        DocumentFormat::Jpg,
        DocumentFormat::Jpeg,
        DocumentFormat::Txt,
        DocumentFormat::Md,
    ];

    /// Case-insensitive lookup of an extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(ext))
    }

    /// Lookup by the extension of a file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Every supported extension, lower-case.
    pub fn extensions() -> impl Iterator<Item = &'static str> {
        Self::ALL.into_iter().map(|f| f.extension())
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Ppt => "ppt",
            DocumentFormat::Png => "png",
            DocumentFormat::Jpg => "jpg",
            DocumentFormat::Jpeg => "jpeg",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Md => "md",
        }
    }

    pub fn strategy(self) -> Strategy {
        match self {
            DocumentFormat::Pdf => Strategy::Pdf,
            DocumentFormat::Pptx => Strategy::Slides,
            DocumentFormat::Docx | DocumentFormat::Doc | DocumentFormat::Ppt => Strategy::Converted,
            DocumentFormat::Png | DocumentFormat::Jpg | DocumentFormat::Jpeg => Strategy::Vision,
            DocumentFormat::Txt | DocumentFormat::Md => Strategy::Text,
        }
    }

    /// Label used in placeholder headers and `metadata.format`.
    pub fn kind_label(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Pptx => "PowerPoint",
            DocumentFormat::Docx | DocumentFormat::Doc => "Word document",
            DocumentFormat::Ppt => "Presentation",
            DocumentFormat::Png | DocumentFormat::Jpg | DocumentFormat::Jpeg => "Image",
            DocumentFormat::Txt | DocumentFormat::Md => "Text",
        }
    }

    /// MIME type sent to the vision model. Non-image formats map to JPEG.
    pub fn image_mime(self) -> &'static str {
        match self {
            DocumentFormat::Png => "image/png",
            _ => "image/jpeg",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(DocumentFormat::from_extension("PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension(".PpTx"), Some(DocumentFormat::Pptx));
        assert_eq!(DocumentFormat::from_file_name("Scan.JPEG"), Some(DocumentFormat::Jpeg));
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        assert_eq!(DocumentFormat::from_extension("xlsx"), None);
        assert_eq!(DocumentFormat::from_file_name("README"), None);
        assert_eq!(DocumentFormat::from_file_name("archive.tar.gz"), None);
    }

    #[test]
    fn legacy_office_formats_are_converted() {
        for ext in ["doc", "docx", "ppt"] {
            let f = DocumentFormat::from_extension(ext).unwrap();
            assert_eq!(f.strategy(), Strategy::Converted, "{ext}");
        }
        assert_eq!(DocumentFormat::Pptx.strategy(), Strategy::Slides);
    }

    #[test]
    fn image_mime_types() {
        assert_eq!(DocumentFormat::Png.image_mime(), "image/png");
        assert_eq!(DocumentFormat::Jpg.image_mime(), "image/jpeg");
        assert_eq!(DocumentFormat::Jpeg.image_mime(), "image/jpeg");
    }

    #[test]
    fn extension_list_covers_every_variant() {
        assert_eq!(DocumentFormat::extensions().count(), 10);
    }
}
