//! Upload classification.
//!
//! The codec never looks at file types.  Classification happens once, at
//! the service boundary, before any bytes reach the codec.

use serde::{Deserialize, Serialize};
use std::path::Path;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "py", "c", "cpp", "java", "js", "html", "css", "php",
    "swift", "kotlin", "go", "rs", "sh", "bat",
];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
const PDF_EXTENSIONS: &[&str] = &["pdf"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Text,
    Image,
    Pdf,
    Other,
}

impl FileCategory {
    pub const ALL: [FileCategory; 4] =
        [FileCategory::Text, FileCategory::Image, FileCategory::Pdf, FileCategory::Other];

    /// Classify by extension (case-insensitive). Names without an extension
    /// are `Other`.
    pub fn from_filename(name: &str) -> Self {
        let ext = match Path::new(name).extension().and_then(|e| e.to_str()) {
            Some(e) => e.to_ascii_lowercase(),
            None    => return FileCategory::Other,
        };
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            FileCategory::Text
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            FileCategory::Image
        } else if PDF_EXTENSIONS.contains(&ext.as_str()) {
            FileCategory::Pdf
        } else {
            FileCategory::Other
        }
    }

    /// Guess an output extension from content.
    pub fn sniff(bytes: &[u8]) -> &'static str {
        if bytes.starts_with(b"%PDF-") {
            "pdf"
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            "png"
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            "jpg"
        } else if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
            "zip"
        } else if std::str::from_utf8(bytes).is_ok() {
            "txt"
        } else {
            "bin"
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FileCategory::Text  => "text",
            FileCategory::Image => "image",
            FileCategory::Pdf   => "pdf",
            FileCategory::Other => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(FileCategory::from_filename("notes.MD"), FileCategory::Text);
        assert_eq!(FileCategory::from_filename("main.rs"), FileCategory::Text);
        assert_eq!(FileCategory::from_filename("photo.JPEG"), FileCategory::Image);
        assert_eq!(FileCategory::from_filename("doc.pdf"), FileCategory::Pdf);
        assert_eq!(FileCategory::from_filename("archive.tar.gz"), FileCategory::Other);
        assert_eq!(FileCategory::from_filename("Makefile"), FileCategory::Other);
    }

    #[test]
    fn sniffs_common_signatures() {
        assert_eq!(FileCategory::sniff(b"%PDF-1.5\n"), "pdf");
        assert_eq!(FileCategory::sniff(b"\x89PNG\r\n\x1a\n...."), "png");
        assert_eq!(FileCategory::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), "jpg");
        assert_eq!(FileCategory::sniff(b"PK\x03\x04rest"), "zip");
        assert_eq!(FileCategory::sniff(b"plain text"), "txt");
        assert_eq!(FileCategory::sniff(b""), "txt");
        assert_eq!(FileCategory::sniff(&[0xC3, 0x28, 0x00]), "bin");
    }
}
