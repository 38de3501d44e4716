//! Best-effort inspection of uploaded bytes.

use image::ImageReader;
use std::io::Cursor;

/// What could be learned from a blob without trusting the caller's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inspection {
    /// MIME type sniffed from magic bytes.
    pub mime_type: Option<String>,
    /// Pixel dimensions, for decodable images.
    pub dimensions: Option<(u32, u32)>,
}

/// Sniffs the MIME type and, for images, reads the dimensions from the header.
///
/// Never fails: unknown or truncated content simply yields empty fields.
pub fn inspect(bytes: &[u8]) -> Inspection {
    let mime_type = infer::get(bytes).map(|kind| kind.mime_type().to_owned());

    let dimensions = if mime_type
        .as_deref()
        .is_some_and(|m| m.starts_with("image/"))
    {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok())
    } else {
        None
    };

    Inspection {
        mime_type,
        dimensions,
    }
}
