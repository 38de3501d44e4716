//! Fallback icons served in place of thumbnails for non-image records.

/// Coarse MIME families that have a dedicated icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackIcon {
    Video,
    Audio,
    Pdf,
    Spreadsheet,
    WordProcessor,
    Presentation,
    Generic,
}

impl FallbackIcon {
    /// Picks an icon for `mime_type`. Anything unrecognised gets [`FallbackIcon::Generic`].
    pub fn for_mime(mime_type: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        let (category, subtype) = mime.split_once('/').unwrap_or((mime.as_str(), ""));

        match category {
            "video" => return Self::Video,
            "audio" => return Self::Audio,
            _ => {}
        }

        if subtype == "pdf" {
            Self::Pdf
        } else if subtype.contains("spreadsheet") || subtype.contains("ms-excel") || subtype == "csv"
        {
            Self::Spreadsheet
        } else if subtype.contains("presentation") || subtype.contains("ms-powerpoint") {
            Self::Presentation
        } else if subtype.contains("wordprocessing")
            || subtype.contains("msword")
            || subtype.contains("opendocument.text")
            || subtype == "rtf"
        {
            Self::WordProcessor
        } else {
            Self::Generic
        }
    }

    /// PNG bytes of the icon.
    pub fn bytes(self) -> &'static [u8] {
        match self {
            Self::Video => include_bytes!("../icons/video.png"),
            Self::Audio => include_bytes!("../icons/audio.png"),
            Self::Pdf => include_bytes!("../icons/pdf.png"),
            Self::Spreadsheet => include_bytes!("../icons/spreadsheet.png"),
            Self::WordProcessor => include_bytes!("../icons/word.png"),
            Self::Presentation => include_bytes!("../icons/presentation.png"),
            Self::Generic => include_bytes!("../icons/generic.png"),
        }
    }
}
