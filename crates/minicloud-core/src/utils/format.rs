/// Format a byte count as kilobytes with two decimals, e.g. "2.00 KB"
pub fn format_size_kb(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Coarse file category used to pick a preview style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Pdf,
    Audio,
    Video,
    Other,
}

impl FileKind {
    /// Classify by file extension (case-insensitive)
    pub fn from_file_name(name: &str) -> Self {
        let ext = match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return FileKind::Other,
        };
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" => FileKind::Image,
            "pdf" => FileKind::Pdf,
            "mp3" | "wav" | "ogg" => FileKind::Audio,
            "mp4" | "webm" | "mov" => FileKind::Video,
            _ => FileKind::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Pdf => "pdf",
            FileKind::Audio => "audio",
            FileKind::Video => "video",
            FileKind::Other => "file",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_kb() {
        assert_eq!(format_size_kb(0), "0.00 KB");
        assert_eq!(format_size_kb(1024), "1.00 KB");
        assert_eq!(format_size_kb(1536), "1.50 KB");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
    }

    #[test]
    fn test_file_kind() {
        assert_eq!(FileKind::from_file_name("cat.JPG"), FileKind::Image);
        assert_eq!(FileKind::from_file_name("report.pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_file_name("song.ogg"), FileKind::Audio);
        assert_eq!(FileKind::from_file_name("clip.mp4"), FileKind::Video);
        assert_eq!(FileKind::from_file_name("README"), FileKind::Other);
        assert_eq!(FileKind::from_file_name("archive.tar.gz"), FileKind::Other);
    }
}
