//! Input image helpers for submitting rounds from files.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fs;
use std::path::Path;

/// Guess an image MIME type from the file extension, defaulting to PNG.
pub fn mime_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

/// Encode raw image bytes as a `data:` URI.
pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Read an image file into a `data:` URI.
pub fn image_data_uri(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(encode_data_uri(mime_for_path(path), &bytes))
}

#[cfg(test)]
mod tests {
    use super::{encode_data_uri, image_data_uri, mime_for_path};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for_path(Path::new("cat.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("cat.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("cat")), "image/png");
    }

    #[test]
    fn encodes_bytes_as_data_uri() {
        assert_eq!(encode_data_uri("image/png", b"ABC"), "data:image/png;base64,QUJD");
    }

    #[test]
    fn reads_file_into_data_uri() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("input.gif");
        std::fs::write(&path, b"ABC").expect("write");
        assert_eq!(
            image_data_uri(&path).expect("uri"),
            "data:image/gif;base64,QUJD"
        );
    }
}
