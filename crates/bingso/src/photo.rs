//! Photo upload to an inline preview string.

use base64::Engine;

use crate::error::{Error, Result};

/// Default upload limit: 5 MiB.
pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Turn an uploaded image into a `data:` URL.
///
/// # Errors
///
/// Returns [`Error::PhotoRejected`] when the content type is not an image,
/// the body is empty, or it exceeds `max_bytes`.
pub fn to_data_url(content_type: &str, bytes: &[u8], max_bytes: usize) -> Result<String> {
    let content_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if !content_type.starts_with("image/") {
        return Err(Error::PhotoRejected(format!(
            "only image files can be uploaded (got {})",
            if content_type.is_empty() { "no content type" } else { &content_type }
        )));
    }
    if bytes.is_empty() {
        return Err(Error::PhotoRejected("the file is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(Error::PhotoRejected(format!(
            "file is {} bytes, the limit is {max_bytes}",
            bytes.len()
        )));
    }

    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{content_type};base64,{encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_to_data_url() {
        let url = to_data_url("image/png", b"abc", DEFAULT_MAX_BYTES).unwrap();
        assert_eq!(url, "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_content_type_parameters_dropped() {
        let url = to_data_url("Image/JPEG; charset=binary", b"abc", DEFAULT_MAX_BYTES).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_rejects_non_image() {
        let err = to_data_url("application/pdf", b"%PDF", DEFAULT_MAX_BYTES).unwrap_err();
        assert!(matches!(err, Error::PhotoRejected(_)));
        assert!(to_data_url("", b"x", DEFAULT_MAX_BYTES).is_err());
    }

    #[test]
    fn test_rejects_oversized_and_empty() {
        assert!(to_data_url("image/png", &[0u8; 11], 10).is_err());
        assert!(to_data_url("image/png", &[0u8; 10], 10).is_ok());
        assert!(to_data_url("image/png", &[], 10).is_err());
    }
}
