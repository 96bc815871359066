//! Error types for transcoding

use image::ImageError;
use std::io;

/// Errors that can occur while transcoding an image file.
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    /// Writing to the output failed. The transmission is truncated.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The input could not be identified or decoded.
    #[error("{}", decode_message(.name, .source))]
    Decode {
        /// Name of the input, when known (usually a file path)
        name: Option<String>,
        source: ImageError,
    },
}

impl TranscodeError {
    pub(crate) fn decode(name: Option<&str>, source: ImageError) -> Self {
        Self::Decode {
            name: name.filter(|n| !n.is_empty()).map(str::to_owned),
            source,
        }
    }
}

fn decode_message(name: &Option<String>, source: &ImageError) -> String {
    match name {
        Some(name) => format!("{}: {}", name, source),
        None => source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::error::{ImageFormatHint, UnsupportedError};

    fn unsupported() -> ImageError {
        ImageError::Unsupported(UnsupportedError::from(ImageFormatHint::Unknown))
    }

    #[test]
    fn test_decode_error_with_name() {
        let err = TranscodeError::decode(Some("cat.bmp"), unsupported());
        let msg = err.to_string();
        assert!(msg.starts_with("cat.bmp: "));
        assert!(msg.len() > "cat.bmp: ".len());
    }

    #[test]
    fn test_decode_error_without_name() {
        let named = TranscodeError::decode(Some(""), unsupported());
        let anonymous = TranscodeError::decode(None, unsupported());
        assert_eq!(named.to_string(), unsupported().to_string());
        assert_eq!(anonymous.to_string(), unsupported().to_string());
    }

    #[test]
    fn test_io_error_is_transparent() {
        let err = TranscodeError::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        assert_eq!(err.to_string(), "pipe closed");
        assert!(matches!(err, TranscodeError::Io(_)));
    }
}
