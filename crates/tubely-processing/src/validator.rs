use std::fmt::{Display, Formatter, Result as FmtResult};
use tubely_core::media_types::{self, IMAGE_JPEG, IMAGE_PNG, VIDEO_MP4};

/// Validation errors for uploaded media
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing Content-Type for file")]
    MissingContentType,

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    UnsupportedContentType {
        content_type: String,
        allowed: &'static [&'static str],
    },

    #[error("File too large: more than {max} bytes")]
    FileTooLarge { max: usize },

    #[error("Empty file")]
    EmptyFile,
}

/// The two kinds of upload the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    Video,
    Thumbnail,
}

impl AssetClass {
    pub fn allowed_content_types(&self) -> &'static [&'static str] {
        match self {
            AssetClass::Video => &[VIDEO_MP4],
            AssetClass::Thumbnail => &[IMAGE_JPEG, IMAGE_PNG],
        }
    }

    /// Multipart field carrying the payload.
    pub fn form_field(&self) -> &'static str {
        match self {
            AssetClass::Video => "video",
            AssetClass::Thumbnail => "thumbnail",
        }
    }
}

impl Display for AssetClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.form_field())
    }
}

/// A content type that passed validation, with the extension derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedMedia {
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// Media validator for one asset class.
#[derive(Debug, Clone)]
pub struct MediaValidator {
    class: AssetClass,
    max_file_size: usize,
}

impl MediaValidator {
    pub fn new(class: AssetClass, max_file_size: usize) -> Self {
        Self {
            class,
            max_file_size,
        }
    }

    pub fn class(&self) -> AssetClass {
        self.class
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Accept exactly the class's media types, ignoring parameters and case.
    pub fn validate_content_type(
        &self,
        content_type: Option<&str>,
    ) -> Result<ValidatedMedia, ValidationError> {
        let raw = match content_type.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(ValidationError::MissingContentType),
        };

        let normalized = media_types::normalize(raw);
        let allowed = self.class.allowed_content_types();

        allowed
            .iter()
            .find(|candidate| **candidate == normalized)
            .and_then(|candidate| {
                media_types::extension_for(candidate).map(|extension| ValidatedMedia {
                    content_type: *candidate,
                    extension,
                })
            })
            .ok_or(ValidationError::UnsupportedContentType {
                content_type: normalized,
                allowed,
            })
    }

    /// Check a running byte count while the payload is still arriving.
    pub fn check_size(&self, received: usize) -> Result<(), ValidationError> {
        if received > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Check the final size once the payload is fully staged.
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }
        self.check_size(size)
    }
}
