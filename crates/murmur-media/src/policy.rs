use thiserror::Error;

/// 10 MiB
pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

pub const DEFAULT_ALLOWED_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/webm",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("upload is empty")]
    Empty,

    #[error("upload is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("content type '{0}' is not allowed")]
    UnsupportedType(String),
}

/// Size and type restrictions for the media bucket.
#[derive(Debug, Clone)]
pub struct MediaPolicy {
    pub max_bytes: usize,
    pub allowed_types: Vec<String>,
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self::with_max_bytes(DEFAULT_MAX_BYTES)
    }
}

impl MediaPolicy {
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Validate an upload and return its normalised mime type
    /// (parameters such as `; charset=...` stripped, lower-cased).
    pub fn check(&self, content_type: &str, size: usize) -> Result<String, PolicyError> {
        if size == 0 {
            return Err(PolicyError::Empty);
        }
        if size > self.max_bytes {
            return Err(PolicyError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }

        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if !self.allowed_types.iter().any(|t| *t == mime) {
            return Err(PolicyError::UnsupportedType(mime));
        }

        Ok(mime)
    }
}
