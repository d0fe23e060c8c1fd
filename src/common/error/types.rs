//! Error taxonomy: malformed/unsupported input vs. injection failures.
use thiserror::Error;

/// Errors raised while reading or decoding a document container.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The container signature or MIME marker is missing or wrong
    #[error("bad signature: {0}")]
    BadSignature(String),

    /// The document is password-encrypted; decryption is not supported
    #[error("document is encrypted")]
    Encrypted,

    /// The document uses a feature that rules it out as input (DRM, distribution lock)
    #[error("unsupported document: {0}")]
    Unsupported(String),

    /// A stream failed to decompress or decode
    #[error("corrupt stream '{stream}': {reason}")]
    CorruptStream { stream: String, reason: String },

    /// A record's declared size runs past the end of its stream
    #[error("truncated record (tag {tag}) at offset {offset} in '{stream}'")]
    TruncatedRecord {
        stream: String,
        tag: u16,
        offset: usize,
    },

    /// A required stream or package part is absent
    #[error("component not found: {0}")]
    ComponentNotFound(String),

    /// XML parsing or serialization error
    #[error("XML error: {0}")]
    Xml(String),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the injection engine and the write/verify cycle.
#[derive(Error, Debug)]
pub enum InjectionError {
    /// A mapping entry's position path no longer resolves in the template
    #[error("injection target not found at {path}")]
    TargetNotFound { path: String },

    /// Content grid dimensions do not match the target table's topology
    #[error(
        "table shape mismatch at {path}: target is {target_rows}x{target_cols}, \
         content is {content_rows}x{content_cols}"
    )]
    ShapeMismatch {
        path: String,
        target_rows: usize,
        target_cols: usize,
        content_rows: usize,
        content_cols: usize,
    },

    /// The mapped block's kind does not accept the supplied content
    #[error("content mismatch at {path}: {reason}")]
    ContentMismatch { path: String, reason: String },

    /// Read-back verification kept failing after the bounded retry cycle
    #[error("verification failed after {attempts} attempts: {diff}")]
    VerificationFailed { attempts: u32, diff: String },
}

/// Main error type for yuja operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or unsupported input
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Injection or verification failure
    #[error(transparent)]
    Injection(#[from] InjectionError),

    /// JSON (de)serialization error in a persisted form
    #[error("JSON error: {0}")]
    Json(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for yuja operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<quick_xml::Error> for FormatError {
    fn from(err: quick_xml::Error) -> Self {
        FormatError::Xml(err.to_string())
    }
}

impl From<zip::result::ZipError> for FormatError {
    fn from(err: zip::result::ZipError) -> Self {
        FormatError::Zip(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Format(FormatError::Xml(err.to_string()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Format(FormatError::Zip(err.to_string()))
    }
}
