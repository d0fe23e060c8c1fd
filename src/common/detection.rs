//! Document format detection.
//!
//! Probes a byte stream for the binary compound-file signature first, then
//! for a ZIP local-file header whose first stored entry is the HWPX MIME
//! marker.

use crate::common::error::FormatError;

/// The OLE2/CFB magic bytes shared by all binary HWP 5.x files.
pub const CFB_MAGIC: &[u8; 8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// ZIP local file header signature.
pub const ZIP_MAGIC: &[u8; 4] = &[0x50, 0x4B, 0x03, 0x04];

/// MIME marker content of the first HWPX archive entry.
pub const HWPX_MIMETYPE: &str = "application/hwp+zip";

/// Detected document container kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Legacy binary format (OLE2 compound file)
    HwpBinary,
    /// ZIP+XML package format
    Hwpx,
}

/// Detect the container kind from the leading bytes of a document.
///
/// The binary signature is checked first; a ZIP signature is only accepted
/// when the archive's first entry is the `mimetype` marker (checked later by
/// the HWPX reader, which fails with [`FormatError::BadSignature`] if the
/// marker content is wrong).
pub fn detect(bytes: &[u8]) -> Result<DocumentKind, FormatError> {
    if bytes.len() >= CFB_MAGIC.len() && &bytes[..CFB_MAGIC.len()] == CFB_MAGIC {
        return Ok(DocumentKind::HwpBinary);
    }

    if bytes.len() >= ZIP_MAGIC.len() && &bytes[..ZIP_MAGIC.len()] == ZIP_MAGIC {
        return Ok(DocumentKind::Hwpx);
    }

    Err(FormatError::BadSignature(
        "neither an OLE2 compound file nor a ZIP package".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_binary() {
        let mut bytes = CFB_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        assert_eq!(detect(&bytes).unwrap(), DocumentKind::HwpBinary);
    }

    #[test]
    fn test_detect_zip() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(b"mimetype");
        assert_eq!(detect(&bytes).unwrap(), DocumentKind::Hwpx);
    }

    #[test]
    fn test_detect_unknown() {
        assert!(detect(b"%PDF-1.7").is_err());
        assert!(detect(&[]).is_err());
    }
}
