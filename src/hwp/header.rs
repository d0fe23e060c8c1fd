//! The `FileHeader` stream: signature, version, document properties.

use super::consts::{FILE_HEADER_SIGNATURE, FILE_HEADER_SIGNATURE_LEN};
use crate::common::binary::read_u32_le;
use crate::common::error::FormatError;
use bitflags::bitflags;

bitflags! {
    /// Properties bit-field at offset 36 of the `FileHeader` stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DocumentProperties: u32 {
        /// Record streams are raw-deflate compressed
        const COMPRESSED           = 0x0001;
        /// Password encrypted
        const ENCRYPTED            = 0x0002;
        /// Distribution (view-only) document
        const DISTRIBUTION         = 0x0004;
        /// Contains scripts
        const SCRIPT               = 0x0008;
        /// DRM protected
        const DRM                  = 0x0010;
        /// Has an XML template storage
        const XML_TEMPLATE_STORAGE = 0x0020;
        /// Tracks document history
        const HISTORY              = 0x0040;
        /// Carries a digital signature
        const SIGNED               = 0x0080;
    }
}

/// Parsed `FileHeader` stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Version as `major.minor.build.revision`.
    pub version: (u8, u8, u8, u8),
    pub properties: DocumentProperties,
}

impl FileHeader {
    /// Parse the `FileHeader` stream contents.
    ///
    /// Verifies the fixed 32-byte signature, then reads the version word and
    /// the properties bit-field. Encrypted, DRM-protected and distribution
    /// documents are rejected here, before any record decode is attempted.
    pub fn parse(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < FILE_HEADER_SIGNATURE_LEN + 8 {
            return Err(FormatError::BadSignature(
                "FileHeader stream too short".to_string(),
            ));
        }
        if &data[..FILE_HEADER_SIGNATURE.len()] != FILE_HEADER_SIGNATURE {
            return Err(FormatError::BadSignature(
                "missing HWP document signature".to_string(),
            ));
        }

        let version_raw = read_u32_le(data, FILE_HEADER_SIGNATURE_LEN)
            .map_err(|_| FormatError::BadSignature("short version field".to_string()))?;
        let version = (
            (version_raw >> 24) as u8,
            (version_raw >> 16) as u8,
            (version_raw >> 8) as u8,
            version_raw as u8,
        );

        let flags = read_u32_le(data, FILE_HEADER_SIGNATURE_LEN + 4)
            .map_err(|_| FormatError::BadSignature("short properties field".to_string()))?;
        let properties = DocumentProperties::from_bits_truncate(flags);

        if properties.contains(DocumentProperties::ENCRYPTED) {
            return Err(FormatError::Encrypted);
        }
        if properties.contains(DocumentProperties::DRM) {
            return Err(FormatError::Unsupported("DRM-protected document".to_string()));
        }
        if properties.contains(DocumentProperties::DISTRIBUTION) {
            return Err(FormatError::Unsupported(
                "distribution (view-only) document".to_string(),
            ));
        }

        Ok(Self {
            version,
            properties,
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.properties.contains(DocumentProperties::COMPRESSED)
    }

    pub fn version_string(&self) -> String {
        let (a, b, c, d) = self.version;
        format!("{}.{}.{}.{}", a, b, c, d)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a FileHeader stream with the given properties word.
    pub(crate) fn file_header_bytes(flags: u32) -> Vec<u8> {
        let mut data = vec![0u8; 256];
        data[..FILE_HEADER_SIGNATURE.len()].copy_from_slice(FILE_HEADER_SIGNATURE);
        // version 5.0.5.0
        data[32..36].copy_from_slice(&0x0500_0500u32.to_le_bytes());
        data[36..40].copy_from_slice(&flags.to_le_bytes());
        data
    }

    #[test]
    fn test_parse_plain_header() {
        let header = FileHeader::parse(&file_header_bytes(0x01)).unwrap();
        assert_eq!(header.version, (5, 0, 5, 0));
        assert_eq!(header.version_string(), "5.0.5.0");
        assert!(header.is_compressed());
    }

    #[test]
    fn test_bad_signature() {
        let mut data = file_header_bytes(0x01);
        data[0] = b'X';
        assert!(matches!(
            FileHeader::parse(&data),
            Err(FormatError::BadSignature(_))
        ));
        assert!(matches!(
            FileHeader::parse(&[0u8; 8]),
            Err(FormatError::BadSignature(_))
        ));
    }

    #[test]
    fn test_encrypted_rejected() {
        assert!(matches!(
            FileHeader::parse(&file_header_bytes(0x03)),
            Err(FormatError::Encrypted)
        ));
    }

    #[test]
    fn test_drm_rejected() {
        assert!(matches!(
            FileHeader::parse(&file_header_bytes(0x11)),
            Err(FormatError::Unsupported(_))
        ));
    }

    #[test]
    fn test_distribution_rejected() {
        assert!(matches!(
            FileHeader::parse(&file_header_bytes(0x05)),
            Err(FormatError::Unsupported(_))
        ));
    }
}
