//! Binary data parsing utilities shared across formats.
//!
//! Common functions for reading little-endian scalars and UTF-16LE strings
//! from the record streams of the binary HWP format.

use zerocopy::{FromBytes, LE, U16, U32};

/// Binary parsing error type
#[derive(Debug, Clone)]
pub enum BinaryError {
    /// Not enough data to read the requested type
    InsufficientData { expected: usize, available: usize },
}

impl std::fmt::Display for BinaryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryError::InsufficientData {
                expected,
                available,
            } => {
                write!(
                    f,
                    "Insufficient data: expected {}, got {}",
                    expected, available
                )
            },
        }
    }
}

impl std::error::Error for BinaryError {}

/// Result type for binary operations
pub type BinaryResult<T> = Result<T, BinaryError>;

/// Read a little-endian u16 from a byte slice at the given offset.
#[inline]
pub fn read_u16_le(data: &[u8], offset: usize) -> BinaryResult<u16> {
    if offset + 2 > data.len() {
        return Err(BinaryError::InsufficientData {
            expected: offset + 2,
            available: data.len(),
        });
    }
    Ok(U16::<LE>::read_from_bytes(&data[offset..offset + 2])
        .map(|v| v.get())
        .unwrap_or(0))
}

/// Read a little-endian u32 from a byte slice at the given offset.
#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> BinaryResult<u32> {
    if offset + 4 > data.len() {
        return Err(BinaryError::InsufficientData {
            expected: offset + 4,
            available: data.len(),
        });
    }
    Ok(U32::<LE>::read_from_bytes(&data[offset..offset + 4])
        .map(|v| v.get())
        .unwrap_or(0))
}

/// Parse a UTF-16LE string from binary data, stopping at a null terminator.
pub fn parse_utf16le_string(data: &[u8]) -> String {
    let estimated_chars = data.len() / 2;
    let mut result = String::with_capacity(estimated_chars);

    let mut i = 0;
    while i + 1 < data.len() {
        let code_unit = U16::<LE>::read_from_bytes(&data[i..i + 2])
            .map(|v| v.get())
            .unwrap_or(0);
        i += 2;

        if code_unit == 0 {
            break;
        }

        if let Some(ch) = char::from_u32(code_unit as u32) {
            result.push(ch);
        }
    }

    result
}

/// Parse a UTF-16LE string with specified length (in code units, not bytes).
pub fn parse_utf16le_string_len(data: &[u8], offset: usize, char_count: usize) -> String {
    let byte_count = char_count * 2;
    if offset + byte_count > data.len() {
        return String::new();
    }

    let mut result = String::with_capacity(char_count);
    let mut pos = offset;
    let end = offset + byte_count;

    while pos + 1 < end {
        let code_unit = U16::<LE>::read_from_bytes(&data[pos..pos + 2])
            .map(|v| v.get())
            .unwrap_or(0);
        pos += 2;

        if let Some(ch) = char::from_u32(code_unit as u32) {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u16_le() {
        let data = [0x34, 0x12, 0x78, 0x56];
        assert!(read_u16_le(&data, 0).is_ok_and(|v| v == 0x1234));
        assert!(read_u16_le(&data, 2).is_ok_and(|v| v == 0x5678));
        assert!(read_u16_le(&data, 3).is_err());
    }

    #[test]
    fn test_read_u32_le() {
        let data = [0x78, 0x56, 0x34, 0x12];
        assert!(read_u32_le(&data, 0).is_ok_and(|v| v == 0x12345678));
        assert!(read_u32_le(&data, 1).is_err());
    }

    #[test]
    fn test_parse_utf16le() {
        let data = vec![
            0x48, 0x00, // 'H'
            0x65, 0x00, // 'e'
            0x6C, 0x00, // 'l'
            0x6C, 0x00, // 'l'
            0x6F, 0x00, // 'o'
            0x00, 0x00, // null terminator
        ];
        assert_eq!(parse_utf16le_string(&data), "Hello");
    }

    #[test]
    fn test_parse_utf16le_len() {
        let data = vec![0x48, 0x00, 0x65, 0x00, 0x6C, 0x00, 0x6C, 0x00, 0x6F, 0x00];
        assert_eq!(parse_utf16le_string_len(&data, 0, 5), "Hello");
        assert_eq!(parse_utf16le_string_len(&data, 0, 3), "Hel");
        assert_eq!(parse_utf16le_string_len(&data, 0, 6), "");
    }

    #[test]
    fn test_parse_utf16le_hangul() {
        // "바탕" (a common face name)
        let data = vec![0x14, 0xBC, 0xD5, 0xD0, 0x00, 0x00];
        assert_eq!(parse_utf16le_string(&data), "바탕");
    }
}
