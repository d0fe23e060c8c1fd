//! Tagged record streams.
//!
//! Every DocInfo/BodyText stream is a flat sequence of records. A record
//! header is one little-endian `u32` packing a 10-bit tag id, a 10-bit
//! nesting level and a 12-bit size; the maximum encodable size (0xFFF) means
//! a 4-byte extended size field follows. The level field encodes parent/child
//! nesting, so the tree is rebuilt from the flat stream with an explicit
//! stack of open records, never recursion, which keeps stack depth bounded
//! regardless of input.

use super::consts::RECORD_SIZE_EXTENDED;
use crate::common::binary::read_u32_le;
use crate::common::error::FormatError;
use std::io::Read;

/// A flat record: tag, nesting level, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub tag: u16,
    pub level: u16,
    pub data: Vec<u8>,
}

/// A record with its children attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordNode {
    pub tag: u16,
    pub data: Vec<u8>,
    pub children: Vec<RecordNode>,
}

impl RecordNode {
    /// First direct child with the given tag.
    pub fn child(&self, tag: u16) -> Option<&RecordNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// All direct children with the given tag.
    pub fn children_tagged(&self, tag: u16) -> impl Iterator<Item = &RecordNode> {
        self.children.iter().filter(move |c| c.tag == tag)
    }
}

/// Inflate a raw-deflate compressed stream.
///
/// HWP record streams carry no zlib header or trailer.
pub fn inflate_stream(stream: &str, raw: &[u8]) -> Result<Vec<u8>, FormatError> {
    let mut decoder = flate2::read::DeflateDecoder::new(raw);
    let mut out = Vec::with_capacity(raw.len() * 4);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| FormatError::CorruptStream {
            stream: stream.to_string(),
            reason: format!("inflate failed: {}", e),
        })?;
    Ok(out)
}

/// Parse the flat record sequence of a stream.
///
/// A record whose declared size would overrun the stream is a fatal
/// [`FormatError::TruncatedRecord`]; unknown tags are the consumer's concern.
pub fn parse_records(stream: &str, data: &[u8]) -> Result<Vec<Record>, FormatError> {
    let mut records = Vec::new();
    let mut pos = 0usize;

    while pos + 4 <= data.len() {
        let header = read_u32_le(data, pos).unwrap_or(0);
        let tag = (header & 0x3FF) as u16;
        let level = ((header >> 10) & 0x3FF) as u16;
        let mut size = header >> 20;
        pos += 4;

        if size == RECORD_SIZE_EXTENDED {
            if pos + 4 > data.len() {
                return Err(FormatError::TruncatedRecord {
                    stream: stream.to_string(),
                    tag,
                    offset: pos,
                });
            }
            size = read_u32_le(data, pos).unwrap_or(0);
            pos += 4;
        }

        let size = size as usize;
        if pos + size > data.len() {
            return Err(FormatError::TruncatedRecord {
                stream: stream.to_string(),
                tag,
                offset: pos,
            });
        }

        records.push(Record {
            tag,
            level,
            data: data[pos..pos + size].to_vec(),
        });
        pos += size;
    }

    Ok(records)
}

/// Rebuild the record tree from the flat sequence.
///
/// Maintains a stack of open records; a record at level L closes every open
/// record at level >= L and becomes a child of the record below it (or a
/// root when the stack empties).
pub fn build_tree(records: Vec<Record>) -> Vec<RecordNode> {
    let mut roots: Vec<RecordNode> = Vec::new();
    let mut stack: Vec<(u16, RecordNode)> = Vec::new();

    fn close(node: RecordNode, stack: &mut Vec<(u16, RecordNode)>, roots: &mut Vec<RecordNode>) {
        match stack.last_mut() {
            Some((_, parent)) => parent.children.push(node),
            None => roots.push(node),
        }
    }

    for record in records {
        while stack.last().is_some_and(|(open_level, _)| *open_level >= record.level) {
            if let Some((_, done)) = stack.pop() {
                close(done, &mut stack, &mut roots);
            }
        }
        stack.push((
            record.level,
            RecordNode {
                tag: record.tag,
                data: record.data,
                children: Vec::new(),
            },
        ));
    }

    while let Some((_, done)) = stack.pop() {
        close(done, &mut stack, &mut roots);
    }

    roots
}

/// Encode one record header (with payload), the inverse of
/// [`parse_records`]. Used to build test fixtures.
#[cfg(test)]
pub(crate) fn encode_record(tag: u16, level: u16, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + data.len());
    if data.len() >= RECORD_SIZE_EXTENDED as usize {
        let header = (tag as u32) | ((level as u32) << 10) | (RECORD_SIZE_EXTENDED << 20);
        out.extend_from_slice(&header.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    } else {
        let header = (tag as u32) | ((level as u32) << 10) | ((data.len() as u32) << 20);
        out.extend_from_slice(&header.to_le_bytes());
    }
    out.extend_from_slice(data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_records() {
        let mut stream = encode_record(66, 0, b"abc");
        stream.extend(encode_record(67, 1, b""));
        let records = parse_records("test", &stream).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tag, 66);
        assert_eq!(records[0].level, 0);
        assert_eq!(records[0].data, b"abc");
        assert_eq!(records[1].tag, 67);
        assert_eq!(records[1].level, 1);
        assert!(records[1].data.is_empty());
    }

    #[test]
    fn test_extended_size() {
        let big = vec![0xABu8; 5000];
        let stream = encode_record(67, 0, &big);
        assert_eq!(stream.len(), 8 + 5000);
        let records = parse_records("test", &stream).unwrap();
        assert_eq!(records[0].data.len(), 5000);
    }

    #[test]
    fn test_truncated_record_is_fatal() {
        let mut stream = encode_record(66, 0, b"abcdef");
        stream.truncate(stream.len() - 2);
        assert!(matches!(
            parse_records("test", &stream),
            Err(FormatError::TruncatedRecord { tag: 66, .. })
        ));
    }

    #[test]
    fn test_build_tree_nesting() {
        let records = vec![
            Record { tag: 66, level: 0, data: vec![] },
            Record { tag: 67, level: 1, data: vec![] },
            Record { tag: 71, level: 1, data: vec![] },
            Record { tag: 75, level: 2, data: vec![] },
            Record { tag: 66, level: 0, data: vec![] },
        ];
        let tree = build_tree(records);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].children.len(), 2);
        assert_eq!(tree[0].children[0].tag, 67);
        assert_eq!(tree[0].children[1].tag, 71);
        assert_eq!(tree[0].children[1].children.len(), 1);
        assert_eq!(tree[0].children[1].children[0].tag, 75);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn test_build_tree_level_drop() {
        // level sequence 0, 2, 1: the level-1 record closes the level-2 one
        let records = vec![
            Record { tag: 1, level: 0, data: vec![] },
            Record { tag: 2, level: 2, data: vec![] },
            Record { tag: 3, level: 1, data: vec![] },
        ];
        let tree = build_tree(records);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 2);
        assert_eq!(tree[0].children[0].tag, 2);
        assert_eq!(tree[0].children[1].tag, 3);
    }

    #[test]
    fn test_inflate_round_trip() {
        use std::io::Write;
        let original = b"record stream payload, compressible aaaaaaaaaaaaaaaaaa";
        let mut encoder =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(inflate_stream("test", &compressed).unwrap(), original);
    }

    #[test]
    fn test_inflate_garbage_fails() {
        assert!(matches!(
            inflate_stream("DocInfo", &[0x00, 0x01, 0x02, 0xFF]),
            Err(FormatError::CorruptStream { .. })
        ));
    }
}
