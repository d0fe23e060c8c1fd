//! DocInfo-class records → global style tables.

use super::consts::*;
use super::record::Record;
use crate::common::binary::{parse_utf16le_string_len, read_u16_le, read_u32_le};
use crate::document::styles::{
    BinDataItem, BorderFill, CharShape, FaceName, NumberingLevel, NumberingScheme, ParaShape,
    Style, StyleTable,
};
use crate::document::styles::Alignment;

/// Decode the DocInfo record stream into the style arenas.
///
/// Record order defines arena ids: the Nth CHAR_SHAPE record is char shape N,
/// and so on for every arena; blocks reference styles by these indices.
pub fn parse_docinfo(records: &[Record], styles: &mut StyleTable) {
    for record in records {
        match record.tag {
            HWPTAG_FACE_NAME => {
                styles.face_names.push(parse_face_name(&record.data));
            },
            HWPTAG_BORDER_FILL => {
                styles.border_fills.push(parse_border_fill(&record.data));
            },
            HWPTAG_CHAR_SHAPE => {
                styles.char_shapes.push(parse_char_shape(&record.data));
            },
            HWPTAG_PARA_SHAPE => {
                styles.para_shapes.push(parse_para_shape(&record.data));
            },
            HWPTAG_NUMBERING => {
                styles.numberings.push(parse_numbering(&record.data));
            },
            HWPTAG_BULLET => {
                // A bullet is a one-level scheme whose format is the bullet char.
                styles.numberings.push(parse_bullet(&record.data));
            },
            HWPTAG_STYLE => {
                styles.styles.push(parse_style(&record.data));
            },
            HWPTAG_BIN_DATA => {
                if let Some(item) = parse_bin_data(&record.data) {
                    styles.bin_data.push(item);
                }
            },
            HWPTAG_DOCUMENT_PROPERTIES | HWPTAG_ID_MAPPINGS | HWPTAG_TAB_DEF => {
                // recognized, nothing modeled
            },
            other => {
                log::warn!("skipping unrecognized DocInfo record tag {}", other);
            },
        }
    }
}

/// FACE_NAME: properties byte, name length (`u16` code units), UTF-16LE name.
fn parse_face_name(data: &[u8]) -> FaceName {
    let Ok(name_len) = read_u16_le(data, 1) else {
        return FaceName::default();
    };
    FaceName {
        name: parse_utf16le_string_len(data, 3, name_len as usize),
    }
}

/// BORDER_FILL: properties, four borders (6 bytes each), fill kind, face color.
fn parse_border_fill(data: &[u8]) -> BorderFill {
    let fill_kind = read_u32_le(data, 26).unwrap_or(0);
    if fill_kind & 0x1 != 0 {
        if let Ok(color) = read_u32_le(data, 30) {
            return BorderFill { fill_color: color };
        }
    }
    BorderFill::default()
}

/// CHAR_SHAPE: seven face ids, metrics, height at 42, attributes at 46,
/// text color at 60.
fn parse_char_shape(data: &[u8]) -> CharShape {
    let mut shape = CharShape::default();
    if data.len() < 14 {
        return shape;
    }
    for (i, id) in shape.face_ids.iter_mut().enumerate() {
        *id = read_u16_le(data, i * 2).unwrap_or(0);
    }
    if let Ok(height) = read_u32_le(data, 42) {
        shape.height = height;
    }
    if let Ok(attr) = read_u32_le(data, 46) {
        shape.italic = attr & 0x01 != 0;
        shape.bold = attr & 0x02 != 0;
        shape.underline = attr & 0x04 != 0;
    }
    if let Ok(color) = read_u32_le(data, 60) {
        shape.color = color;
    }
    shape
}

/// PARA_SHAPE: attribute word (alignment in bits 2..5, numbering level in
/// bits 23..26), margins, spacing, line spacing, then tab-def / numbering /
/// border-fill references.
fn parse_para_shape(data: &[u8]) -> ParaShape {
    let mut shape = ParaShape::default();
    let Ok(attr) = read_u32_le(data, 0) else {
        return shape;
    };
    shape.align = Alignment::from_raw((attr >> 2) & 0x7);
    shape.numbering_level = ((attr >> 23) & 0x7) as u8;
    shape.left_margin = read_u32_le(data, 4).unwrap_or(0) as i32;
    shape.right_margin = read_u32_le(data, 8).unwrap_or(0) as i32;
    shape.indent = read_u32_le(data, 12).unwrap_or(0) as i32;
    shape.spacing_prev = read_u32_le(data, 16).unwrap_or(0) as i32;
    shape.spacing_next = read_u32_le(data, 20).unwrap_or(0) as i32;
    shape.line_spacing = read_u32_le(data, 24).unwrap_or(160);
    let numbering = read_u16_le(data, 30).unwrap_or(0xFFFF);
    if numbering != 0xFFFF {
        shape.numbering = Some(numbering);
    }
    shape
}

/// NUMBERING: seven levels of (format length, UTF-16LE format, start number).
fn parse_numbering(data: &[u8]) -> NumberingScheme {
    let mut scheme = NumberingScheme::default();
    let mut pos = 0usize;
    for _ in 0..7 {
        let Ok(len) = read_u16_le(data, pos) else {
            break;
        };
        pos += 2;
        let format = parse_utf16le_string_len(data, pos, len as usize);
        pos += len as usize * 2;
        let start = read_u16_le(data, pos).unwrap_or(1);
        pos += 2;
        scheme.levels.push(NumberingLevel { format, start });
    }
    // trailing unused levels carry empty formats
    while scheme.levels.last().is_some_and(|l| l.format.is_empty()) {
        scheme.levels.pop();
    }
    scheme
}

/// BULLET: bullet char as one UTF-16 code unit.
fn parse_bullet(data: &[u8]) -> NumberingScheme {
    let ch = read_u16_le(data, 0)
        .ok()
        .and_then(|u| char::from_u32(u as u32))
        .unwrap_or('•');
    NumberingScheme {
        levels: vec![NumberingLevel {
            format: ch.to_string(),
            start: 1,
        }],
    }
}

/// STYLE: local name, english name, properties, next style, language id,
/// paragraph shape id, character shape id.
fn parse_style(data: &[u8]) -> Style {
    let mut style = Style::default();
    let Ok(name_len) = read_u16_le(data, 0) else {
        return style;
    };
    let mut pos = 2usize;
    style.name = parse_utf16le_string_len(data, pos, name_len as usize);
    pos += name_len as usize * 2;

    let english_len = read_u16_le(data, pos).unwrap_or(0);
    pos += 2;
    style.english_name = parse_utf16le_string_len(data, pos, english_len as usize);
    pos += english_len as usize * 2;

    // properties u8 + next style u8 + language id u16
    style.next_style = data.get(pos + 1).copied().unwrap_or(0) as u16;
    pos += 4;
    style.para_shape = read_u16_le(data, pos).unwrap_or(0);
    style.char_shape = read_u16_le(data, pos + 2).unwrap_or(0);
    style
}

/// BIN_DATA: flags, item id, extension length, UTF-16LE extension.
fn parse_bin_data(data: &[u8]) -> Option<BinDataItem> {
    let id = read_u16_le(data, 2).ok()?;
    let ext_len = read_u16_le(data, 4).ok()?;
    let ext = parse_utf16le_string_len(data, 6, ext_len as usize);
    Some(BinDataItem { id, ext })
}

// ── fixture encoders ────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;

    fn record(tag: u16, data: Vec<u8>) -> Record {
        Record {
            tag,
            level: if tag == HWPTAG_ID_MAPPINGS || tag == HWPTAG_DOCUMENT_PROPERTIES {
                0
            } else {
                1
            },
            data,
        }
    }

    #[test]
    fn test_docinfo_arenas() {
        let records = vec![
            record(HWPTAG_ID_MAPPINGS, vec![]),
            record(HWPTAG_FACE_NAME, fixtures::face_name("함초롬바탕")),
            record(HWPTAG_FACE_NAME, fixtures::face_name("함초롬돋움")),
            record(HWPTAG_BORDER_FILL, fixtures::border_fill(None)),
            record(HWPTAG_BORDER_FILL, fixtures::border_fill(Some(0x00E0E0E0))),
            record(HWPTAG_CHAR_SHAPE, fixtures::char_shape(0, 1000, false)),
            record(HWPTAG_CHAR_SHAPE, fixtures::char_shape(1, 1600, true)),
            record(HWPTAG_PARA_SHAPE, fixtures::para_shape(0, 160, None)),
            record(HWPTAG_PARA_SHAPE, fixtures::para_shape(3, 160, Some(0))),
            record(HWPTAG_NUMBERING, fixtures::numbering(&["^1.", "가."])),
            record(HWPTAG_STYLE, fixtures::style("본문", "Normal", 0, 0)),
            record(HWPTAG_STYLE, fixtures::style("제목 1", "Heading 1", 1, 1)),
            record(HWPTAG_BIN_DATA, fixtures::bin_data(1, "png")),
        ];

        let mut styles = StyleTable::default();
        parse_docinfo(&records, &mut styles);

        assert_eq!(styles.face_names.len(), 2);
        assert_eq!(styles.face_names[0].name, "함초롬바탕");

        assert!(!styles.border_fills[0].is_shaded());
        assert!(styles.border_fills[1].is_shaded());

        assert_eq!(styles.char_shapes[0].height, 1000);
        assert!(!styles.char_shapes[0].bold);
        assert_eq!(styles.char_shapes[1].height, 1600);
        assert!(styles.char_shapes[1].bold);
        assert_eq!(styles.char_shapes[1].face_ids[0], 1);

        assert_eq!(styles.para_shapes[0].align, Alignment::Justify);
        assert_eq!(styles.para_shapes[1].align, Alignment::Center);
        assert_eq!(styles.para_shapes[1].numbering, Some(0));

        assert_eq!(styles.numberings[0].levels[0].format, "^1.");
        assert_eq!(styles.numberings[0].levels[1].format, "가.");

        assert_eq!(styles.styles[0].name, "본문");
        assert_eq!(styles.styles[1].english_name, "Heading 1");
        assert_eq!(styles.styles[1].para_shape, 1);
        assert_eq!(styles.styles[1].char_shape, 1);

        assert_eq!(styles.bin_data[0].member_name(), "BinData/BIN0001.png");
    }

    #[test]
    fn test_unknown_tag_skipped() {
        let records = vec![
            record(999, vec![1, 2, 3]),
            record(HWPTAG_FACE_NAME, fixtures::face_name("바탕")),
        ];
        let mut styles = StyleTable::default();
        parse_docinfo(&records, &mut styles);
        assert_eq!(styles.face_names.len(), 1);
    }
}
