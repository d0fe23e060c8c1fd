//! BodyText-class records → Sections and Blocks.

use super::consts::*;
use super::record::RecordNode;
use crate::common::binary::{read_u16_le, read_u32_le};
use crate::document::styles::StyleTable;
use crate::document::table::{Cell, Table};
use crate::document::{
    Block, ControlMarker, Image, PageGeometry, Paragraph, Run, RunContent, Section,
};
use smallvec::SmallVec;

/// Decode one `BodyText/Section{N}` record tree into a Section.
pub fn parse_section(nodes: &[RecordNode], styles: &StyleTable) -> Section {
    let mut section = Section::default();

    for node in nodes {
        match node.tag {
            HWPTAG_SEC_DEF => {
                section.page = parse_page_geometry(&node.data);
            },
            HWPTAG_PARA_HEADER => {
                section.blocks.extend(parse_para(node, styles));
            },
            HWPTAG_COLUMN_DEF => {},
            other => {
                log::warn!("skipping unrecognized BodyText record tag {}", other);
            },
        }
    }

    section
}

/// SEC_DEF payload: paper width/height, margins (left, right, top, bottom),
/// header, footer and gutter, all `u32` HWPUNIT, then a properties word
/// whose low bit is the landscape flag.
fn parse_page_geometry(data: &[u8]) -> PageGeometry {
    let mut page = PageGeometry::default();
    if data.len() < 36 {
        return page;
    }
    page.width = read_u32_le(data, 0).unwrap_or(page.width);
    page.height = read_u32_le(data, 4).unwrap_or(page.height);
    page.margin_left = read_u32_le(data, 8).unwrap_or(page.margin_left);
    page.margin_right = read_u32_le(data, 12).unwrap_or(page.margin_right);
    page.margin_top = read_u32_le(data, 16).unwrap_or(page.margin_top);
    page.margin_bottom = read_u32_le(data, 20).unwrap_or(page.margin_bottom);
    page.margin_header = read_u32_le(data, 24).unwrap_or(page.margin_header);
    page.margin_footer = read_u32_le(data, 28).unwrap_or(page.margin_footer);
    page.margin_gutter = read_u32_le(data, 32).unwrap_or(page.margin_gutter);
    if let Ok(props) = read_u32_le(data, 36) {
        page.landscape = props & 0x01 != 0;
    }
    page
}

/// Decode a PARA_HEADER subtree into blocks.
///
/// A paragraph that only anchors controls (tables, pictures) contributes the
/// control blocks alone; a paragraph with text contributes itself first.
fn parse_para(node: &RecordNode, styles: &StyleTable) -> Vec<Block> {
    let para_shape = read_u16_le(&node.data, 8).unwrap_or(0) as u32;
    let style = node.data.get(10).copied().unwrap_or(0) as u16;

    let shape_runs = node
        .child(HWPTAG_PARA_CHAR_SHAPE)
        .map(|n| parse_char_shape_runs(&n.data))
        .unwrap_or_default();

    let mut paragraph = Paragraph::new(style, para_shape);
    if let Some(text_node) = node.child(HWPTAG_PARA_TEXT) {
        paragraph.runs = decode_para_text(&text_node.data, &shape_runs);
    }

    let mut controls = Vec::new();
    for ctrl in node.children_tagged(HWPTAG_CTRL_HEADER) {
        let ctrl_id = read_u32_le(&ctrl.data, 0).unwrap_or(0);
        match ctrl_id {
            CTRL_ID_TABLE => {
                if let Some(table) = parse_table(ctrl, styles) {
                    controls.push(Block::Table(table));
                }
            },
            CTRL_ID_SHAPE_OBJECT => {
                if let Some(image) = parse_picture(ctrl, styles) {
                    controls.push(Block::Image(image));
                }
            },
            CTRL_ID_SECTION | CTRL_ID_COLUMN => {},
            other => {
                log::warn!("skipping unrecognized control id {:08X}", other);
            },
        }
    }

    let mut blocks = Vec::new();
    if !paragraph.runs.is_empty() || controls.is_empty() {
        blocks.push(Block::Paragraph(paragraph));
    }
    blocks.extend(controls);
    blocks
}

/// PARA_CHAR_SHAPE payload: (position, char shape id) `u32` pairs.
fn parse_char_shape_runs(data: &[u8]) -> Vec<(u32, u32)> {
    let mut runs = Vec::with_capacity(data.len() / 8);
    let mut pos = 0;
    while pos + 8 <= data.len() {
        let at = read_u32_le(data, pos).unwrap_or(0);
        let id = read_u32_le(data, pos + 4).unwrap_or(0);
        runs.push((at, id));
        pos += 8;
    }
    runs
}

fn shape_at(shape_runs: &[(u32, u32)], unit: u32) -> u32 {
    let mut current = 0;
    for &(at, id) in shape_runs {
        if at > unit {
            break;
        }
        current = id;
    }
    current
}

/// Decode UTF-16LE paragraph text into runs, turning reserved control code
/// units into typed markers so later substitution cannot corrupt them.
///
/// Character shape positions count every code unit, including inline-control
/// payloads, exactly as the PARA_CHAR_SHAPE record does.
fn decode_para_text(data: &[u8], shape_runs: &[(u32, u32)]) -> SmallVec<[Run; 4]> {
    let mut runs: SmallVec<[Run; 4]> = SmallVec::new();
    let mut text = String::new();
    let mut text_shape = 0u32;
    let mut unit_idx = 0u32;
    let mut pos = 0usize;

    macro_rules! flush {
        () => {
            if !text.is_empty() {
                runs.push(Run::text(text_shape, std::mem::take(&mut text)));
            }
        };
    }

    while pos + 1 < data.len() {
        let shape = shape_at(shape_runs, unit_idx);
        let unit = u16::from_le_bytes([data[pos], data[pos + 1]]);
        pos += 2;
        unit_idx += 1;

        if !text.is_empty() && shape != text_shape {
            runs.push(Run::text(text_shape, std::mem::take(&mut text)));
        }
        if text.is_empty() {
            text_shape = shape;
        }

        match unit {
            0x0001..=0x0008 => {
                flush!();
                match unit {
                    CHAR_FIELD_START => runs.push(Run::marker(shape, ControlMarker::FieldStart)),
                    CHAR_FIELD_END => runs.push(Run::marker(shape, ControlMarker::FieldEnd)),
                    _ => {},
                }
                // consume the inline-control payload
                pos += INLINE_CTRL_EXTRA_UNITS * 2;
                unit_idx += INLINE_CTRL_EXTRA_UNITS as u32;
            },
            CHAR_TAB => {
                flush!();
                runs.push(Run::marker(shape, ControlMarker::Tab));
            },
            CHAR_LINE_BREAK => {
                flush!();
                runs.push(Run::marker(shape, ControlMarker::LineBreak));
            },
            CHAR_NB_SPACE => {
                flush!();
                runs.push(Run::marker(shape, ControlMarker::NonBreakingSpace));
            },
            CHAR_FW_SPACE => {
                flush!();
                runs.push(Run::marker(shape, ControlMarker::FixedWidthSpace));
            },
            CHAR_PARA_BREAK => {},
            0x0000..=0x001F => {},
            0xD800..=0xDBFF => {
                // surrogate pair
                if pos + 1 < data.len() {
                    let low = u16::from_le_bytes([data[pos], data[pos + 1]]);
                    if (0xDC00..=0xDFFF).contains(&low) {
                        pos += 2;
                        unit_idx += 1;
                        let c = 0x10000 + (((unit as u32) - 0xD800) << 10) + ((low as u32) - 0xDC00);
                        if let Some(ch) = char::from_u32(c) {
                            text.push(ch);
                        }
                    }
                }
            },
            _ => {
                if let Some(ch) = char::from_u32(unit as u32) {
                    text.push(ch);
                }
            },
        }
    }
    flush!();
    runs
}

/// TABLE payload: properties word, row count, column count, border fill.
fn parse_table(ctrl: &RecordNode, styles: &StyleTable) -> Option<Table> {
    let table_node = ctrl.child(HWPTAG_TABLE)?;
    let rows = read_u16_le(&table_node.data, 4).ok()?;
    let cols = read_u16_le(&table_node.data, 6).ok()?;
    if rows == 0 || cols == 0 {
        return None;
    }
    let mut table = Table::new(rows, cols);
    table.border_fill = read_u16_le(&table_node.data, 8).unwrap_or(0) as u32;

    for list in ctrl.children_tagged(HWPTAG_LIST_HEADER) {
        let Some(def) = list.child(HWPTAG_CELL_DEF) else {
            continue;
        };
        let col = read_u16_le(&def.data, 0).unwrap_or(0);
        let row = read_u16_le(&def.data, 2).unwrap_or(0);
        let mut cell = Cell::new(row, col);
        cell.col_span = read_u16_le(&def.data, 4).unwrap_or(1).max(1);
        cell.row_span = read_u16_le(&def.data, 6).unwrap_or(1).max(1);
        cell.width = read_u32_le(&def.data, 8).unwrap_or(0);
        cell.height = read_u32_le(&def.data, 12).unwrap_or(0);
        cell.border_fill = read_u16_le(&def.data, 16).unwrap_or(0) as u32;

        for para in list.children_tagged(HWPTAG_PARA_HEADER) {
            cell.blocks.extend(parse_para(para, styles));
        }
        table.cells.push(cell);
    }

    if let Err(reason) = table.check_grid() {
        log::warn!("table grid inconsistency: {}", reason);
    }
    Some(table)
}

/// Picture shape component: display extent and the BinData item reference.
fn parse_picture(ctrl: &RecordNode, styles: &StyleTable) -> Option<Image> {
    let pic = ctrl.child(HWPTAG_SHAPE_COMPONENT_PICTURE)?;
    let width = read_u32_le(&pic.data, 0).unwrap_or(0);
    let height = read_u32_le(&pic.data, 4).unwrap_or(0);
    let bin_id = read_u16_le(&pic.data, 8).unwrap_or(0);

    let bin_item = styles
        .bin_data
        .iter()
        .find(|b| b.id == bin_id)
        .map(|b| b.member_name())
        .unwrap_or_else(|| {
            log::warn!("picture references unknown BinData item {}", bin_id);
            format!("BinData/BIN{:04X}.dat", bin_id)
        });

    let caption = ctrl.child(HWPTAG_LIST_HEADER).map(|list| {
        let mut text = String::new();
        for para in list.children_tagged(HWPTAG_PARA_HEADER) {
            for block in parse_para(para, styles) {
                if let Block::Paragraph(p) = block {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&p.text());
                }
            }
        }
        text
    });

    Some(Image {
        bin_item,
        width,
        height,
        caption: caption.filter(|c| !c.is_empty()),
    })
}

// ── fixture encoders ────────────────────────────────────────────

/// Record-stream builders for BodyText fixtures, shared by the decoder tests
/// and the container-level reader tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::super::record::encode_record;
    use crate::hwp::consts::*;

    pub(crate) fn utf16_bytes(text: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for u in text.encode_utf16() {
            out.extend_from_slice(&u.to_le_bytes());
        }
        out
    }

    pub(crate) fn sec_def(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::new();
        for v in [width, height, 8504, 8504, 5668, 4252, 4252, 4252, 0, 0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        encode_record(HWPTAG_SEC_DEF, 0, &data)
    }

    pub(crate) fn para_header_payload(style: u8, para_shape: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes()); // nchars
        data.extend_from_slice(&0u32.to_le_bytes()); // control mask
        data.extend_from_slice(&para_shape.to_le_bytes());
        data.push(style);
        data.push(0);
        data
    }

    /// A plain paragraph: PARA_HEADER + PARA_TEXT + PARA_CHAR_SHAPE.
    pub(crate) fn para(
        level: u16,
        text: &str,
        style: u8,
        para_shape: u16,
        char_shape: u32,
    ) -> Vec<u8> {
        let mut out = encode_record(
            HWPTAG_PARA_HEADER,
            level,
            &para_header_payload(style, para_shape),
        );
        out.extend(encode_record(HWPTAG_PARA_TEXT, level + 1, &utf16_bytes(text)));
        let mut shapes = Vec::new();
        shapes.extend_from_slice(&0u32.to_le_bytes());
        shapes.extend_from_slice(&char_shape.to_le_bytes());
        out.extend(encode_record(HWPTAG_PARA_CHAR_SHAPE, level + 1, &shapes));
        out
    }

    pub(crate) fn table_payload(rows: u16, cols: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&rows.to_le_bytes());
        data.extend_from_slice(&cols.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes()); // border fill
        data
    }

    pub(crate) fn cell_def_payload(row: u16, col: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&col.to_le_bytes());
        data.extend_from_slice(&row.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes()); // col span
        data.extend_from_slice(&1u16.to_le_bytes()); // row span
        data.extend_from_slice(&7200u32.to_le_bytes());
        data.extend_from_slice(&1000u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes()); // border fill
        data
    }

    /// An anchor paragraph holding a rows x cols table with the given cell
    /// texts (row-major).
    pub(crate) fn table(rows: u16, cols: u16, cells: &[&str]) -> Vec<u8> {
        let mut out = encode_record(HWPTAG_PARA_HEADER, 0, &para_header_payload(0, 0));
        let mut ctrl = CTRL_ID_TABLE.to_le_bytes().to_vec();
        ctrl.extend_from_slice(&[0u8; 4]);
        out.extend(encode_record(HWPTAG_CTRL_HEADER, 1, &ctrl));
        out.extend(encode_record(HWPTAG_TABLE, 2, &table_payload(rows, cols)));
        for r in 0..rows {
            for c in 0..cols {
                out.extend(encode_record(HWPTAG_LIST_HEADER, 2, &[]));
                out.extend(encode_record(HWPTAG_CELL_DEF, 3, &cell_def_payload(r, c)));
                let text = cells.get((r * cols + c) as usize).copied().unwrap_or("");
                out.extend(para(3, text, 0, 0, 0));
            }
        }
        out
    }

    /// An anchor paragraph holding a picture control.
    pub(crate) fn picture(width: u32, height: u32, bin_id: u16) -> Vec<u8> {
        let mut out = encode_record(HWPTAG_PARA_HEADER, 0, &para_header_payload(0, 0));
        let mut ctrl = CTRL_ID_SHAPE_OBJECT.to_le_bytes().to_vec();
        ctrl.extend_from_slice(&[0u8; 4]);
        out.extend(encode_record(HWPTAG_CTRL_HEADER, 1, &ctrl));
        let mut pic = Vec::new();
        pic.extend_from_slice(&width.to_le_bytes());
        pic.extend_from_slice(&height.to_le_bytes());
        pic.extend_from_slice(&bin_id.to_le_bytes());
        out.extend(encode_record(HWPTAG_SHAPE_COMPONENT_PICTURE, 2, &pic));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::record::{build_tree, parse_records};
    use super::*;

    fn parse_stream(bytes: &[u8]) -> Section {
        let records = parse_records("BodyText/Section0", bytes).unwrap();
        let tree = build_tree(records);
        parse_section(&tree, &StyleTable::default())
    }

    #[test]
    fn test_sec_def_page_geometry() {
        let section = parse_stream(&fixtures::sec_def(59528, 84188));
        assert_eq!(section.page.width, 59528);
        assert_eq!(section.page.height, 84188);
        assert_eq!(section.page.margin_left, 8504);
        assert!(!section.page.landscape);
    }

    #[test]
    fn test_plain_paragraphs() {
        let mut stream = fixtures::sec_def(59528, 84188);
        stream.extend(fixtures::para(0, "첫 문단", 1, 2, 3));
        stream.extend(fixtures::para(0, "둘째 문단", 0, 0, 0));
        let section = parse_stream(&stream);

        assert_eq!(section.blocks.len(), 2);
        let Block::Paragraph(p) = &section.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.text(), "첫 문단");
        assert_eq!(p.style, 1);
        assert_eq!(p.para_shape, 2);
        assert_eq!(p.runs[0].char_shape, 3);
    }

    #[test]
    fn test_control_markers_decoded() {
        // "a<tab>b<line break>c" with a field pair around c
        let mut text = fixtures::utf16_bytes("a");
        text.extend_from_slice(&CHAR_TAB.to_le_bytes());
        text.extend(fixtures::utf16_bytes("b"));
        text.extend_from_slice(&CHAR_LINE_BREAK.to_le_bytes());
        text.extend_from_slice(&CHAR_FIELD_START.to_le_bytes());
        text.extend_from_slice(&[0u8; INLINE_CTRL_EXTRA_UNITS * 2]);
        text.extend(fixtures::utf16_bytes("c"));
        text.extend_from_slice(&CHAR_FIELD_END.to_le_bytes());
        text.extend_from_slice(&[0u8; INLINE_CTRL_EXTRA_UNITS * 2]);

        let runs = decode_para_text(&text, &[]);
        let contents: Vec<&RunContent> = runs.iter().map(|r| &r.content).collect();
        assert_eq!(
            contents,
            vec![
                &RunContent::Text("a".to_string()),
                &RunContent::Marker(ControlMarker::Tab),
                &RunContent::Text("b".to_string()),
                &RunContent::Marker(ControlMarker::LineBreak),
                &RunContent::Marker(ControlMarker::FieldStart),
                &RunContent::Text("c".to_string()),
                &RunContent::Marker(ControlMarker::FieldEnd),
            ]
        );
    }

    #[test]
    fn test_char_shape_segmentation() {
        let text = fixtures::utf16_bytes("abcd");
        // shape 5 from unit 0, shape 9 from unit 2
        let runs = decode_para_text(&text, &[(0, 5), (2, 9)]);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], Run::text(5, "ab"));
        assert_eq!(runs[1], Run::text(9, "cd"));
    }

    #[test]
    fn test_table_parsing() {
        let stream = fixtures::table(2, 3, &["품목", "금액", "비율", "장비", "1000", "50%"]);
        let section = parse_stream(&stream);

        assert_eq!(section.blocks.len(), 1);
        let Block::Table(table) = &section.blocks[0] else {
            panic!("expected table");
        };
        assert_eq!((table.rows, table.cols), (2, 3));
        assert_eq!(table.cells.len(), 6);
        assert!(table.check_grid().is_ok());
        assert_eq!(table.cell_at(0, 0).unwrap().text(), "품목");
        assert_eq!(table.cell_at(1, 1).unwrap().text(), "1000");
    }

    #[test]
    fn test_picture_parsing() {
        use crate::document::styles::BinDataItem;
        let mut styles = StyleTable::default();
        styles.bin_data.push(BinDataItem {
            id: 1,
            ext: "png".to_string(),
        });

        let stream = fixtures::picture(14400, 7200, 1);
        let records = parse_records("BodyText/Section0", &stream).unwrap();
        let section = parse_section(&build_tree(records), &styles);

        assert_eq!(section.blocks.len(), 1);
        let Block::Image(image) = &section.blocks[0] else {
            panic!("expected image");
        };
        assert_eq!(image.bin_item, "BinData/BIN0001.png");
        assert_eq!((image.width, image.height), (14400, 7200));
        assert!(image.caption.is_none());
    }

    #[test]
    fn test_surrogate_pair_text() {
        let mut data = Vec::new();
        for u in "𝐀".encode_utf16() {
            data.extend_from_slice(&u.to_le_bytes());
        }
        let runs = decode_para_text(&data, &[]);
        assert_eq!(runs[0], Run::text(0, "𝐀"));
    }
}
