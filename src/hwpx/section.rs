//! `Contents/section{N}.xml`: section content.
//!
//! Block-level elements are `hp:p`, `hp:tbl` and `hp:pic`; the section's
//! page geometry rides in a leading `hp:secPr` element. Style references
//! stay attribute-encoded (`styleIDRef`, `paraPrIDRef`, `charPrIDRef`,
//! `borderFillIDRef`) and are preserved exactly.

use super::attr;
use crate::common::error::FormatError;
use crate::common::xml::escape_xml;
use crate::document::table::{Cell, Table};
use crate::document::{
    Block, ControlMarker, Image, PageGeometry, Paragraph, Run, RunContent, Section,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fmt::Write as FmtWrite;

type XmlReader<'a> = Reader<&'a [u8]>;

fn xml_err(e: impl std::fmt::Display) -> FormatError {
    FormatError::Xml(e.to_string())
}

/// Parse one section part.
pub fn parse_section(xml: &[u8]) -> Result<Section, FormatError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::with_capacity(1024);
    let mut section = Section::default();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sec" => {},
                b"secPr" => {
                    let owned = e.to_owned();
                    section.page = parse_page(&mut reader, &owned)?;
                },
                b"p" => {
                    let owned = e.to_owned();
                    section.blocks.push(Block::Paragraph(parse_paragraph(
                        &mut reader,
                        &owned,
                    )?));
                },
                b"tbl" => {
                    let owned = e.to_owned();
                    section.blocks.push(Block::Table(parse_table(&mut reader, &owned)?));
                },
                b"pic" => {
                    let owned = e.to_owned();
                    section.blocks.push(Block::Image(parse_pic(&mut reader, &owned)?));
                },
                other => {
                    log::warn!(
                        "skipping unrecognized section element <{}>",
                        String::from_utf8_lossy(other)
                    );
                    skip_element(&mut reader, &e.to_owned())?;
                },
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"p" => {
                    section
                        .blocks
                        .push(Block::Paragraph(paragraph_from_attrs(&e)));
                },
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }

    Ok(section)
}

/// Consume events until the end tag matching `start`.
fn skip_element(reader: &mut XmlReader, start: &BytesStart) -> Result<(), FormatError> {
    let mut buf = Vec::new();
    let mut depth = 1usize;
    let name = start.name().as_ref().to_vec();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(ref e) if e.name().as_ref() == name => depth += 1,
            Event::End(ref e) if e.name().as_ref() == name => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            },
            Event::Eof => {
                return Err(FormatError::Xml(format!(
                    "unexpected EOF inside <{}>",
                    String::from_utf8_lossy(&name)
                )));
            },
            _ => {},
        }
        buf.clear();
    }
}

fn parse_page(reader: &mut XmlReader, _start: &BytesStart) -> Result<PageGeometry, FormatError> {
    let mut page = PageGeometry::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"pagePr" => {
                    if let Some(v) = attr(e, "width").and_then(|v| v.parse().ok()) {
                        page.width = v;
                    }
                    if let Some(v) = attr(e, "height").and_then(|v| v.parse().ok()) {
                        page.height = v;
                    }
                    if let Some(v) = attr(e, "landscape") {
                        page.landscape = v == "1" || v == "true";
                    }
                },
                b"margin" => {
                    let num = |name| attr(e, name).and_then(|v: String| v.parse::<u32>().ok());
                    if let Some(v) = num("left") {
                        page.margin_left = v;
                    }
                    if let Some(v) = num("right") {
                        page.margin_right = v;
                    }
                    if let Some(v) = num("top") {
                        page.margin_top = v;
                    }
                    if let Some(v) = num("bottom") {
                        page.margin_bottom = v;
                    }
                    if let Some(v) = num("header") {
                        page.margin_header = v;
                    }
                    if let Some(v) = num("footer") {
                        page.margin_footer = v;
                    }
                    if let Some(v) = num("gutter") {
                        page.margin_gutter = v;
                    }
                },
                _ => {},
            },
            Event::End(ref e) if e.local_name().as_ref() == b"secPr" => break,
            Event::Eof => {
                return Err(FormatError::Xml("unexpected EOF inside <secPr>".to_string()));
            },
            _ => {},
        }
        buf.clear();
    }
    Ok(page)
}

fn paragraph_from_attrs(e: &BytesStart) -> Paragraph {
    Paragraph::new(
        attr(e, "styleIDRef").and_then(|v| v.parse().ok()).unwrap_or(0),
        attr(e, "paraPrIDRef").and_then(|v| v.parse().ok()).unwrap_or(0),
    )
}

fn parse_paragraph(reader: &mut XmlReader, start: &BytesStart) -> Result<Paragraph, FormatError> {
    let mut paragraph = paragraph_from_attrs(start);
    let mut buf = Vec::new();
    let mut char_shape = 0u32;
    let mut in_text = false;
    let mut text_buf = String::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                match e.local_name().as_ref() {
                    b"run" => {
                        char_shape = attr(e, "charPrIDRef")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0);
                    },
                    b"t" => {
                        in_text = true;
                        text_buf.clear();
                    },
                    b"tab" => paragraph
                        .runs
                        .push(Run::marker(char_shape, ControlMarker::Tab)),
                    b"lineBreak" => paragraph
                        .runs
                        .push(Run::marker(char_shape, ControlMarker::LineBreak)),
                    b"fieldBegin" => paragraph
                        .runs
                        .push(Run::marker(char_shape, ControlMarker::FieldStart)),
                    b"fieldEnd" => paragraph
                        .runs
                        .push(Run::marker(char_shape, ControlMarker::FieldEnd)),
                    b"nbSpace" => paragraph
                        .runs
                        .push(Run::marker(char_shape, ControlMarker::NonBreakingSpace)),
                    b"fwSpace" => paragraph
                        .runs
                        .push(Run::marker(char_shape, ControlMarker::FixedWidthSpace)),
                    _ => {},
                }
            },
            Event::Text(ref t) => {
                if in_text {
                    text_buf.push_str(&t.decode().map_err(xml_err)?);
                }
            },
            Event::GeneralRef(ref r) => {
                if in_text {
                    let entity = format!("&{};", r.decode().map_err(xml_err)?);
                    let resolved = quick_xml::escape::unescape(&entity).map_err(xml_err)?;
                    text_buf.push_str(&resolved);
                }
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"t" => {
                    in_text = false;
                    paragraph
                        .runs
                        .push(Run::text(char_shape, std::mem::take(&mut text_buf)));
                },
                b"p" => break,
                _ => {},
            },
            Event::Eof => {
                return Err(FormatError::Xml("unexpected EOF inside <p>".to_string()));
            },
            _ => {},
        }
        buf.clear();
    }

    Ok(paragraph)
}

fn parse_table(reader: &mut XmlReader, start: &BytesStart) -> Result<Table, FormatError> {
    let rows = attr(start, "rowCnt").and_then(|v| v.parse().ok()).unwrap_or(0);
    let cols = attr(start, "colCnt").and_then(|v| v.parse().ok()).unwrap_or(0);
    let mut table = Table::new(rows, cols);
    table.border_fill = attr(start, "borderFillIDRef")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"tr" => {},
                b"tc" => {
                    let owned = e.to_owned();
                    table.cells.push(parse_cell(reader, &owned)?);
                },
                _ => {},
            },
            Event::End(ref e) if e.local_name().as_ref() == b"tbl" => break,
            Event::Eof => {
                return Err(FormatError::Xml("unexpected EOF inside <tbl>".to_string()));
            },
            _ => {},
        }
        buf.clear();
    }

    if let Err(reason) = table.check_grid() {
        log::warn!("table grid inconsistency: {}", reason);
    }
    Ok(table)
}

fn parse_cell(reader: &mut XmlReader, start: &BytesStart) -> Result<Cell, FormatError> {
    let mut cell = Cell::new(0, 0);
    cell.border_fill = attr(start, "borderFillIDRef")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"subList" => {
                    cell.blocks = parse_cell_blocks(reader)?;
                },
                _ => {},
            },
            Event::Empty(ref e) => match e.local_name().as_ref() {
                b"cellAddr" => {
                    cell.row = attr(e, "rowAddr").and_then(|v| v.parse().ok()).unwrap_or(0);
                    cell.col = attr(e, "colAddr").and_then(|v| v.parse().ok()).unwrap_or(0);
                },
                b"cellSpan" => {
                    cell.row_span = attr(e, "rowSpan").and_then(|v| v.parse().ok()).unwrap_or(1);
                    cell.col_span = attr(e, "colSpan").and_then(|v| v.parse().ok()).unwrap_or(1);
                },
                b"cellSz" => {
                    cell.width = attr(e, "width").and_then(|v| v.parse().ok()).unwrap_or(0);
                    cell.height = attr(e, "height").and_then(|v| v.parse().ok()).unwrap_or(0);
                },
                _ => {},
            },
            Event::End(ref e) if e.local_name().as_ref() == b"tc" => break,
            Event::Eof => {
                return Err(FormatError::Xml("unexpected EOF inside <tc>".to_string()));
            },
            _ => {},
        }
        buf.clear();
    }
    Ok(cell)
}

/// Block dispatch inside a cell's `subList` (paragraphs, nested tables,
/// pictures), until the matching end tag.
fn parse_cell_blocks(reader: &mut XmlReader) -> Result<Vec<Block>, FormatError> {
    let mut blocks = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"p" => {
                    let owned = e.to_owned();
                    blocks.push(Block::Paragraph(parse_paragraph(reader, &owned)?));
                },
                b"tbl" => {
                    let owned = e.to_owned();
                    blocks.push(Block::Table(parse_table(reader, &owned)?));
                },
                b"pic" => {
                    let owned = e.to_owned();
                    blocks.push(Block::Image(parse_pic(reader, &owned)?));
                },
                _ => {},
            },
            Event::Empty(ref e) => {
                if e.local_name().as_ref() == b"p" {
                    blocks.push(Block::Paragraph(paragraph_from_attrs(e)));
                }
            },
            Event::End(ref e) if e.local_name().as_ref() == b"subList" => break,
            Event::Eof => {
                return Err(FormatError::Xml(
                    "unexpected EOF inside <subList>".to_string(),
                ));
            },
            _ => {},
        }
        buf.clear();
    }
    Ok(blocks)
}

fn parse_pic(reader: &mut XmlReader, _start: &BytesStart) -> Result<Image, FormatError> {
    let mut image = Image {
        bin_item: String::new(),
        width: 0,
        height: 0,
        caption: None,
    };
    let mut buf = Vec::new();
    let mut in_caption_text = false;
    let mut caption_started = false;
    let mut caption = String::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"sz" => {
                    image.width = attr(e, "width").and_then(|v| v.parse().ok()).unwrap_or(0);
                    image.height = attr(e, "height").and_then(|v| v.parse().ok()).unwrap_or(0);
                },
                b"img" => {
                    if let Some(item) = attr(e, "binaryItemIDRef") {
                        image.bin_item = item;
                    }
                },
                b"t" => {
                    in_caption_text = true;
                    caption_started = true;
                },
                b"lineBreak" => {
                    if caption_started {
                        caption.push('\n');
                    }
                },
                _ => {},
            },
            Event::Text(ref t) => {
                if in_caption_text {
                    caption.push_str(&t.decode().map_err(xml_err)?);
                }
            },
            Event::GeneralRef(ref r) => {
                if in_caption_text {
                    let entity = format!("&{};", r.decode().map_err(xml_err)?);
                    caption.push_str(&quick_xml::escape::unescape(&entity).map_err(xml_err)?);
                }
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"t" => in_caption_text = false,
                b"pic" => break,
                _ => {},
            },
            Event::Eof => {
                return Err(FormatError::Xml("unexpected EOF inside <pic>".to_string()));
            },
            _ => {},
        }
        buf.clear();
    }

    image.caption = Some(caption).filter(|c| !c.is_empty());
    Ok(image)
}

// ── serialization ───────────────────────────────────────────────

/// Serialize a section to its XML part.
pub fn write_section(section: &Section) -> String {
    let mut xml = String::with_capacity(4096);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<hs:sec xmlns:hs="http://www.hancom.co.kr/hwpml/2011/section" xmlns:hp="http://www.hancom.co.kr/hwpml/2011/paragraph" xmlns:hc="http://www.hancom.co.kr/hwpml/2011/core">"#,
    );
    write_page(&mut xml, &section.page);
    for block in &section.blocks {
        write_block(&mut xml, block);
    }
    xml.push_str("</hs:sec>");
    xml
}

fn write_page(xml: &mut String, page: &PageGeometry) {
    let _ = write!(
        xml,
        r#"<hp:secPr><hp:pagePr landscape="{}" width="{}" height="{}"><hp:margin left="{}" right="{}" top="{}" bottom="{}" header="{}" footer="{}" gutter="{}"/></hp:pagePr></hp:secPr>"#,
        if page.landscape { "1" } else { "0" },
        page.width,
        page.height,
        page.margin_left,
        page.margin_right,
        page.margin_top,
        page.margin_bottom,
        page.margin_header,
        page.margin_footer,
        page.margin_gutter
    );
}

fn write_block(xml: &mut String, block: &Block) {
    match block {
        Block::Paragraph(p) => write_paragraph(xml, p),
        Block::Table(t) => write_table(xml, t),
        Block::Image(i) => write_pic(xml, i),
    }
}

fn write_paragraph(xml: &mut String, paragraph: &Paragraph) {
    if paragraph.runs.is_empty() {
        let _ = write!(
            xml,
            r#"<hp:p paraPrIDRef="{}" styleIDRef="{}"/>"#,
            paragraph.para_shape, paragraph.style
        );
        return;
    }

    let _ = write!(
        xml,
        r#"<hp:p paraPrIDRef="{}" styleIDRef="{}">"#,
        paragraph.para_shape, paragraph.style
    );

    // consecutive runs sharing a char shape fold into one <hp:run>
    let mut open_shape: Option<u32> = None;
    for run in &paragraph.runs {
        if open_shape != Some(run.char_shape) {
            if open_shape.is_some() {
                xml.push_str("</hp:run>");
            }
            let _ = write!(xml, r#"<hp:run charPrIDRef="{}">"#, run.char_shape);
            open_shape = Some(run.char_shape);
        }
        match &run.content {
            RunContent::Text(t) => {
                let _ = write!(xml, "<hp:t>{}</hp:t>", escape_xml(t));
            },
            RunContent::Marker(marker) => {
                xml.push_str(match marker {
                    ControlMarker::Tab => "<hp:tab/>",
                    ControlMarker::LineBreak => "<hp:lineBreak/>",
                    ControlMarker::FieldStart => "<hp:fieldBegin/>",
                    ControlMarker::FieldEnd => "<hp:fieldEnd/>",
                    ControlMarker::NonBreakingSpace => "<hp:nbSpace/>",
                    ControlMarker::FixedWidthSpace => "<hp:fwSpace/>",
                });
            },
        }
    }
    if open_shape.is_some() {
        xml.push_str("</hp:run>");
    }
    xml.push_str("</hp:p>");
}

fn write_table(xml: &mut String, table: &Table) {
    let _ = write!(
        xml,
        r#"<hp:tbl rowCnt="{}" colCnt="{}" borderFillIDRef="{}">"#,
        table.rows, table.cols, table.border_fill
    );
    for row in 0..table.rows {
        xml.push_str("<hp:tr>");
        for cell in table.cells.iter().filter(|c| c.row == row) {
            let _ = write!(xml, r#"<hp:tc borderFillIDRef="{}">"#, cell.border_fill);
            let _ = write!(
                xml,
                r#"<hp:cellAddr colAddr="{}" rowAddr="{}"/>"#,
                cell.col, cell.row
            );
            let _ = write!(
                xml,
                r#"<hp:cellSpan colSpan="{}" rowSpan="{}"/>"#,
                cell.col_span, cell.row_span
            );
            let _ = write!(
                xml,
                r#"<hp:cellSz width="{}" height="{}"/>"#,
                cell.width, cell.height
            );
            xml.push_str("<hp:subList>");
            for block in &cell.blocks {
                write_block(xml, block);
            }
            xml.push_str("</hp:subList></hp:tc>");
        }
        xml.push_str("</hp:tr>");
    }
    xml.push_str("</hp:tbl>");
}

fn write_pic(xml: &mut String, image: &Image) {
    let _ = write!(
        xml,
        r#"<hp:pic><hp:sz width="{}" height="{}"/><hc:img binaryItemIDRef="{}"/>"#,
        image.width,
        image.height,
        escape_xml(&image.bin_item)
    );
    if let Some(caption) = &image.caption {
        xml.push_str("<hp:caption>");
        let mut first = true;
        for line in caption.split('\n') {
            if !first {
                xml.push_str("<hp:lineBreak/>");
            }
            first = false;
            let _ = write!(xml, "<hp:t>{}</hp:t>", escape_xml(line));
        }
        xml.push_str("</hp:caption>");
    }
    xml.push_str("</hp:pic>");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::document::path::BlockPath;
    use crate::document::{Document, Section};

    fn para(text: &str, style: u16, para_shape: u32, char_shape: u32) -> Block {
        let mut p = Paragraph::new(style, para_shape);
        if !text.is_empty() {
            p.set_text(text, char_shape);
        }
        Block::Paragraph(p)
    }

    pub(crate) fn sample_section() -> Section {
        let mut section = Section::default();
        section.blocks.push(para("사업 개요", 1, 1, 1));
        section.blocks.push(para("", 0, 0, 0)); // empty template paragraph

        let mut p = Paragraph::new(0, 0);
        p.runs.push(Run::text(0, "항목"));
        p.runs.push(Run::marker(0, ControlMarker::Tab));
        p.runs.push(Run::text(2, "값 <특수> & \"문자\""));
        section.blocks.push(Block::Paragraph(p));

        let mut table = Table::new(2, 2);
        for r in 0..2u16 {
            for c in 0..2u16 {
                let mut cell = Cell::new(r, c);
                cell.width = 7200;
                cell.height = 1000;
                cell.blocks
                    .push(para(&format!("셀 {}{}", r, c), 0, 0, 0));
                table.cells.push(cell);
            }
        }
        section.blocks.push(Block::Table(table));

        section.blocks.push(Block::Image(Image {
            bin_item: "BinData/BIN0001.png".to_string(),
            width: 14400,
            height: 7200,
            caption: Some("그림 1. 개요도".to_string()),
        }));

        section
    }

    #[test]
    fn test_section_round_trip() {
        let section = sample_section();
        let xml = write_section(&section);
        let parsed = parse_section(xml.as_bytes()).unwrap();
        assert_eq!(parsed, section);
    }

    #[test]
    fn test_page_geometry_round_trip() {
        let mut section = Section::default();
        section.page.landscape = true;
        section.page.width = 84188;
        section.page.height = 59528;
        section.page.margin_gutter = 100;
        let parsed = parse_section(write_section(&section).as_bytes()).unwrap();
        assert_eq!(parsed.page, section.page);
    }

    #[test]
    fn test_spanned_table_round_trip() {
        let mut table = Table::new(2, 2);
        let mut wide = Cell::new(0, 0);
        wide.col_span = 2;
        wide.blocks.push(para("헤더", 0, 0, 0));
        table.cells.push(wide);
        table.cells.push(Cell::new(1, 0));
        table.cells.push(Cell::new(1, 1));
        let mut section = Section::default();
        section.blocks.push(Block::Table(table));

        let parsed = parse_section(write_section(&section).as_bytes()).unwrap();
        assert_eq!(parsed, section);
        let Block::Table(t) = &parsed.blocks[0] else {
            panic!("expected table");
        };
        assert_eq!(t.cell_at(0, 0).unwrap().col_span, 2);
    }

    #[test]
    fn test_nested_table_round_trip() {
        let mut inner = Table::new(1, 1);
        let mut inner_cell = Cell::new(0, 0);
        inner_cell.blocks.push(para("내부", 0, 0, 0));
        inner.cells.push(inner_cell);

        let mut outer = Table::new(1, 1);
        let mut outer_cell = Cell::new(0, 0);
        outer_cell.blocks.push(Block::Table(inner));
        outer.cells.push(outer_cell);

        let mut section = Section::default();
        section.blocks.push(Block::Table(outer));

        let parsed = parse_section(write_section(&section).as_bytes()).unwrap();
        assert_eq!(parsed, section);
    }

    #[test]
    fn test_block_identity_stable() {
        let section = sample_section();
        let doc = Document {
            sections: vec![section],
            ..Default::default()
        };
        let xml = write_section(&doc.sections[0]);
        let reparsed = Document {
            sections: vec![parse_section(xml.as_bytes()).unwrap()],
            ..Default::default()
        };
        // the same position path resolves to the same block before and after
        let path = BlockPath::block(0, 3).cell(1, 1).child(0);
        assert_eq!(doc.resolve(&path), reparsed.resolve(&path));
    }
}
