//! `Contents/header.xml`: the style arenas.

use super::attr;
use crate::common::error::FormatError;
use crate::common::xml::escape_xml;
use crate::document::styles::{
    Alignment, BinDataItem, BorderFill, CharShape, FaceName, NumberingLevel, NumberingScheme,
    ParaShape, Style, StyleTable,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fmt::Write as FmtWrite;

/// `0x00BBGGRR` color word to `#RRGGBB`, `none` for the default sentinel.
pub(crate) fn color_to_hex(color: u32) -> String {
    if color == 0xFFFF_FFFF {
        return "none".to_string();
    }
    let r = color & 0xFF;
    let g = (color >> 8) & 0xFF;
    let b = (color >> 16) & 0xFF;
    format!("#{:02X}{:02X}{:02X}", r, g, b)
}

pub(crate) fn hex_to_color(s: &str) -> u32 {
    let Some(hex) = s.strip_prefix('#') else {
        return 0xFFFF_FFFF;
    };
    let Ok(rgb) = u32::from_str_radix(hex, 16) else {
        return 0xFFFF_FFFF;
    };
    let r = (rgb >> 16) & 0xFF;
    let g = (rgb >> 8) & 0xFF;
    let b = rgb & 0xFF;
    (b << 16) | (g << 8) | r
}

/// Parse `header.xml` into the style arenas.
///
/// Ids are taken from the `id` attributes, so arenas keep positional
/// addressing even if the file lists entries out of order.
pub fn parse_header(xml: &[u8], styles: &mut StyleTable) -> Result<(), FormatError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::with_capacity(1024);

    // element the following children attach to
    enum Ctx {
        None,
        CharPr(usize),
        ParaPr(usize),
        BorderFill(usize),
        Numbering(usize),
    }
    let mut ctx = Ctx::None;

    fn place<T: Default>(arena: &mut Vec<T>, id: usize, value: T) {
        if arena.len() <= id {
            arena.resize_with(id + 1, T::default);
        }
        arena[id] = value;
    }

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| FormatError::Xml(e.to_string()))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let id = attr(e, "id").and_then(|v| v.parse::<usize>().ok());
                match e.local_name().as_ref() {
                    b"fontface" => {
                        let face = FaceName {
                            name: attr(e, "face").unwrap_or_default(),
                        };
                        let id = id.unwrap_or(styles.face_names.len());
                        place(&mut styles.face_names, id, face);
                    },
                    b"borderFill" => {
                        let id = id.unwrap_or(styles.border_fills.len());
                        place(&mut styles.border_fills, id, BorderFill::default());
                        ctx = Ctx::BorderFill(id);
                    },
                    b"winBrush" => {
                        if let Ctx::BorderFill(id) = ctx {
                            if let Some(color) = attr(e, "faceColor") {
                                styles.border_fills[id].fill_color = hex_to_color(&color);
                            }
                        }
                    },
                    b"charPr" => {
                        let id = id.unwrap_or(styles.char_shapes.len());
                        let mut shape = CharShape::default();
                        if let Some(h) = attr(e, "height").and_then(|v| v.parse().ok()) {
                            shape.height = h;
                        }
                        if let Some(c) = attr(e, "textColor") {
                            shape.color = hex_to_color(&c);
                        }
                        place(&mut styles.char_shapes, id, shape);
                        ctx = Ctx::CharPr(id);
                    },
                    b"fontRef" => {
                        if let Ctx::CharPr(id) = ctx {
                            let shape = &mut styles.char_shapes[id];
                            for (i, script) in [
                                "hangul", "latin", "hanja", "japanese", "other", "symbol", "user",
                            ]
                            .iter()
                            .enumerate()
                            {
                                if let Some(v) = attr(e, script).and_then(|v| v.parse().ok()) {
                                    shape.face_ids[i] = v;
                                }
                            }
                        }
                    },
                    b"bold" => {
                        if let Ctx::CharPr(id) = ctx {
                            styles.char_shapes[id].bold = true;
                        }
                    },
                    b"italic" => {
                        if let Ctx::CharPr(id) = ctx {
                            styles.char_shapes[id].italic = true;
                        }
                    },
                    b"underline" => {
                        if let Ctx::CharPr(id) = ctx {
                            styles.char_shapes[id].underline = true;
                        }
                    },
                    b"paraPr" => {
                        let id = id.unwrap_or(styles.para_shapes.len());
                        place(&mut styles.para_shapes, id, ParaShape::default());
                        ctx = Ctx::ParaPr(id);
                    },
                    b"align" => {
                        if let Ctx::ParaPr(id) = ctx {
                            if let Some(h) = attr(e, "horizontal") {
                                styles.para_shapes[id].align = Alignment::from_xml(&h);
                            }
                        }
                    },
                    b"lineSpacing" => {
                        if let Ctx::ParaPr(id) = ctx {
                            if let Some(v) = attr(e, "value").and_then(|v| v.parse().ok()) {
                                styles.para_shapes[id].line_spacing = v;
                            }
                        }
                    },
                    b"margin" => {
                        if let Ctx::ParaPr(id) = ctx {
                            let shape = &mut styles.para_shapes[id];
                            let num = |name| attr(e, name).and_then(|v: String| v.parse().ok());
                            if let Some(v) = num("left") {
                                shape.left_margin = v;
                            }
                            if let Some(v) = num("right") {
                                shape.right_margin = v;
                            }
                            if let Some(v) = num("indent") {
                                shape.indent = v;
                            }
                            if let Some(v) = num("prev") {
                                shape.spacing_prev = v;
                            }
                            if let Some(v) = num("next") {
                                shape.spacing_next = v;
                            }
                        }
                    },
                    b"heading" => {
                        if let Ctx::ParaPr(id) = ctx {
                            let shape = &mut styles.para_shapes[id];
                            shape.numbering =
                                attr(e, "idRef").and_then(|v| v.parse().ok());
                            if let Some(level) = attr(e, "level").and_then(|v| v.parse().ok()) {
                                shape.numbering_level = level;
                            }
                        }
                    },
                    b"numbering" => {
                        let id = id.unwrap_or(styles.numberings.len());
                        place(&mut styles.numberings, id, NumberingScheme::default());
                        ctx = Ctx::Numbering(id);
                    },
                    b"paraHead" => {
                        if let Ctx::Numbering(id) = ctx {
                            let scheme = &mut styles.numberings[id];
                            let level: usize = attr(e, "level")
                                .and_then(|v| v.parse().ok())
                                .unwrap_or(scheme.levels.len());
                            if scheme.levels.len() <= level {
                                scheme.levels.resize_with(level + 1, NumberingLevel::default);
                            }
                            scheme.levels[level] = NumberingLevel {
                                format: attr(e, "text").unwrap_or_default(),
                                start: attr(e, "start")
                                    .and_then(|v| v.parse().ok())
                                    .unwrap_or(1),
                            };
                        }
                    },
                    b"style" => {
                        let style = Style {
                            name: attr(e, "name").unwrap_or_default(),
                            english_name: attr(e, "engName").unwrap_or_default(),
                            para_shape: attr(e, "paraPrIDRef")
                                .and_then(|v| v.parse().ok())
                                .unwrap_or(0),
                            char_shape: attr(e, "charPrIDRef")
                                .and_then(|v| v.parse().ok())
                                .unwrap_or(0),
                            next_style: attr(e, "nextStyleIDRef")
                                .and_then(|v| v.parse().ok())
                                .unwrap_or(0),
                        };
                        let id = id.unwrap_or(styles.styles.len());
                        place(&mut styles.styles, id, style);
                    },
                    b"binItem" => {
                        if let (Some(id), Some(ext)) = (
                            attr(e, "id").and_then(|v| v.parse().ok()),
                            attr(e, "ext"),
                        ) {
                            styles.bin_data.push(BinDataItem { id, ext });
                        }
                    },
                    _ => {},
                }
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"charPr" | b"paraPr" | b"borderFill" | b"numbering" => ctx = Ctx::None,
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }

    Ok(())
}

/// Serialize the style arenas back to `header.xml`.
pub fn write_header(styles: &StyleTable, section_count: usize) -> String {
    let mut xml = String::with_capacity(4096);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    let _ = write!(
        xml,
        r#"<hh:head xmlns:hh="http://www.hancom.co.kr/hwpml/2011/head" version="1.4" secCnt="{}">"#,
        section_count
    );
    xml.push_str("<hh:refList>");

    let _ = write!(xml, r#"<hh:fontfaces itemCnt="{}">"#, styles.face_names.len());
    for (id, face) in styles.face_names.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<hh:fontface id="{}" face="{}"/>"#,
            id,
            escape_xml(&face.name)
        );
    }
    xml.push_str("</hh:fontfaces>");

    let _ = write!(
        xml,
        r#"<hh:borderFills itemCnt="{}">"#,
        styles.border_fills.len()
    );
    for (id, fill) in styles.border_fills.iter().enumerate() {
        if fill.is_shaded() {
            let _ = write!(
                xml,
                r#"<hh:borderFill id="{}"><hh:fillBrush><hh:winBrush faceColor="{}"/></hh:fillBrush></hh:borderFill>"#,
                id,
                color_to_hex(fill.fill_color)
            );
        } else {
            let _ = write!(xml, r#"<hh:borderFill id="{}"/>"#, id);
        }
    }
    xml.push_str("</hh:borderFills>");

    let _ = write!(
        xml,
        r#"<hh:charProperties itemCnt="{}">"#,
        styles.char_shapes.len()
    );
    for (id, shape) in styles.char_shapes.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<hh:charPr id="{}" height="{}" textColor="{}">"#,
            id,
            shape.height,
            color_to_hex(shape.color)
        );
        let f = &shape.face_ids;
        let _ = write!(
            xml,
            r#"<hh:fontRef hangul="{}" latin="{}" hanja="{}" japanese="{}" other="{}" symbol="{}" user="{}"/>"#,
            f[0], f[1], f[2], f[3], f[4], f[5], f[6]
        );
        if shape.bold {
            xml.push_str("<hh:bold/>");
        }
        if shape.italic {
            xml.push_str("<hh:italic/>");
        }
        if shape.underline {
            xml.push_str("<hh:underline/>");
        }
        xml.push_str("</hh:charPr>");
    }
    xml.push_str("</hh:charProperties>");

    let _ = write!(
        xml,
        r#"<hh:paraProperties itemCnt="{}">"#,
        styles.para_shapes.len()
    );
    for (id, shape) in styles.para_shapes.iter().enumerate() {
        let _ = write!(xml, r#"<hh:paraPr id="{}">"#, id);
        let _ = write!(
            xml,
            r#"<hh:align horizontal="{}"/>"#,
            shape.align.as_xml()
        );
        let _ = write!(
            xml,
            r#"<hh:lineSpacing type="PERCENT" value="{}"/>"#,
            shape.line_spacing
        );
        let _ = write!(
            xml,
            r#"<hh:margin left="{}" right="{}" indent="{}" prev="{}" next="{}"/>"#,
            shape.left_margin,
            shape.right_margin,
            shape.indent,
            shape.spacing_prev,
            shape.spacing_next
        );
        if let Some(numbering) = shape.numbering {
            let _ = write!(
                xml,
                r#"<hh:heading idRef="{}" level="{}"/>"#,
                numbering, shape.numbering_level
            );
        }
        xml.push_str("</hh:paraPr>");
    }
    xml.push_str("</hh:paraProperties>");

    let _ = write!(xml, r#"<hh:numberings itemCnt="{}">"#, styles.numberings.len());
    for (id, scheme) in styles.numberings.iter().enumerate() {
        let _ = write!(xml, r#"<hh:numbering id="{}">"#, id);
        for (level, entry) in scheme.levels.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<hh:paraHead level="{}" start="{}" text="{}"/>"#,
                level,
                entry.start,
                escape_xml(&entry.format)
            );
        }
        xml.push_str("</hh:numbering>");
    }
    xml.push_str("</hh:numberings>");

    let _ = write!(xml, r#"<hh:styles itemCnt="{}">"#, styles.styles.len());
    for (id, style) in styles.styles.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<hh:style id="{}" type="PARA" name="{}" engName="{}" paraPrIDRef="{}" charPrIDRef="{}" nextStyleIDRef="{}"/>"#,
            id,
            escape_xml(&style.name),
            escape_xml(&style.english_name),
            style.para_shape,
            style.char_shape,
            style.next_style
        );
    }
    xml.push_str("</hh:styles>");

    if !styles.bin_data.is_empty() {
        let _ = write!(xml, r#"<hh:binDataList itemCnt="{}">"#, styles.bin_data.len());
        for item in &styles.bin_data {
            let _ = write!(
                xml,
                r#"<hh:binItem id="{}" ext="{}"/>"#,
                item.id,
                escape_xml(&item.ext)
            );
        }
        xml.push_str("</hh:binDataList>");
    }

    xml.push_str("</hh:refList></hh:head>");
    xml
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_styles() -> StyleTable {
        let mut styles = StyleTable::default();
        styles.face_names.push(FaceName {
            name: "함초롬바탕".to_string(),
        });
        styles.face_names.push(FaceName {
            name: "함초롬돋움".to_string(),
        });
        styles.border_fills.push(BorderFill::default());
        styles.border_fills.push(BorderFill {
            fill_color: 0x00E0E0E0,
        });
        styles.char_shapes.push(CharShape::default());
        styles.char_shapes.push(CharShape {
            face_ids: [1; 7],
            height: 1600,
            bold: true,
            color: 0x00000080, // dark red in BGR
            ..CharShape::default()
        });
        styles.para_shapes.push(ParaShape::default());
        styles.para_shapes.push(ParaShape {
            align: Alignment::Center,
            numbering: Some(0),
            numbering_level: 1,
            ..ParaShape::default()
        });
        styles.numberings.push(NumberingScheme {
            levels: vec![
                NumberingLevel {
                    format: "^1.".to_string(),
                    start: 1,
                },
                NumberingLevel {
                    format: "가.".to_string(),
                    start: 1,
                },
            ],
        });
        styles.styles.push(Style {
            name: "본문".to_string(),
            english_name: "Normal".to_string(),
            para_shape: 0,
            char_shape: 0,
            next_style: 0,
        });
        styles.styles.push(Style {
            name: "제목 1".to_string(),
            english_name: "Heading 1".to_string(),
            para_shape: 1,
            char_shape: 1,
            next_style: 0,
        });
        styles
    }

    #[test]
    fn test_header_round_trip() {
        let styles = sample_styles();
        let xml = write_header(&styles, 1);
        let mut parsed = StyleTable::default();
        parse_header(xml.as_bytes(), &mut parsed).unwrap();
        assert_eq!(parsed, styles);
    }

    #[test]
    fn test_color_conversion() {
        assert_eq!(color_to_hex(0xFFFF_FFFF), "none");
        assert_eq!(color_to_hex(0x00FF0000), "#0000FF"); // BGR blue
        assert_eq!(hex_to_color("#0000FF"), 0x00FF0000);
        assert_eq!(hex_to_color("none"), 0xFFFF_FFFF);
        for color in [0u32, 0x00123456, 0x00E0E0E0] {
            assert_eq!(hex_to_color(&color_to_hex(color)), color);
        }
    }

    #[test]
    fn test_escaped_face_name() {
        let mut styles = StyleTable::default();
        styles.face_names.push(FaceName {
            name: "A&B \"Font\"".to_string(),
        });
        let xml = write_header(&styles, 1);
        let mut parsed = StyleTable::default();
        parse_header(xml.as_bytes(), &mut parsed).unwrap();
        assert_eq!(parsed.face_names[0].name, "A&B \"Font\"");
    }
}
