//! Style profiles: portable snapshots of a template's visual formatting.
//!
//! A profile abstracts raw style ids behind logical roles (title, subtitle,
//! body, table header, table cell). That indirection is what lets a profile
//! extracted from one template be reapplied when injecting content into the
//! same or a structurally similar template.
//!
//! Classification is deterministic and side-effect-free: identical documents
//! always yield identical profiles. Thresholds are configuration, not
//! hard-coded constants.

use crate::common::error::Result;
use crate::common::unit::{height_hundredths_to_pt, hwpunit_to_mm};
use crate::document::styles::StyleTable;
use crate::document::{Block, Document, Paragraph, RunContent, Section};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Logical style role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleRole {
    Title,
    Subtitle,
    Body,
    TableHeader,
    TableCell,
}

/// Per-role font description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    pub font_family: String,
    /// Size in points.
    pub font_size: f64,
    pub bold: bool,
    /// Horizontal alignment (`JUSTIFY`, `LEFT`, `RIGHT`, `CENTER`, `DISTRIBUTE`).
    pub align: String,
    /// Line spacing as a percentage.
    pub line_spacing: u32,
}

/// Resolved style ids of a role in the source template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRef {
    pub style: u16,
    pub para_shape: u32,
    pub char_shape: u32,
}

/// Page size and margins, in millimeters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub width_mm: f64,
    pub height_mm: f64,
    pub margin_left_mm: f64,
    pub margin_right_mm: f64,
    pub margin_top_mm: f64,
    pub margin_bottom_mm: f64,
}

/// Source template identity and geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub source_name: String,
    pub page: PageInfo,
}

/// A derived, serializable style snapshot keyed by logical role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleProfile {
    pub document_info: DocumentInfo,
    pub styles: BTreeMap<StyleRole, FontSpec>,
    /// Numbering level (0-based) → format string.
    pub numbering: BTreeMap<u8, String>,
    /// Role → resolved ids in the source template's style table.
    pub style_refs: BTreeMap<StyleRole, RoleRef>,
}

impl StyleProfile {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolved ids for a role, falling back to the body role.
    pub fn role_ref(&self, role: StyleRole) -> Option<RoleRef> {
        self.style_refs
            .get(&role)
            .or_else(|| self.style_refs.get(&StyleRole::Body))
            .copied()
    }
}

/// Tunable classification thresholds.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// A style is a subtitle candidate when its average font size exceeds the
    /// median body size by at least this many points.
    pub subtitle_size_delta_pt: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            subtitle_size_delta_pt: 2.0,
        }
    }
}

/// Where a paragraph style was observed.
#[derive(Default, Clone)]
struct StyleUsage {
    top_level: usize,
    cell: usize,
    header_cell: usize,
    /// header-row cells with bold text or a shaded background
    emphasized_header_cell: usize,
    sizes_pt: Vec<f64>,
}

/// Extract a style profile from a document.
pub fn extract_profile(
    doc: &Document,
    source_name: &str,
    config: &ClassifierConfig,
) -> StyleProfile {
    let mut usage: BTreeMap<u16, StyleUsage> = BTreeMap::new();
    let mut title_style: Option<u16> = None;

    for section in &doc.sections {
        let mut first_non_empty_seen = false;
        for block in &section.blocks {
            match block {
                Block::Paragraph(p) => {
                    if !first_non_empty_seen && !p.is_empty() {
                        first_non_empty_seen = true;
                        if title_style.is_none() {
                            title_style = Some(p.style);
                        }
                    }
                    record_paragraph(&mut usage, doc, p, Location::TopLevel);
                },
                Block::Table(t) => record_table(&mut usage, doc, t),
                Block::Image(_) => {},
            }
        }
    }

    // body: the most frequently referenced paragraph style, ties to lowest id
    let body_style = usage
        .iter()
        .max_by_key(|(id, u)| {
            (
                u.top_level + u.cell + u.header_cell,
                std::cmp::Reverse(**id),
            )
        })
        .map(|(id, _)| *id)
        .unwrap_or(0);

    let median_body_pt = usage
        .get(&body_style)
        .map(|u| median(&u.sizes_pt))
        .unwrap_or(10.0);

    let mut roles: BTreeMap<StyleRole, u16> = BTreeMap::new();
    roles.insert(StyleRole::Body, body_style);
    roles.insert(StyleRole::Title, title_style.unwrap_or(body_style));

    for (&id, u) in &usage {
        if id == body_style || Some(id) == title_style {
            continue;
        }
        let total = u.top_level + u.cell + u.header_cell;
        if total == 0 {
            continue;
        }
        if u.top_level > 0 {
            let avg = u.sizes_pt.iter().sum::<f64>() / u.sizes_pt.len() as f64;
            if avg >= median_body_pt + config.subtitle_size_delta_pt {
                roles.entry(StyleRole::Subtitle).or_insert(id);
            }
        } else if u.header_cell > 0 && u.cell == 0 && u.emphasized_header_cell > 0 {
            roles.entry(StyleRole::TableHeader).or_insert(id);
        } else {
            roles.entry(StyleRole::TableCell).or_insert(id);
        }
    }

    let mut styles = BTreeMap::new();
    let mut style_refs = BTreeMap::new();
    for (&role, &style_id) in &roles {
        let (spec, role_ref) = resolve_role(&doc.styles, style_id);
        styles.insert(role, spec);
        style_refs.insert(role, role_ref);
    }

    let numbering = document_numbering(doc);
    let page = doc
        .sections
        .first()
        .map(|s| page_info(s))
        .unwrap_or_else(|| page_info(&Section::default()));

    StyleProfile {
        document_info: DocumentInfo {
            source_name: source_name.to_string(),
            page,
        },
        styles,
        numbering,
        style_refs,
    }
}

enum Location {
    TopLevel,
    Cell,
    /// row-0 cell; the flag says whether the cell is visually emphasized
    HeaderCell(bool),
}

fn record_paragraph(
    usage: &mut BTreeMap<u16, StyleUsage>,
    doc: &Document,
    paragraph: &Paragraph,
    location: Location,
) {
    let entry = usage.entry(paragraph.style).or_default();
    match location {
        Location::TopLevel => entry.top_level += 1,
        Location::Cell => entry.cell += 1,
        Location::HeaderCell(emphasized) => {
            entry.header_cell += 1;
            if emphasized {
                entry.emphasized_header_cell += 1;
            }
        },
    }
    entry.sizes_pt.push(paragraph_size_pt(doc, paragraph));
}

fn record_table(usage: &mut BTreeMap<u16, StyleUsage>, doc: &Document, table: &crate::document::Table) {
    for cell in &table.cells {
        let shaded = doc
            .styles
            .border_fill(cell.border_fill)
            .map(|f| f.is_shaded())
            .unwrap_or(false);
        for block in &cell.blocks {
            match block {
                Block::Paragraph(p) => {
                    let location = if cell.row == 0 {
                        let bold = paragraph_bold(doc, p);
                        Location::HeaderCell(bold || shaded)
                    } else {
                        Location::Cell
                    };
                    record_paragraph(usage, doc, p, location);
                },
                Block::Table(nested) => record_table(usage, doc, nested),
                Block::Image(_) => {},
            }
        }
    }
}

/// Font size of a paragraph: the first text run's char shape, then the
/// style's own char shape.
fn paragraph_size_pt(doc: &Document, paragraph: &Paragraph) -> f64 {
    let shape_id = paragraph
        .runs
        .iter()
        .find(|r| matches!(r.content, RunContent::Text(_)))
        .map(|r| r.char_shape)
        .or_else(|| {
            doc.styles
                .style(paragraph.style)
                .map(|s| s.char_shape as u32)
        })
        .unwrap_or(0);
    doc.styles
        .char_shape(shape_id)
        .map(|cs| height_hundredths_to_pt(cs.height))
        .unwrap_or(10.0)
}

fn paragraph_bold(doc: &Document, paragraph: &Paragraph) -> bool {
    paragraph
        .runs
        .iter()
        .find(|r| matches!(r.content, RunContent::Text(_)))
        .and_then(|r| doc.styles.char_shape(r.char_shape))
        .map(|cs| cs.bold)
        .unwrap_or(false)
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 10.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted[sorted.len() / 2]
}

fn resolve_role(styles: &StyleTable, style_id: u16) -> (FontSpec, RoleRef) {
    let style = styles.style(style_id);
    let char_shape_id = style.map(|s| s.char_shape as u32).unwrap_or(0);
    let para_shape_id = style.map(|s| s.para_shape as u32).unwrap_or(0);

    let char_shape = styles.char_shape(char_shape_id);
    let para_shape = styles.para_shape(para_shape_id);

    let font_family = char_shape
        .and_then(|cs| styles.face_name(cs.face_ids[0]))
        .map(|f| f.name.clone())
        .unwrap_or_default();

    let spec = FontSpec {
        font_family,
        font_size: char_shape
            .map(|cs| height_hundredths_to_pt(cs.height))
            .unwrap_or(10.0),
        bold: char_shape.map(|cs| cs.bold).unwrap_or(false),
        align: para_shape
            .map(|ps| ps.align.as_xml().to_string())
            .unwrap_or_else(|| "JUSTIFY".to_string()),
        line_spacing: para_shape.map(|ps| ps.line_spacing).unwrap_or(160),
    };
    let role_ref = RoleRef {
        style: style_id,
        para_shape: para_shape_id,
        char_shape: char_shape_id,
    };
    (spec, role_ref)
}

/// The document's numbering map: the scheme referenced by the most paragraph
/// shapes, falling back to the first scheme in the arena.
fn document_numbering(doc: &Document) -> BTreeMap<u8, String> {
    let mut counts: BTreeMap<u16, usize> = BTreeMap::new();
    for shape in &doc.styles.para_shapes {
        if let Some(id) = shape.numbering {
            *counts.entry(id).or_default() += 1;
        }
    }
    let scheme_id = counts
        .iter()
        .max_by_key(|(id, count)| (**count, std::cmp::Reverse(**id)))
        .map(|(id, _)| *id)
        .unwrap_or(0);

    let mut numbering = BTreeMap::new();
    if let Some(scheme) = doc.styles.numbering(scheme_id) {
        for (level, entry) in scheme.levels.iter().enumerate() {
            if !entry.format.is_empty() {
                numbering.insert(level as u8, entry.format.clone());
            }
        }
    }
    numbering
}

fn page_info(section: &Section) -> PageInfo {
    let p = &section.page;
    let mm = |v| (hwpunit_to_mm(v) * 10.0).round() / 10.0;
    PageInfo {
        width_mm: mm(p.width),
        height_mm: mm(p.height),
        margin_left_mm: mm(p.margin_left),
        margin_right_mm: mm(p.margin_right),
        margin_top_mm: mm(p.margin_top),
        margin_bottom_mm: mm(p.margin_bottom),
    }
}
