//! Post-injection validation.
//!
//! The validator inspects a produced document against the template's style
//! profile and the injection plan. It never fails: every finding lands in a
//! structured report and the caller decides what is fatal.

use crate::common::error::Result;
use crate::document::path::BlockPath;
use crate::document::table::Table;
use crate::document::{Block, Document, Paragraph};
use crate::inject::{InjectionMapping, SectionContent};
use crate::profile::{StyleProfile, StyleRole};
use serde::{Deserialize, Serialize};

/// A style reference that no longer resolves, or a mapped paragraph whose
/// style drifted from the profile role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleMismatch {
    pub path: String,
    pub expected_style: String,
    pub actual_style: String,
}

/// A numeric inconsistency in a table: a total cell that does not equal the
/// sum of its column, or cells disagreeing on unit/precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArithmeticMismatch {
    pub table_path: String,
    pub expected_total: String,
    pub actual_total: String,
}

/// The structured validation report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub unfilled: Vec<String>,
    pub style_mismatches: Vec<StyleMismatch>,
    pub arithmetic_mismatches: Vec<ArithmeticMismatch>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.unfilled.is_empty()
            && self.style_mismatches.is_empty()
            && self.arithmetic_mismatches.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Row labels that designate a total row.
const TOTAL_LABELS: &[&str] = &["합계", "총계", "소계", "계", "Total", "TOTAL", "total"];

/// Placeholder content left by template authors.
const PLACEHOLDER_GLYPHS: &[&str] = &["○", "○○", "□", "◯", "…", "...", "-"];

/// Validate a produced document.
pub fn validate(
    doc: &Document,
    profile: &StyleProfile,
    mapping: &InjectionMapping,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_unfilled(doc, mapping, &mut report);
    check_style_references(doc, &mut report);
    check_role_conformance(doc, profile, mapping, &mut report);
    for_each_table(doc, &mut |path, table| {
        check_totals(path, table, &mut report.arithmetic_mismatches);
        check_units(path, table, &mut report.arithmetic_mismatches);
    });
    report
}

fn is_placeholder(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    if PLACEHOLDER_GLYPHS.contains(&trimmed) {
        return true;
    }
    for (open, close) in [('(', ')'), ('[', ']'), ('<', '>')] {
        if trimmed.starts_with(open) && trimmed.ends_with(close) && trimmed.contains("작성") {
            return true;
        }
    }
    false
}

fn check_unfilled(doc: &Document, mapping: &InjectionMapping, report: &mut ValidationReport) {
    for entry in &mapping.entries {
        let Some(block) = doc.resolve(&entry.target) else {
            report.unfilled.push(entry.target.to_string());
            continue;
        };
        match block {
            Block::Paragraph(p) => {
                if is_placeholder(&p.text()) {
                    report.unfilled.push(entry.target.to_string());
                }
            },
            Block::Table(table) => {
                for cell in &table.cells {
                    if is_placeholder(&cell.text()) {
                        report
                            .unfilled
                            .push(entry.target.cell(cell.row, cell.col).to_string());
                    }
                }
            },
            Block::Image(image) => {
                let filled = doc
                    .bin_data
                    .get(&image.bin_item)
                    .map(|d| !d.is_empty())
                    .unwrap_or(false);
                if !filled {
                    report.unfilled.push(entry.target.to_string());
                }
            },
        }
    }
}

/// Every style id referenced by a block must resolve in the style table.
fn check_style_references(doc: &Document, report: &mut ValidationReport) {
    for_each_paragraph(doc, &mut |path, paragraph| {
        let styles = &doc.styles;
        if styles.style(paragraph.style).is_none() {
            report.style_mismatches.push(StyleMismatch {
                path: path.to_string(),
                expected_style: format!("style {}", paragraph.style),
                actual_style: "missing".to_string(),
            });
        }
        if styles.para_shape(paragraph.para_shape).is_none() {
            report.style_mismatches.push(StyleMismatch {
                path: path.to_string(),
                expected_style: format!("paraShape {}", paragraph.para_shape),
                actual_style: "missing".to_string(),
            });
        }
        for run in &paragraph.runs {
            if styles.char_shape(run.char_shape).is_none() {
                report.style_mismatches.push(StyleMismatch {
                    path: path.to_string(),
                    expected_style: format!("charShape {}", run.char_shape),
                    actual_style: "missing".to_string(),
                });
                break;
            }
        }
    });
}

/// Injected text must carry the profile role's character shape. A drift here
/// means the engine's styling was overridden after injection.
fn check_role_conformance(
    doc: &Document,
    profile: &StyleProfile,
    mapping: &InjectionMapping,
    report: &mut ValidationReport,
) {
    for entry in &mapping.entries {
        if !matches!(entry.content, SectionContent::Text(_)) {
            continue;
        }
        let Some(Block::Paragraph(paragraph)) = doc.resolve(&entry.target) else {
            continue;
        };
        let Some(role_ref) = profile.role_ref(entry.role.unwrap_or(StyleRole::Body)) else {
            continue;
        };
        let Some(actual) = paragraph.runs.first().map(|r| r.char_shape) else {
            continue; // empty targets are already in the unfilled list
        };
        if actual != role_ref.char_shape {
            report.style_mismatches.push(StyleMismatch {
                path: entry.target.to_string(),
                expected_style: format!("charShape {}", role_ref.char_shape),
                actual_style: format!("charShape {}", actual),
            });
        }
    }
}

// walkers

fn for_each_paragraph(doc: &Document, f: &mut impl FnMut(&BlockPath, &Paragraph)) {
    fn walk(blocks: &[Block], base: &BlockPath, f: &mut impl FnMut(&BlockPath, &Paragraph)) {
        for (i, block) in blocks.iter().enumerate() {
            let path = base.child(i);
            match block {
                Block::Paragraph(p) => f(&path, p),
                Block::Table(t) => {
                    for cell in &t.cells {
                        walk(&cell.blocks, &path.cell(cell.row, cell.col), f);
                    }
                },
                Block::Image(_) => {},
            }
        }
    }
    for (si, section) in doc.sections.iter().enumerate() {
        let base = BlockPath {
            section: si,
            steps: Vec::new(),
        };
        walk(&section.blocks, &base, f);
    }
}

fn for_each_table(doc: &Document, f: &mut impl FnMut(&BlockPath, &Table)) {
    fn walk(blocks: &[Block], base: &BlockPath, f: &mut impl FnMut(&BlockPath, &Table)) {
        for (i, block) in blocks.iter().enumerate() {
            let path = base.child(i);
            if let Block::Table(t) = block {
                f(&path, t);
                for cell in &t.cells {
                    walk(&cell.blocks, &path.cell(cell.row, cell.col), f);
                }
            }
        }
    }
    for (si, section) in doc.sections.iter().enumerate() {
        let base = BlockPath {
            section: si,
            steps: Vec::new(),
        };
        walk(&section.blocks, &base, f);
    }
}

// numeric checks

/// A parsed currency/number cell: value, unit suffix, decimal places.
struct NumericCell {
    value: f64,
    unit: String,
    decimals: usize,
}

/// Parse `1,000원` / `2500` / `12.5` style cell text. Percentages and
/// non-numeric labels return `None`.
fn parse_numeric(text: &str) -> Option<NumericCell> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.ends_with('%') {
        return None;
    }
    let unit: String = trimmed
        .chars()
        .rev()
        .take_while(|c| !c.is_ascii_digit() && *c != '.' && *c != ',')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let number_part = trimmed[..trimmed.len() - unit.len()].trim();
    let cleaned: String = number_part
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    let decimals = cleaned
        .split_once('.')
        .map(|(_, frac)| frac.len())
        .unwrap_or(0);
    Some(NumericCell {
        value,
        unit: unit.trim().to_string(),
        decimals,
    })
}

fn format_amount(value: f64) -> String {
    if value.fract().abs() < 1e-9 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Designated total rows must equal the sum of the contributing cells in
/// each numeric column, within integer/currency rounding tolerance.
fn check_totals(path: &BlockPath, table: &Table, out: &mut Vec<ArithmeticMismatch>) {
    let total_rows: Vec<u16> = (0..table.rows)
        .filter(|&r| {
            table
                .cell_at(r, 0)
                .map(|c| TOTAL_LABELS.contains(&c.text().trim()))
                .unwrap_or(false)
        })
        .collect();

    for &total_row in &total_rows {
        for col in 1..table.cols {
            let Some(total_cell) = table.cell_at(total_row, col) else {
                continue;
            };
            let Some(total) = parse_numeric(&total_cell.text()) else {
                continue;
            };
            let mut sum = 0.0;
            let mut contributing = 0usize;
            for row in 0..total_row {
                // earlier total rows (subtotals) do not contribute again
                if total_rows.contains(&row) {
                    continue;
                }
                if let Some(cell) = table.cell_at(row, col) {
                    if let Some(n) = parse_numeric(&cell.text()) {
                        sum += n.value;
                        contributing += 1;
                    }
                }
            }
            if contributing == 0 {
                continue;
            }
            if (sum - total.value).abs() > 1.0 {
                out.push(ArithmeticMismatch {
                    table_path: path.cell(total_row, col).to_string(),
                    expected_total: format_amount(sum),
                    actual_total: format_amount(total.value),
                });
            }
        }
    }
}

/// All currency/number cells of one table share one unit and precision.
fn check_units(path: &BlockPath, table: &Table, out: &mut Vec<ArithmeticMismatch>) {
    let mut first_unit: Option<(String, BlockPath)> = None;
    let mut first_decimals: Option<usize> = None;

    for cell in &table.cells {
        let Some(n) = parse_numeric(&cell.text()) else {
            continue;
        };
        let cell_path = path.cell(cell.row, cell.col);
        match &first_unit {
            None => first_unit = Some((n.unit.clone(), cell_path.clone())),
            Some((unit, _)) if *unit != n.unit => {
                out.push(ArithmeticMismatch {
                    table_path: cell_path.to_string(),
                    expected_total: format!("unit '{}'", unit),
                    actual_total: format!("unit '{}'", n.unit),
                });
                continue;
            },
            _ => {},
        }
        match first_decimals {
            None => first_decimals = Some(n.decimals),
            Some(d) if d != n.decimals => {
                out.push(ArithmeticMismatch {
                    table_path: cell_path.to_string(),
                    expected_total: format!("{} decimal places", d),
                    actual_total: format!("{} decimal places", n.decimals),
                });
            },
            _ => {},
        }
    }
}
