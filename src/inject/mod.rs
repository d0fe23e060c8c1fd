//! Content injection into a template document.
//!
//! The engine merges externally supplied section content (text, table grids,
//! images) into a template at mapped positions, applying the style profile.
//! It is structurally incapable of adding, removing or reordering Sections or
//! Blocks outside the mapped positions: all it ever does is rewrite runs,
//! cell contents and image payloads of blocks a mapping entry names. The
//! input tree is never mutated; every application clones the template and
//! returns a fresh document, which keeps before/after validation simple and
//! makes the bounded write-retry cycle safe to repeat.

use crate::common::error::{InjectionError, Result};
use crate::document::path::BlockPath;
use crate::document::table::Table;
use crate::document::{Block, Document, Paragraph};
use crate::profile::{StyleProfile, StyleRole};
use serde::{Deserialize, Serialize};

/// Externally authored content for one mapped position.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionContent {
    /// Replacement paragraph text; embedded newlines become line breaks
    Text(String),
    /// Row-major literal cell grid, dimensions must match the target exactly
    Table(Vec<Vec<String>>),
    /// Replacement image payload with optional explicit extent (HWPUNIT)
    Image {
        data: Vec<u8>,
        width: Option<u32>,
        height: Option<u32>,
        caption: Option<String>,
    },
}

/// One mapping entry: where the content goes and how it is styled.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    /// Logical section key from the external structural analysis
    pub section_key: String,
    pub target: BlockPath,
    pub content: SectionContent,
    /// Style role applied to injected text; `Body` when absent
    pub role: Option<StyleRole>,
}

/// An ordered injection plan. Built externally, consumed here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InjectionMapping {
    pub entries: Vec<MappingEntry>,
}

/// Persisted form of one mapping entry: the content stays external, only a
/// reference travels with the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRecord {
    pub section_key: String,
    /// Textual position path, e.g. `0/3` or `0/3/1.2/0`
    pub target_path: String,
    pub content_ref: String,
}

impl MappingRecord {
    pub fn parse_target(&self) -> Result<BlockPath> {
        self.target_path.parse().map_err(|_| {
            InjectionError::TargetNotFound {
                path: self.target_path.clone(),
            }
            .into()
        })
    }
}

impl InjectionMapping {
    /// Deserialize the persisted plan and resolve each content reference
    /// through the supplied lookup.
    pub fn from_json(
        json: &str,
        mut resolve: impl FnMut(&MappingRecord) -> Option<SectionContent>,
    ) -> Result<Self> {
        let records: Vec<MappingRecord> = serde_json::from_str(json)?;
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let target = record.parse_target()?;
            let content = resolve(&record).ok_or_else(|| InjectionError::ContentMismatch {
                path: record.target_path.clone(),
                reason: format!("unresolved content reference '{}'", record.content_ref),
            })?;
            entries.push(MappingEntry {
                section_key: record.section_key,
                target,
                content,
                role: None,
            });
        }
        Ok(Self { entries })
    }
}

/// The injection engine: template + profile in, new document out.
pub struct InjectionEngine<'a> {
    template: &'a Document,
    profile: &'a StyleProfile,
}

impl<'a> InjectionEngine<'a> {
    pub fn new(template: &'a Document, profile: &'a StyleProfile) -> Self {
        Self { template, profile }
    }

    /// Apply the mapping, producing a new document.
    ///
    /// The template is cloned up front; on any error the partially filled
    /// clone is dropped and the template is untouched.
    pub fn apply(&self, mapping: &InjectionMapping) -> std::result::Result<Document, InjectionError> {
        let mut doc = self.template.clone();
        for entry in &mapping.entries {
            self.apply_entry(&mut doc, entry)?;
        }
        Ok(doc)
    }

    fn apply_entry(
        &self,
        doc: &mut Document,
        entry: &MappingEntry,
    ) -> std::result::Result<(), InjectionError> {
        // shape checks run against the immutable view first, so a failing
        // entry leaves no partial edits of its own
        let Some(block) = doc.resolve_mut(&entry.target) else {
            return Err(InjectionError::TargetNotFound {
                path: entry.target.to_string(),
            });
        };

        // image payloads land in the document's binary store, which cannot be
        // touched while the block is borrowed
        let mut pending_bin: Option<(String, Vec<u8>)> = None;

        match (&entry.content, block) {
            (SectionContent::Text(text), Block::Paragraph(paragraph)) => {
                let role = entry.role.unwrap_or(StyleRole::Body);
                let char_shape = self
                    .profile
                    .role_ref(role)
                    .map(|r| r.char_shape)
                    .or_else(|| paragraph.runs.first().map(|r| r.char_shape))
                    .unwrap_or(0);
                // only the runs change; style and paragraph shape survive
                paragraph.set_text(text, char_shape);
            },
            (SectionContent::Table(grid), Block::Table(table)) => {
                check_shape(&entry.target, table, grid)?;
                self.fill_table(table, grid);
            },
            (
                SectionContent::Image {
                    data,
                    width,
                    height,
                    caption,
                },
                Block::Image(image),
            ) => {
                // explicit dimensions win; otherwise the payload keeps the
                // existing bounding box
                if let (Some(w), Some(h)) = (width, height) {
                    image.width = *w;
                    image.height = *h;
                }
                if let Some(caption) = caption {
                    image.caption = Some(caption.clone()).filter(|c| !c.is_empty());
                }
                pending_bin = Some((image.bin_item.clone(), data.clone()));
            },
            (content, block) => {
                return Err(InjectionError::ContentMismatch {
                    path: entry.target.to_string(),
                    reason: format!(
                        "{} content cannot fill a {} block",
                        content_kind(content),
                        block.kind()
                    ),
                });
            },
        }

        if let Some((member, data)) = pending_bin {
            doc.bin_data.insert(member, data);
        }
        Ok(())
    }

    fn fill_table(&self, table: &mut Table, grid: &[Vec<String>]) {
        let cell_ref = self.profile.role_ref(StyleRole::TableCell);
        for cell in &mut table.cells {
            let Some(value) = grid
                .get(cell.row as usize)
                .and_then(|row| row.get(cell.col as usize))
            else {
                continue;
            };
            let char_shape = cell_ref.map(|r| r.char_shape).unwrap_or(0);
            match cell.blocks.iter_mut().find_map(|b| match b {
                Block::Paragraph(p) => Some(p),
                _ => None,
            }) {
                Some(paragraph) => {
                    let existing = paragraph.runs.first().map(|r| r.char_shape);
                    paragraph.set_text(value, existing.unwrap_or(char_shape));
                },
                None => {
                    // a mapped empty cell gains its single paragraph
                    let mut paragraph = Paragraph::new(
                        cell_ref.map(|r| r.style).unwrap_or(0),
                        cell_ref.map(|r| r.para_shape).unwrap_or(0),
                    );
                    paragraph.set_text(value, char_shape);
                    cell.blocks.push(Block::Paragraph(paragraph));
                },
            }
        }
    }
}

fn content_kind(content: &SectionContent) -> &'static str {
    match content {
        SectionContent::Text(_) => "text",
        SectionContent::Table(_) => "table",
        SectionContent::Image { .. } => "image",
    }
}

/// The grid must match the declared table topology exactly: no implicit
/// resizing, no truncation, no padding.
fn check_shape(
    path: &BlockPath,
    table: &Table,
    grid: &[Vec<String>],
) -> std::result::Result<(), InjectionError> {
    let content_rows = grid.len();
    let content_cols = grid.iter().map(Vec::len).max().unwrap_or(0);
    let uniform = grid.iter().all(|row| row.len() == content_cols);
    if content_rows != table.rows as usize || content_cols != table.cols as usize || !uniform {
        return Err(InjectionError::ShapeMismatch {
            path: path.to_string(),
            target_rows: table.rows as usize,
            target_cols: table.cols as usize,
            content_rows,
            content_cols,
        });
    }
    Ok(())
}
