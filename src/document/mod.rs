//! Format-neutral document model.
//!
//! Both readers produce this representation and the writer consumes it, so a
//! document can be read from either container format, transformed, and
//! re-serialized without the transformation code knowing where it came from.
//!
//! # Example
//!
//! ```rust,no_run
//! let doc = yuja::open("template.hwpx")?;
//! for (i, section) in doc.sections.iter().enumerate() {
//!     println!("section {}: {} blocks", i, section.blocks.len());
//! }
//! println!("{}", doc.text());
//! # Ok::<(), yuja::common::Error>(())
//! ```

pub mod path;
pub mod styles;
pub mod table;

pub use path::{BlockPath, PathStep};
pub use styles::StyleTable;
pub use table::{Cell, Table};

use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Page geometry of a section, in HWPUNIT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageGeometry {
    pub width: u32,
    pub height: u32,
    pub margin_left: u32,
    pub margin_right: u32,
    pub margin_top: u32,
    pub margin_bottom: u32,
    pub margin_header: u32,
    pub margin_footer: u32,
    pub margin_gutter: u32,
    pub landscape: bool,
}

impl Default for PageGeometry {
    fn default() -> Self {
        // A4 portrait with the stock hangul word-processor margins
        Self {
            width: 59528,
            height: 84188,
            margin_left: 8504,
            margin_right: 8504,
            margin_top: 5668,
            margin_bottom: 4252,
            margin_header: 4252,
            margin_footer: 4252,
            margin_gutter: 0,
            landscape: false,
        }
    }
}

/// Typed structural markers inside paragraph text.
///
/// These occupy positions in the text stream of the source formats but are
/// never literal characters; substitution logic must treat them as opaque so
/// a text replacement cannot corrupt one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMarker {
    Tab,
    LineBreak,
    FieldStart,
    FieldEnd,
    NonBreakingSpace,
    FixedWidthSpace,
}

/// Content of a single run: literal text or one control marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunContent {
    Text(String),
    Marker(ControlMarker),
}

/// A run of characters sharing one character shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub char_shape: u32,
    pub content: RunContent,
}

impl Run {
    pub fn text(char_shape: u32, text: impl Into<String>) -> Self {
        Self {
            char_shape,
            content: RunContent::Text(text.into()),
        }
    }

    pub fn marker(char_shape: u32, marker: ControlMarker) -> Self {
        Self {
            char_shape,
            content: RunContent::Marker(marker),
        }
    }
}

/// A paragraph: an ordered run sequence referencing shared styles by id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Paragraph {
    /// Named style id in the document's style table.
    pub style: u16,
    /// Paragraph shape id.
    pub para_shape: u32,
    pub runs: SmallVec<[Run; 4]>,
}

impl Paragraph {
    pub fn new(style: u16, para_shape: u32) -> Self {
        Self {
            style,
            para_shape,
            runs: SmallVec::new(),
        }
    }

    /// Logical text content: the concatenation of run texts, with markers
    /// rendered as their display character where one exists.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            match &run.content {
                RunContent::Text(t) => out.push_str(t),
                RunContent::Marker(ControlMarker::Tab) => out.push('\t'),
                RunContent::Marker(ControlMarker::LineBreak) => out.push('\n'),
                RunContent::Marker(ControlMarker::NonBreakingSpace) => out.push('\u{00A0}'),
                RunContent::Marker(ControlMarker::FixedWidthSpace) => out.push(' '),
                RunContent::Marker(_) => {},
            }
        }
        out
    }

    /// Replace the paragraph's runs with the given text under one character
    /// shape. Embedded newlines become line-break markers, never new blocks.
    pub fn set_text(&mut self, text: &str, char_shape: u32) {
        self.runs.clear();
        let mut first = true;
        for line in text.split('\n') {
            if !first {
                self.runs
                    .push(Run::marker(char_shape, ControlMarker::LineBreak));
            }
            first = false;
            if !line.is_empty() {
                self.runs.push(Run::text(char_shape, line));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text().trim().is_empty()
    }
}

/// An inline image anchored in the block flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Member name of the binary payload (e.g. `BinData/BIN0001.png`).
    pub bin_item: String,
    /// Display extent in HWPUNIT.
    pub width: u32,
    pub height: u32,
    pub caption: Option<String>,
}

/// A block: the tagged unit of section content.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    Image(Image),
}

impl Block {
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Paragraph(_) => "paragraph",
            Block::Table(_) => "table",
            Block::Image(_) => "image",
        }
    }

    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Block::Table(t) => Some(t),
            _ => None,
        }
    }
}

/// A section: page geometry plus an ordered block sequence.
///
/// Sections are append-only once loaded and are never reordered by any
/// engine stage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Section {
    pub page: PageGeometry,
    pub blocks: Vec<Block>,
}

/// The root document entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub sections: Vec<Section>,
    pub styles: StyleTable,
    /// Embedded binary payloads keyed by member name.
    pub bin_data: BTreeMap<String, Vec<u8>>,
}

impl Document {
    /// Resolve a position path to a block, if it still exists.
    pub fn resolve(&self, path: &BlockPath) -> Option<&Block> {
        let section = self.sections.get(path.section)?;
        let mut blocks: &[Block] = &section.blocks;
        let mut steps = path.steps.iter().peekable();

        while let Some(step) = steps.next() {
            match step {
                PathStep::Block(i) => {
                    if steps.peek().is_none() {
                        return blocks.get(*i);
                    }
                    match steps.next() {
                        Some(PathStep::Cell { row, col }) => {
                            let table = blocks.get(*i)?.as_table()?;
                            let cell = table.cell_at(*row, *col)?;
                            blocks = &cell.blocks;
                        },
                        _ => return None,
                    }
                },
                PathStep::Cell { .. } => return None, // cell step must follow a block step
            }
        }
        None
    }

    /// Mutable variant of [`Document::resolve`].
    pub fn resolve_mut(&mut self, path: &BlockPath) -> Option<&mut Block> {
        let section = self.sections.get_mut(path.section)?;
        let mut blocks: &mut Vec<Block> = &mut section.blocks;
        let mut steps = path.steps.iter().peekable();

        while let Some(step) = steps.next() {
            match step {
                PathStep::Block(i) => {
                    if steps.peek().is_none() {
                        return blocks.get_mut(*i);
                    }
                    // descend: the next step addresses a cell of this table
                    match steps.next() {
                        Some(PathStep::Cell { row, col }) => {
                            let table = match blocks.get_mut(*i)? {
                                Block::Table(t) => t,
                                _ => return None,
                            };
                            let cell = table.cell_at_mut(*row, *col)?;
                            blocks = &mut cell.blocks;
                        },
                        _ => return None,
                    }
                },
                PathStep::Cell { .. } => return None, // cell step must follow a block step
            }
        }
        None
    }

    /// Full text of the document (paragraph text joined by newlines,
    /// skipping blank paragraphs).
    pub fn text(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            for block in &section.blocks {
                collect_block_text(block, &mut out);
            }
        }
        out
    }

    /// First structural divergence from another document, as a human-readable
    /// position, or `None` when the trees are structurally equal.
    pub fn structural_diff(&self, other: &Document) -> Option<String> {
        if self.styles != other.styles {
            return Some("style table differs".to_string());
        }
        if self.sections.len() != other.sections.len() {
            return Some(format!(
                "section count differs: {} vs {}",
                self.sections.len(),
                other.sections.len()
            ));
        }
        for (si, (a, b)) in self.sections.iter().zip(&other.sections).enumerate() {
            if a.page != b.page {
                return Some(format!("page geometry differs in section {}", si));
            }
            if a.blocks.len() != b.blocks.len() {
                return Some(format!(
                    "block count differs in section {}: {} vs {}",
                    si,
                    a.blocks.len(),
                    b.blocks.len()
                ));
            }
            for (bi, (ba, bb)) in a.blocks.iter().zip(&b.blocks).enumerate() {
                if ba != bb {
                    return Some(format!("block {} differs", BlockPath::block(si, bi)));
                }
            }
        }
        if self.bin_data != other.bin_data {
            return Some("embedded binary data differs".to_string());
        }
        None
    }
}

fn collect_block_text(block: &Block, out: &mut String) {
    match block {
        Block::Paragraph(p) => {
            let text = p.text();
            if !text.trim().is_empty() {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&text);
            }
        },
        Block::Table(t) => {
            for cell in &t.cells {
                for inner in &cell.blocks {
                    collect_block_text(inner, out);
                }
            }
        },
        Block::Image(_) => {},
    }
}
