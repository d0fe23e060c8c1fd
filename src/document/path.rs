//! Stable block addresses.
//!
//! A position path names a block by section index and block index, descending
//! through table cells where needed. The textual form is
//! `<section>/<block>`, extended with `/<row>.<col>/<block>` per nesting
//! level, e.g. `0/3/1.2/0`: section 0, block 3 (a table), cell at row 1
//! column 2, block 0 inside that cell.

use std::fmt;
use std::str::FromStr;

/// One step below the section level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// Index into the current block list
    Block(usize),
    /// Descend into a table cell addressed by its anchor coordinates
    Cell { row: u16, col: u16 },
}

/// A stable address of a block within a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockPath {
    pub section: usize,
    pub steps: Vec<PathStep>,
}

impl BlockPath {
    /// Address a top-level block.
    pub fn block(section: usize, block: usize) -> Self {
        Self {
            section,
            steps: vec![PathStep::Block(block)],
        }
    }

    /// Extend this path into a table cell.
    pub fn cell(&self, row: u16, col: u16) -> Self {
        let mut steps = self.steps.clone();
        steps.push(PathStep::Cell { row, col });
        Self {
            section: self.section,
            steps,
        }
    }

    /// Extend this path with a nested block index.
    pub fn child(&self, block: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push(PathStep::Block(block));
        Self {
            section: self.section,
            steps,
        }
    }
}

impl fmt::Display for BlockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.section)?;
        for step in &self.steps {
            match step {
                PathStep::Block(i) => write!(f, "/{}", i)?,
                PathStep::Cell { row, col } => write!(f, "/{}.{}", row, col)?,
            }
        }
        Ok(())
    }
}

/// Error parsing a textual position path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePathError(pub String);

impl fmt::Display for ParsePathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid position path: {}", self.0)
    }
}

impl std::error::Error for ParsePathError {}

impl FromStr for BlockPath {
    type Err = ParsePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let section = parts
            .next()
            .and_then(|p| p.parse::<usize>().ok())
            .ok_or_else(|| ParsePathError(s.to_string()))?;

        let mut steps = Vec::new();
        for part in parts {
            if let Some((row, col)) = part.split_once('.') {
                let row = row
                    .parse::<u16>()
                    .map_err(|_| ParsePathError(s.to_string()))?;
                let col = col
                    .parse::<u16>()
                    .map_err(|_| ParsePathError(s.to_string()))?;
                steps.push(PathStep::Cell { row, col });
            } else {
                let idx = part
                    .parse::<usize>()
                    .map_err(|_| ParsePathError(s.to_string()))?;
                steps.push(PathStep::Block(idx));
            }
        }

        if steps.is_empty() {
            return Err(ParsePathError(s.to_string()));
        }

        Ok(Self { section, steps })
    }
}
