//! Binary HWP 5.x reader.
//!
//! The legacy format is an OLE2 compound file whose streams hold
//! record-tagged binary data, raw-deflate compressed when the header says so.
//! `FileHeader` carries the signature and properties, `DocInfo` the global
//! style tables, and `BodyText/Section{N}` one stream per section.
//!
//! # Example
//!
//! ```rust,no_run
//! use yuja::hwp::HwpReader;
//!
//! let bytes = std::fs::read("template.hwp")?;
//! let reader = HwpReader::open(bytes)?;
//! let doc = reader.document()?;
//! println!("{} sections", doc.sections.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod body;
pub mod consts;
pub mod docinfo;
pub mod file;
pub mod header;
pub mod record;

pub use file::CompoundFile;
pub use header::{DocumentProperties, FileHeader};

use crate::common::error::FormatError;
use crate::document::Document;

/// Reader for the binary container format.
pub struct HwpReader {
    file: CompoundFile,
    header: FileHeader,
}

impl HwpReader {
    /// Open a binary document from owned bytes.
    ///
    /// Verifies the compound-file structure and the `FileHeader` stream;
    /// encrypted, DRM-protected and distribution documents are rejected here,
    /// before any record decode.
    pub fn open(data: Vec<u8>) -> Result<Self, FormatError> {
        let file = CompoundFile::open(data)?;
        let header_stream = file.open_stream("FileHeader")?;
        let header = FileHeader::parse(&header_stream)?;
        Ok(Self { file, header })
    }

    /// The parsed `FileHeader`.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Paths of all streams in the container.
    pub fn list_streams(&self) -> Vec<String> {
        self.file.list_streams()
    }

    /// Raw bytes of a stream, inflated when the container is compressed.
    ///
    /// `BinData/` streams store their payload as-is and are exempt from the
    /// container-level compression flag.
    pub fn stream(&self, path: &str) -> Result<Vec<u8>, FormatError> {
        let raw = self.file.open_stream(path)?;
        if self.header.is_compressed() && !path.starts_with("BinData/") {
            record::inflate_stream(path, &raw)
        } else {
            Ok(raw)
        }
    }

    /// Decode the whole container into a [`Document`].
    pub fn document(&self) -> Result<Document, FormatError> {
        let mut doc = Document::default();

        if self.file.has_stream("DocInfo") {
            let data = self.stream("DocInfo")?;
            let records = record::parse_records("DocInfo", &data)?;
            docinfo::parse_docinfo(&records, &mut doc.styles);
        }

        let mut index = 0usize;
        loop {
            let name = format!("BodyText/Section{}", index);
            if !self.file.has_stream(&name) {
                break;
            }
            let data = self.stream(&name)?;
            let records = record::parse_records(&name, &data)?;
            let tree = record::build_tree(records);
            doc.sections.push(body::parse_section(&tree, &doc.styles));
            index += 1;
        }

        if doc.sections.is_empty() {
            return Err(FormatError::ComponentNotFound(
                "BodyText/Section0".to_string(),
            ));
        }

        for item in &doc.styles.bin_data {
            let name = item.member_name();
            if self.file.has_stream(&name) {
                doc.bin_data.insert(name.clone(), self.file.open_stream(&name)?);
            }
        }

        Ok(doc)
    }
}
