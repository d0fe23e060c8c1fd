//! HWPX (ZIP+XML) reader and writer.
//!
//! The modern container is a ZIP package: a `mimetype` marker entry, a
//! manifest (`Contents/content.hpf`), the style tables in
//! `Contents/header.xml` and one `Contents/section{N}.xml` per section.
//! Linear measurements use the same 1/7200-inch base unit as the binary
//! format, so style profiles from either format are numerically comparable.
//!
//! # Example
//!
//! ```rust,no_run
//! use yuja::hwpx::{HwpxReader, HwpxWriter};
//!
//! let bytes = std::fs::read("template.hwpx")?;
//! let doc = HwpxReader::open(&bytes)?.document()?;
//! let rewritten = HwpxWriter::to_bytes(&doc)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod container;
pub mod header;
pub mod section;
pub mod writer;

pub use container::HwpxContainer;
pub use writer::HwpxWriter;

use crate::common::error::FormatError;
use crate::document::Document;
use quick_xml::events::BytesStart;

/// Read an attribute by local name, unescaped.
pub(crate) fn attr(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return attr.unescape_value().ok().map(|v| v.into_owned());
        }
    }
    None
}

/// Reader for the XML container format.
pub struct HwpxReader {
    container: HwpxContainer,
}

impl HwpxReader {
    /// Open a package, verifying the MIME marker.
    pub fn open(bytes: &[u8]) -> Result<Self, FormatError> {
        Ok(Self {
            container: HwpxContainer::open(bytes)?,
        })
    }

    /// The underlying container.
    pub fn container(&self) -> &HwpxContainer {
        &self.container
    }

    /// Decode the whole package into a [`Document`].
    pub fn document(&self) -> Result<Document, FormatError> {
        let mut doc = Document::default();

        let header_xml = self
            .container
            .member(container::HEADER_XML)
            .ok_or_else(|| FormatError::ComponentNotFound(container::HEADER_XML.to_string()))?;
        header::parse_header(header_xml, &mut doc.styles)?;

        for name in self.container.sections() {
            let xml = self
                .container
                .member(name)
                .ok_or_else(|| FormatError::ComponentNotFound(name.clone()))?;
            doc.sections.push(section::parse_section(xml)?);
        }

        if doc.sections.is_empty() {
            return Err(FormatError::ComponentNotFound(
                "no section parts in manifest spine".to_string(),
            ));
        }

        for name in self.container.member_names() {
            if name.starts_with("BinData/") {
                if let Some(data) = self.container.member(name) {
                    doc.bin_data.insert(name.to_string(), data.to_vec());
                }
            }
        }

        Ok(doc)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::document::{Document, Section};

    /// A document exercising styles, tables, markers and images.
    pub(crate) fn sample_document() -> Document {
        let mut doc = Document {
            sections: vec![
                section::tests::sample_section(),
                Section::default(),
            ],
            styles: header::tests::sample_styles(),
            ..Default::default()
        };
        doc.bin_data.insert(
            "BinData/BIN0001.png".to_string(),
            b"\x89PNG\r\n\x1a\n fake image payload".to_vec(),
        );
        doc
    }

    #[test]
    fn test_package_round_trip() {
        let doc = sample_document();
        let bytes = HwpxWriter::to_bytes(&doc).unwrap();
        let reread = HwpxReader::open(&bytes).unwrap().document().unwrap();
        assert_eq!(reread, doc);
        assert_eq!(doc.structural_diff(&reread), None);
    }

    #[test]
    fn test_double_round_trip_is_stable() {
        let doc = sample_document();
        let once = HwpxWriter::to_bytes(&doc).unwrap();
        let reread = HwpxReader::open(&once).unwrap().document().unwrap();
        let twice = HwpxWriter::to_bytes(&reread).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_header_part() {
        // Build a package, then drop header.xml by rebuilding without it.
        let doc = sample_document();
        let bytes = HwpxWriter::to_bytes(&doc).unwrap();
        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(&bytes[..])).unwrap();
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).unwrap();
            if entry.name() != container::HEADER_XML {
                writer.raw_copy_file(entry).unwrap();
            }
        }
        let stripped = writer.finish().unwrap().into_inner();

        let reader = HwpxReader::open(&stripped).unwrap();
        assert!(matches!(
            reader.document(),
            Err(FormatError::ComponentNotFound(_))
        ));
    }
}
