//! Yuja - a Rust library for hangul word-processor document formats
//!
//! This library reads, models and rewrites the two HWP document formats:
//! the legacy binary OLE2 compound-file format and the modern HWPX ZIP+XML
//! package. On top of the format layer it provides a format-preserving
//! report-generation engine: style-profile extraction, in-place content
//! injection into templates, validation, and verified serialization.
//!
//! # Features
//!
//! - **Binary reader**: OLE2 container, compressed record streams, style
//!   tables, body text, tables, embedded images
//! - **HWPX reader/writer**: ZIP+XML package with structural round-trip
//! - **Unified document model**: one tree shared by both formats
//! - **Style profiles**: portable role-keyed snapshots of a template's look
//! - **Injection engine**: fills mapped positions without touching the
//!   template's structure, styles or numbering
//! - **Validator**: completeness, style and table-arithmetic checks
//! - **Output pipeline**: backup, versioned outputs, bounded write-verify
//!   retry
//!
//! # Example - Reading a document
//!
//! ```no_run
//! // Open either format - detected from the bytes
//! let doc = yuja::open("template.hwp")?;
//! println!("sections: {}", doc.sections.len());
//! println!("{}", doc.text());
//! # Ok::<(), yuja::common::Error>(())
//! ```
//!
//! # Example - Template injection
//!
//! ```no_run
//! use yuja::document::BlockPath;
//! use yuja::inject::{InjectionMapping, MappingEntry, SectionContent};
//! use yuja::output::OutputPipeline;
//! use yuja::profile::{ClassifierConfig, extract_profile};
//! use std::path::Path;
//!
//! let template_path = Path::new("양식.hwpx");
//! OutputPipeline::backup_template(template_path)?;
//!
//! let template = yuja::open(template_path)?;
//! let profile = extract_profile(&template, "양식.hwpx", &ClassifierConfig::default());
//!
//! let mapping = InjectionMapping {
//!     entries: vec![MappingEntry {
//!         section_key: "overview".to_string(),
//!         target: BlockPath::block(0, 2),
//!         content: SectionContent::Text("사업 개요 본문".to_string()),
//!         role: None,
//!     }],
//! };
//!
//! let pipeline = OutputPipeline::new(&template, &profile);
//! let outcome = pipeline.run(&mapping, Path::new("결과.hwpx"))?;
//! println!("written after {} attempt(s)", outcome.attempts);
//! # Ok::<(), yuja::common::Error>(())
//! ```

/// Shared infrastructure: binary readers, detection, errors, units.
pub mod common;

/// Format-neutral document model shared by readers, writers and the
/// injection engine.
pub mod document;

/// Binary HWP 5.x container and record decoding.
pub mod hwp;

/// HWPX (ZIP+XML) container reading and writing.
pub mod hwpx;

/// Content injection into template documents.
pub mod inject;

/// Backup, versioning and verified serialization.
pub mod output;

/// Style-profile extraction.
pub mod profile;

/// Post-injection validation.
pub mod validate;

pub use common::{Error, FormatError, InjectionError, Result};
pub use document::Document;

use common::detection::{DocumentKind, detect};
use std::path::Path;

/// Open a document from a file path, auto-detecting the container format.
///
/// Probe order: binary compound-file signature first, then ZIP package with
/// the HWPX MIME marker.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Document> {
    let bytes = std::fs::read(path)?;
    open_bytes(bytes)
}

/// Open a document from owned bytes, auto-detecting the container format.
pub fn open_bytes(bytes: Vec<u8>) -> Result<Document> {
    match detect(&bytes)? {
        DocumentKind::HwpBinary => Ok(hwp::HwpReader::open(bytes)?.document()?),
        DocumentKind::Hwpx => Ok(hwpx::HwpxReader::open(&bytes)?.document()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::BlockPath;
    use crate::hwpx::HwpxWriter;
    use crate::inject::{InjectionMapping, MappingEntry, SectionContent};
    use crate::output::OutputPipeline;
    use crate::profile::{ClassifierConfig, extract_profile};
    use crate::validate::validate;

    #[test]
    fn test_open_bytes_auto_detects_binary() {
        let bytes = crate::hwp::tests::container_bytes(true);
        let doc = open_bytes(bytes).unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert!(doc.text().contains("개요"));
    }

    #[test]
    fn test_open_bytes_auto_detects_hwpx() {
        let source = crate::hwpx::tests::sample_document();
        let bytes = HwpxWriter::to_bytes(&source).unwrap();
        let doc = open_bytes(bytes).unwrap();
        assert_eq!(doc, source);
    }

    #[test]
    fn test_open_bytes_rejects_unknown() {
        assert!(matches!(
            open_bytes(b"%PDF-1.7 garbage".to_vec()),
            Err(Error::Format(FormatError::BadSignature(_)))
        ));
    }

    /// Full cycle: read a binary template, serialize as HWPX, re-open,
    /// extract a profile, inject a table, write with verification, validate.
    #[test]
    fn test_binary_to_hwpx_injection_cycle() {
        let dir = tempfile::tempdir().unwrap();

        // the binary template carries one paragraph and a 2x2 table
        let template = open_bytes(crate::hwp::tests::container_bytes(true)).unwrap();
        let template_path = dir.path().join("양식.hwpx");
        HwpxWriter::write(&template, &template_path).unwrap();

        let backup = OutputPipeline::backup_template(&template_path).unwrap();
        assert!(backup.exists());

        let reopened = open(&template_path).unwrap();
        assert_eq!(reopened, template);

        let profile = extract_profile(&reopened, "양식.hwpx", &ClassifierConfig::default());
        let mapping = InjectionMapping {
            entries: vec![MappingEntry {
                section_key: "status".to_string(),
                target: BlockPath::block(0, 1),
                content: SectionContent::Table(vec![
                    vec!["항목".to_string(), "값".to_string()],
                    vec!["직원수".to_string(), "24".to_string()],
                ]),
                role: None,
            }],
        };

        let out_path = dir.path().join("결과.hwpx");
        let pipeline = OutputPipeline::new(&reopened, &profile);
        let outcome = pipeline.run(&mapping, &out_path).unwrap();
        assert_eq!(outcome.attempts, 1);

        let produced = open(&out_path).unwrap();
        let table = produced
            .resolve(&BlockPath::block(0, 1))
            .unwrap()
            .as_table()
            .unwrap();
        assert_eq!(table.cell_at(1, 1).unwrap().text(), "24");

        let report = validate(&produced, &profile, &mapping);
        assert!(report.is_clean(), "findings: {:?}", report);
    }
}
