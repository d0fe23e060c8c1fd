//! Document → HWPX package bytes.
//!
//! The `mimetype` marker is written first and uncompressed; every other
//! member is deflated. The manifest is regenerated from the actual member
//! set, so dropping or adding binary items never desynchronizes it.

use super::container::{CONTENT_HPF, HEADER_XML};
use super::{header, section};
use crate::common::detection::HWPX_MIMETYPE;
use crate::common::error::FormatError;
use crate::document::Document;
use std::fmt::Write as FmtWrite;
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Serializer for the XML container format.
pub struct HwpxWriter;

impl HwpxWriter {
    /// Serialize a document to HWPX bytes.
    pub fn to_bytes(doc: &Document) -> Result<Vec<u8>, FormatError> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        // marker entry: first, uncompressed
        zip.start_file("mimetype", stored)?;
        zip.write_all(HWPX_MIMETYPE.as_bytes())?;

        zip.start_file("version.xml", deflated)?;
        zip.write_all(version_xml().as_bytes())?;

        zip.start_file("META-INF/container.xml", deflated)?;
        zip.write_all(container_xml().as_bytes())?;

        let section_names: Vec<String> = (0..doc.sections.len())
            .map(|i| format!("Contents/section{}.xml", i))
            .collect();

        zip.start_file(CONTENT_HPF, deflated)?;
        zip.write_all(manifest_xml(doc, &section_names).as_bytes())?;

        zip.start_file(HEADER_XML, deflated)?;
        zip.write_all(header::write_header(&doc.styles, doc.sections.len()).as_bytes())?;

        for (name, sec) in section_names.iter().zip(&doc.sections) {
            zip.start_file(name.as_str(), deflated)?;
            zip.write_all(section::write_section(sec).as_bytes())?;
        }

        for (name, data) in &doc.bin_data {
            zip.start_file(name.as_str(), deflated)?;
            zip.write_all(data)?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    /// Serialize and write to a file.
    pub fn write<P: AsRef<std::path::Path>>(doc: &Document, path: P) -> Result<(), FormatError> {
        let bytes = Self::to_bytes(doc)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

fn version_xml() -> String {
    concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<hv:HCFVersion xmlns:hv="http://www.hancom.co.kr/hwpml/2011/version" "#,
        r#"tagetApplication="WORDPROCESSOR" major="5" minor="1" micro="1" buildNumber="0" "#,
        r#"os="10" xmlVersion="1.4" application="yuja"/>"#
    )
    .to_string()
}

fn container_xml() -> String {
    concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<ocf:container xmlns:ocf="urn:oasis:names:tc:opendocument:xmlns:container">"#,
        r#"<ocf:rootfiles><ocf:rootfile full-path="Contents/content.hpf" "#,
        r#"media-type="application/hwpml-package+xml"/></ocf:rootfiles></ocf:container>"#
    )
    .to_string()
}

/// OPF manifest listing the actual member set, spine in section order.
fn manifest_xml(doc: &Document, section_names: &[String]) -> String {
    let mut xml = String::with_capacity(1024);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<opf:package xmlns:opf="http://www.idpf.org/2007/opf/" version="1.0">"#);
    xml.push_str("<opf:manifest>");
    let _ = write!(
        xml,
        r#"<opf:item id="header" href="{}" media-type="application/xml"/>"#,
        HEADER_XML
    );
    for (i, name) in section_names.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<opf:item id="section{}" href="{}" media-type="application/xml"/>"#,
            i, name
        );
    }
    for name in doc.bin_data.keys() {
        let _ = write!(
            xml,
            r#"<opf:item id="{}" href="{}" media-type="application/octet-stream"/>"#,
            name.replace('/', "_"),
            name
        );
    }
    xml.push_str("</opf:manifest><opf:spine>");
    for i in 0..section_names.len() {
        let _ = write!(xml, r#"<opf:itemref idref="section{}"/>"#, i);
    }
    xml.push_str("</opf:spine></opf:package>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::detection::{DocumentKind, detect};
    use crate::document::{Document, Section};

    #[test]
    fn test_output_is_zip_with_stored_mimetype() {
        let doc = Document {
            sections: vec![Section::default()],
            ..Default::default()
        };
        let bytes = HwpxWriter::to_bytes(&doc).unwrap();
        assert_eq!(detect(&bytes).unwrap(), DocumentKind::Hwpx);

        let mut archive = zip::ZipArchive::new(Cursor::new(&bytes[..])).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let doc = Document {
            sections: vec![Section::default()],
            ..Default::default()
        };
        assert_eq!(
            HwpxWriter::to_bytes(&doc).unwrap(),
            HwpxWriter::to_bytes(&doc).unwrap()
        );
    }
}
