//! ZIP package access and the OPF manifest.
//!
//! An HWPX file is a ZIP archive whose first entry is an uncompressed
//! `mimetype` marker. `META-INF/container.xml` points at the package
//! manifest `Contents/content.hpf`, whose spine fixes section order.

use crate::common::detection::HWPX_MIMETYPE;
use crate::common::error::FormatError;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

/// Path of the package manifest inside the archive.
pub const CONTENT_HPF: &str = "Contents/content.hpf";
/// Path of the style-table part.
pub const HEADER_XML: &str = "Contents/header.xml";

/// An opened HWPX package: member bytes plus the manifest's section spine.
pub struct HwpxContainer {
    members: BTreeMap<String, Vec<u8>>,
    /// Section part names in spine order.
    sections: Vec<String>,
}

impl HwpxContainer {
    /// Open a package from bytes, verifying the MIME marker entry.
    pub fn open(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

        // The marker must be the archive's first entry.
        {
            let mut first = archive.by_index(0)?;
            if first.name() != "mimetype" {
                return Err(FormatError::BadSignature(
                    "first archive entry is not the mimetype marker".to_string(),
                ));
            }
            let mut marker = String::new();
            first.read_to_string(&mut marker)?;
            if marker != HWPX_MIMETYPE {
                return Err(FormatError::BadSignature(format!(
                    "unexpected MIME marker '{}'",
                    marker.trim()
                )));
            }
        }

        let mut members = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            members.insert(entry.name().to_string(), data);
        }

        let manifest = members
            .get(CONTENT_HPF)
            .ok_or_else(|| FormatError::ComponentNotFound(CONTENT_HPF.to_string()))?;
        let sections = parse_manifest(manifest)?;

        Ok(Self { members, sections })
    }

    /// Bytes of a member file, if present.
    pub fn member(&self, name: &str) -> Option<&[u8]> {
        self.members.get(name).map(Vec::as_slice)
    }

    /// Member file names.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Section part names in spine order.
    pub fn sections(&self) -> &[String] {
        &self.sections
    }
}

/// Parse `content.hpf`: manifest items keyed by id, ordered by the spine.
fn parse_manifest(xml: &[u8]) -> Result<Vec<String>, FormatError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::with_capacity(1024);
    let mut items: BTreeMap<String, String> = BTreeMap::new();
    let mut spine: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.local_name().as_ref() {
                    b"item" => {
                        let mut id = None;
                        let mut href = None;
                        for attr in e.attributes().flatten() {
                            match attr.key.local_name().as_ref() {
                                b"id" => id = attr.unescape_value().ok().map(|v| v.into_owned()),
                                b"href" => {
                                    href = attr.unescape_value().ok().map(|v| v.into_owned())
                                },
                                _ => {},
                            }
                        }
                        if let (Some(id), Some(href)) = (id, href) {
                            items.insert(id, href);
                        }
                    },
                    b"itemref" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"idref" {
                                if let Ok(idref) = attr.unescape_value() {
                                    spine.push(idref.into_owned());
                                }
                            }
                        }
                    },
                    _ => {},
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(FormatError::Xml(e.to_string())),
            _ => {},
        }
        buf.clear();
    }

    let mut sections = Vec::with_capacity(spine.len());
    for idref in spine {
        match items.get(&idref) {
            Some(href) => sections.push(href.clone()),
            None => {
                return Err(FormatError::Xml(format!(
                    "spine references unknown manifest item '{}'",
                    idref
                )));
            },
        }
    }
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::write::SimpleFileOptions;

    pub(crate) fn minimal_package(mimetype: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file("mimetype", stored).unwrap();
        std::io::Write::write_all(&mut writer, mimetype.as_bytes()).unwrap();

        let deflated = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        writer.start_file(CONTENT_HPF, deflated).unwrap();
        std::io::Write::write_all(
            &mut writer,
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<opf:package xmlns:opf="http://www.idpf.org/2007/opf/">
<opf:manifest>
<opf:item id="header" href="Contents/header.xml" media-type="application/xml"/>
<opf:item id="section0" href="Contents/section0.xml" media-type="application/xml"/>
</opf:manifest>
<opf:spine><opf:itemref idref="section0"/></opf:spine>
</opf:package>"#,
        )
        .unwrap();

        writer
            .finish()
            .unwrap()
            .into_inner()
    }

    #[test]
    fn test_open_and_spine() {
        let bytes = minimal_package(HWPX_MIMETYPE);
        let container = HwpxContainer::open(&bytes).unwrap();
        assert_eq!(container.sections(), ["Contents/section0.xml"]);
        assert!(container.member(CONTENT_HPF).is_some());
    }

    #[test]
    fn test_wrong_mimetype_rejected() {
        let bytes = minimal_package("application/epub+zip");
        assert!(matches!(
            HwpxContainer::open(&bytes),
            Err(FormatError::BadSignature(_))
        ));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(HwpxContainer::open(b"not a zip at all").is_err());
    }
}
