//! Output pipeline: backup, serialization, read-back verification, retry.
//!
//! Before a template is first modified its original bytes are copied to a
//! sibling backup path; the pipeline refuses to proceed when that write
//! fails. After serialization the output is read back and structurally
//! compared against the intended document; a mismatch re-runs the
//! injection+serialize cycle up to a bounded number of attempts. A prior
//! output at the final path is renamed to a versioned filename, never
//! overwritten in place.

use crate::common::error::{Error, FormatError, InjectionError, Result};
use crate::document::Document;
use crate::hwpx::{HwpxReader, HwpxWriter};
use crate::inject::{InjectionEngine, InjectionMapping};
use crate::profile::StyleProfile;
use std::path::{Path, PathBuf};

/// Pipeline tuning knobs.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Total injection+serialize+verify attempts before giving up.
    pub max_attempts: u32,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub path: PathBuf,
    /// Attempts consumed, counting the successful one.
    pub attempts: u32,
    /// Where a pre-existing prior output was moved, if there was one.
    pub versioned: Option<PathBuf>,
}

/// The write side of the engine: ties injection, serialization and
/// verification together.
pub struct OutputPipeline<'a> {
    template: &'a Document,
    profile: &'a StyleProfile,
    options: OutputOptions,
}

impl<'a> OutputPipeline<'a> {
    pub fn new(template: &'a Document, profile: &'a StyleProfile) -> Self {
        Self {
            template,
            profile,
            options: OutputOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OutputOptions) -> Self {
        self.options = options;
        self
    }

    /// Copy the original template bytes to a sibling backup path.
    ///
    /// An existing backup is left alone: it holds the original from before
    /// the first modification, which is exactly what a backup is for.
    pub fn backup_template(template_path: &Path) -> Result<PathBuf> {
        let file_name = template_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::Format(FormatError::ComponentNotFound(
                    template_path.display().to_string(),
                ))
            })?;
        let backup_path = template_path.with_file_name(format!("{}.bak", file_name));
        if backup_path.exists() {
            return Ok(backup_path);
        }
        std::fs::copy(template_path, &backup_path)?;
        log::debug!("template backed up to {}", backup_path.display());
        Ok(backup_path)
    }

    /// Inject, serialize and write with read-back verification.
    pub fn run(&self, mapping: &InjectionMapping, output_path: &Path) -> Result<WriteOutcome> {
        self.run_with(mapping, output_path, |doc| HwpxWriter::to_bytes(doc))
    }

    /// Pipeline core, parameterized over the serializer so tests can force
    /// verification failures.
    fn run_with(
        &self,
        mapping: &InjectionMapping,
        output_path: &Path,
        serialize: impl Fn(&Document) -> std::result::Result<Vec<u8>, FormatError>,
    ) -> Result<WriteOutcome> {
        let engine = InjectionEngine::new(self.template, self.profile);
        let mut last_diff = String::new();

        for attempt in 1..=self.options.max_attempts.max(1) {
            // all mutation happens on a fresh tree, so retrying is free of
            // cleanup concerns
            let doc = engine.apply(mapping)?;
            let bytes = serialize(&doc).map_err(Error::Format)?;

            match verify_read_back(&bytes, &doc) {
                Ok(()) => {
                    let versioned = version_existing(output_path)?;
                    std::fs::write(output_path, &bytes)?;
                    return Ok(WriteOutcome {
                        path: output_path.to_path_buf(),
                        attempts: attempt,
                        versioned,
                    });
                },
                Err(diff) => {
                    log::warn!(
                        "read-back verification failed (attempt {}/{}): {}",
                        attempt,
                        self.options.max_attempts,
                        diff
                    );
                    last_diff = diff;
                },
            }
        }

        Err(InjectionError::VerificationFailed {
            attempts: self.options.max_attempts,
            diff: last_diff,
        }
        .into())
    }
}

/// Read the serialized bytes back and compare against the intended tree.
fn verify_read_back(bytes: &[u8], intended: &Document) -> std::result::Result<(), String> {
    let reread = HwpxReader::open(bytes)
        .and_then(|r| r.document())
        .map_err(|e| format!("read-back failed: {}", e))?;
    match intended.structural_diff(&reread) {
        None => Ok(()),
        Some(diff) => Err(diff),
    }
}

/// Move a pre-existing output aside as `<stem>_v{N}.<ext>`, N counting up
/// from the versions already present.
fn version_existing(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("hwpx");
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut next = 1u32;
    if let Ok(entries) = std::fs::read_dir(parent) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(rest) = name
                .strip_prefix(stem)
                .and_then(|r| r.strip_prefix("_v"))
                .and_then(|r| r.strip_suffix(&format!(".{}", ext)))
            else {
                continue;
            };
            if let Ok(n) = rest.parse::<u32>() {
                next = next.max(n + 1);
            }
        }
    }

    let versioned = parent.join(format!("{}_v{}.{}", stem, next, ext));
    std::fs::rename(path, &versioned)?;
    log::debug!("prior output moved to {}", versioned.display());
    Ok(Some(versioned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::path::BlockPath;
    use crate::inject::tests::template_and_profile;
    use crate::inject::{MappingEntry, SectionContent};

    fn mapping() -> InjectionMapping {
        InjectionMapping {
            entries: vec![MappingEntry {
                section_key: "overview".to_string(),
                target: BlockPath::block(0, 2),
                content: SectionContent::Text("완성된 본문".to_string()),
                role: None,
            }],
        }
    }

    #[test]
    fn test_backup_preserves_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("양식.hwpx");
        std::fs::write(&template, b"original template bytes").unwrap();

        let backup = OutputPipeline::backup_template(&template).unwrap();
        assert_eq!(backup, dir.path().join("양식.hwpx.bak"));
        assert_eq!(std::fs::read(&backup).unwrap(), b"original template bytes");

        // the working copy changes; the backup must not follow
        std::fs::write(&template, b"modified").unwrap();
        let again = OutputPipeline::backup_template(&template).unwrap();
        assert_eq!(again, backup);
        assert_eq!(std::fs::read(&backup).unwrap(), b"original template bytes");
    }

    #[test]
    fn test_backup_fails_without_template() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("없는양식.hwpx");
        assert!(OutputPipeline::backup_template(&missing).is_err());
    }

    #[test]
    fn test_successful_write_and_read_back() {
        let (doc, profile) = template_and_profile();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("결과.hwpx");

        let pipeline = OutputPipeline::new(&doc, &profile);
        let outcome = pipeline.run(&mapping(), &out).unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.versioned, None);

        let written = std::fs::read(&out).unwrap();
        let reread = HwpxReader::open(&written).unwrap().document().unwrap();
        assert_eq!(
            reread
                .resolve(&BlockPath::block(0, 2))
                .unwrap()
                .as_paragraph()
                .unwrap()
                .text(),
            "완성된 본문"
        );
    }

    #[test]
    fn test_prior_output_is_versioned_not_overwritten() {
        let (doc, profile) = template_and_profile();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("결과.hwpx");
        let pipeline = OutputPipeline::new(&doc, &profile);

        pipeline.run(&mapping(), &out).unwrap();
        let first_bytes = std::fs::read(&out).unwrap();

        let second = pipeline.run(&mapping(), &out).unwrap();
        assert_eq!(second.versioned, Some(dir.path().join("결과_v1.hwpx")));
        assert_eq!(std::fs::read(dir.path().join("결과_v1.hwpx")).unwrap(), first_bytes);

        let third = pipeline.run(&mapping(), &out).unwrap();
        assert_eq!(third.versioned, Some(dir.path().join("결과_v2.hwpx")));
    }

    #[test]
    fn test_three_verification_failures_then_error() {
        let (doc, profile) = template_and_profile();
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("양식.hwpx");
        std::fs::write(&template_path, b"pristine template").unwrap();
        let backup = OutputPipeline::backup_template(&template_path).unwrap();
        let out = dir.path().join("결과.hwpx");

        // serializer that always emits a different document than intended
        let attempts = std::cell::Cell::new(0u32);
        let corrupting = |intended: &Document| {
            attempts.set(attempts.get() + 1);
            let mut other = intended.clone();
            other.sections[0].blocks.pop();
            HwpxWriter::to_bytes(&other)
        };

        let pipeline = OutputPipeline::new(&doc, &profile);
        let err = pipeline
            .run_with(&mapping(), &out, corrupting)
            .unwrap_err();
        match err {
            Error::Injection(InjectionError::VerificationFailed { attempts: n, diff }) => {
                assert_eq!(n, 3);
                assert!(diff.contains("block count"), "diff: {}", diff);
            },
            other => panic!("expected VerificationFailed, got {}", other),
        }
        assert_eq!(attempts.get(), 3);
        assert!(!out.exists());
        // the original backup never moved
        assert_eq!(std::fs::read(&backup).unwrap(), b"pristine template");
    }
}
