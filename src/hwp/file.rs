//! OLE2/CFB compound-file reader.
//!
//! The binary HWP container is a compound file: a virtual filesystem of named
//! streams organized in storages. This reader parses the whole structure from
//! an owned byte buffer (documents are small enough that streaming sector
//! reads buy nothing) and exposes streams by `/`-joined path.

use crate::common::binary::{parse_utf16le_string, read_u16_le, read_u32_le};
use crate::common::detection::CFB_MAGIC;
use crate::common::error::FormatError;
use std::collections::BTreeMap;
use zerocopy::{FromBytes, LE, U16, U32, U64};
use zerocopy_derive::FromBytes as DeriveFromBytes;

const HEADER_SIZE: usize = 512;
const DIR_ENTRY_SIZE: usize = 128;
const DIFAT_IN_HEADER: usize = 109;

const ENTRY_TYPE_STORAGE: u8 = 1;
const ENTRY_TYPE_STREAM: u8 = 2;
const ENTRY_TYPE_ROOT: u8 = 5;

const SECT_END_OF_CHAIN: u32 = 0xFFFF_FFFE;
const SECT_FREE: u32 = 0xFFFF_FFFF;
const NO_SID: u32 = 0xFFFF_FFFF;

/// Raw on-disk directory entry (128 bytes).
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawDirectoryEntry {
    /// Entry name in UTF-16LE (64 bytes, null-padded)
    name: [u8; 64],
    /// Length of name in bytes, including the null terminator
    name_len: U16<LE>,
    entry_type: u8,
    node_color: u8,
    sid_left: U32<LE>,
    sid_right: U32<LE>,
    sid_child: U32<LE>,
    clsid: [u8; 16],
    state_bits: U32<LE>,
    creation_time: U64<LE>,
    modified_time: U64<LE>,
    start_sector: U32<LE>,
    stream_size: U64<LE>,
}

/// A parsed directory entry.
#[derive(Debug, Clone)]
struct DirEntry {
    name: String,
    entry_type: u8,
    sid_left: u32,
    sid_right: u32,
    sid_child: u32,
    start_sector: u32,
    size: u64,
}

/// A parsed compound file.
#[derive(Debug)]
pub struct CompoundFile {
    data: Vec<u8>,
    sector_size: usize,
    mini_sector_size: usize,
    mini_stream_cutoff: u32,
    fat: Vec<u32>,
    minifat: Vec<u32>,
    entries: Vec<DirEntry>,
    ministream: Vec<u8>,
    /// `/`-joined stream path → directory entry index
    paths: BTreeMap<String, usize>,
}

fn corrupt(reason: impl Into<String>) -> FormatError {
    FormatError::CorruptStream {
        stream: "<container>".to_string(),
        reason: reason.into(),
    }
}

impl CompoundFile {
    /// Parse a compound file from owned bytes.
    pub fn open(data: Vec<u8>) -> Result<Self, FormatError> {
        if data.len() < HEADER_SIZE {
            return Err(FormatError::BadSignature(
                "file smaller than a compound-file header".to_string(),
            ));
        }
        if &data[..CFB_MAGIC.len()] != CFB_MAGIC {
            return Err(FormatError::BadSignature(
                "missing compound-file magic".to_string(),
            ));
        }

        let byte_order = read_u16_le(&data, 0x1C).unwrap_or(0);
        if byte_order != 0xFFFE {
            return Err(FormatError::BadSignature(
                "compound file is not little-endian".to_string(),
            ));
        }

        let sector_shift = read_u16_le(&data, 0x1E).unwrap_or(0);
        if sector_shift != 9 && sector_shift != 12 {
            return Err(corrupt(format!("invalid sector shift {}", sector_shift)));
        }
        let mini_sector_shift = read_u16_le(&data, 0x20).unwrap_or(6);
        let sector_size = 1usize << sector_shift;
        let mini_sector_size = 1usize << mini_sector_shift;

        let num_fat_sectors = read_u32_le(&data, 0x2C).unwrap_or(0);
        let first_dir_sector = read_u32_le(&data, 0x30).unwrap_or(SECT_END_OF_CHAIN);
        let mini_stream_cutoff = read_u32_le(&data, 0x38).unwrap_or(4096);
        let first_minifat_sector = read_u32_le(&data, 0x3C).unwrap_or(SECT_END_OF_CHAIN);
        let num_minifat_sectors = read_u32_le(&data, 0x40).unwrap_or(0);
        let first_difat_sector = read_u32_le(&data, 0x44).unwrap_or(SECT_END_OF_CHAIN);

        let mut file = Self {
            data,
            sector_size,
            mini_sector_size,
            mini_stream_cutoff,
            fat: Vec::new(),
            minifat: Vec::new(),
            entries: Vec::new(),
            ministream: Vec::new(),
            paths: BTreeMap::new(),
        };

        file.load_fat(num_fat_sectors, first_difat_sector)?;
        file.load_directory(first_dir_sector)?;
        file.load_minifat(first_minifat_sector, num_minifat_sectors)?;
        file.load_ministream()?;
        file.build_paths()?;

        Ok(file)
    }

    /// List the paths of all streams in the container.
    pub fn list_streams(&self) -> Vec<String> {
        self.paths.keys().cloned().collect()
    }

    /// Whether a stream exists at the given path.
    pub fn has_stream(&self, path: &str) -> bool {
        self.paths.contains_key(path)
    }

    /// Read the full contents of the stream at the given path.
    pub fn open_stream(&self, path: &str) -> Result<Vec<u8>, FormatError> {
        let &idx = self
            .paths
            .get(path)
            .ok_or_else(|| FormatError::ComponentNotFound(path.to_string()))?;
        let entry = &self.entries[idx];

        let size = entry.size as usize;
        if entry.entry_type != ENTRY_TYPE_ROOT && (entry.size as u32) < self.mini_stream_cutoff {
            self.read_mini_chain(entry.start_sector, size, path)
        } else {
            self.read_chain(entry.start_sector, size, path)
        }
    }

    // ── internal loading ────────────────────────────────────────

    fn sector_bytes(&self, sid: u32) -> Result<&[u8], FormatError> {
        let start = HEADER_SIZE + sid as usize * self.sector_size;
        let end = start + self.sector_size;
        if end > self.data.len() {
            return Err(corrupt(format!("sector {} out of bounds", sid)));
        }
        Ok(&self.data[start..end])
    }

    fn load_fat(
        &mut self,
        num_fat_sectors: u32,
        first_difat_sector: u32,
    ) -> Result<(), FormatError> {
        let mut fat_sids = Vec::with_capacity(num_fat_sectors as usize);
        for i in 0..DIFAT_IN_HEADER {
            let sid = read_u32_le(&self.data, 0x4C + i * 4).unwrap_or(SECT_FREE);
            if sid != SECT_FREE && sid != SECT_END_OF_CHAIN {
                fat_sids.push(sid);
            }
        }

        // Chained DIFAT sectors extend the header array for large files.
        let entries_per_sector = self.sector_size / 4;
        let mut difat_sid = first_difat_sector;
        let mut guard = 0usize;
        while difat_sid != SECT_END_OF_CHAIN && difat_sid != SECT_FREE {
            if guard > self.data.len() / self.sector_size {
                return Err(corrupt("DIFAT chain loops"));
            }
            guard += 1;
            let sector = self.sector_bytes(difat_sid)?.to_vec();
            for i in 0..entries_per_sector - 1 {
                let sid = read_u32_le(&sector, i * 4).unwrap_or(SECT_FREE);
                if sid != SECT_FREE && sid != SECT_END_OF_CHAIN {
                    fat_sids.push(sid);
                }
            }
            difat_sid = read_u32_le(&sector, (entries_per_sector - 1) * 4).unwrap_or(SECT_END_OF_CHAIN);
        }

        let mut fat = Vec::with_capacity(fat_sids.len() * entries_per_sector);
        for sid in fat_sids {
            let sector = self.sector_bytes(sid)?;
            for i in 0..entries_per_sector {
                fat.push(read_u32_le(sector, i * 4).unwrap_or(SECT_FREE));
            }
        }
        self.fat = fat;
        Ok(())
    }

    fn chain_sids(&self, start: u32, what: &str) -> Result<Vec<u32>, FormatError> {
        let mut sids = Vec::new();
        let mut sid = start;
        while sid != SECT_END_OF_CHAIN && sid != SECT_FREE {
            if sids.len() > self.fat.len() {
                return Err(corrupt(format!("{} chain loops", what)));
            }
            sids.push(sid);
            sid = *self
                .fat
                .get(sid as usize)
                .ok_or_else(|| corrupt(format!("{} chain leaves the FAT", what)))?;
        }
        Ok(sids)
    }

    fn read_chain(&self, start: u32, size: usize, what: &str) -> Result<Vec<u8>, FormatError> {
        let mut out = Vec::with_capacity(size);
        for sid in self.chain_sids(start, what)? {
            out.extend_from_slice(self.sector_bytes(sid)?);
            if out.len() >= size {
                break;
            }
        }
        if out.len() < size {
            return Err(corrupt(format!(
                "stream '{}' shorter than declared size",
                what
            )));
        }
        out.truncate(size);
        Ok(out)
    }

    fn load_directory(&mut self, first_dir_sector: u32) -> Result<(), FormatError> {
        let mut entries = Vec::new();
        for sid in self.chain_sids(first_dir_sector, "directory")? {
            let sector = self.sector_bytes(sid)?;
            for chunk in sector.chunks_exact(DIR_ENTRY_SIZE) {
                let raw = RawDirectoryEntry::read_from_bytes(chunk)
                    .map_err(|_| corrupt("malformed directory entry"))?;
                let name_len = raw.name_len.get() as usize;
                let name = if name_len >= 2 && name_len <= 64 {
                    parse_utf16le_string(&raw.name[..name_len])
                } else {
                    String::new()
                };
                entries.push(DirEntry {
                    name,
                    entry_type: raw.entry_type,
                    sid_left: raw.sid_left.get(),
                    sid_right: raw.sid_right.get(),
                    sid_child: raw.sid_child.get(),
                    start_sector: raw.start_sector.get(),
                    size: raw.stream_size.get(),
                });
            }
        }
        if entries.is_empty() || entries[0].entry_type != ENTRY_TYPE_ROOT {
            return Err(corrupt("missing root directory entry"));
        }
        self.entries = entries;
        Ok(())
    }

    fn load_minifat(&mut self, first_sector: u32, num_sectors: u32) -> Result<(), FormatError> {
        if first_sector == SECT_END_OF_CHAIN || num_sectors == 0 {
            return Ok(());
        }
        let entries_per_sector = self.sector_size / 4;
        let mut minifat = Vec::with_capacity(num_sectors as usize * entries_per_sector);
        for sid in self.chain_sids(first_sector, "MiniFAT")? {
            let sector = self.sector_bytes(sid)?;
            for i in 0..entries_per_sector {
                minifat.push(read_u32_le(sector, i * 4).unwrap_or(SECT_FREE));
            }
        }
        self.minifat = minifat;
        Ok(())
    }

    fn load_ministream(&mut self) -> Result<(), FormatError> {
        let root = &self.entries[0];
        if root.size == 0 || root.start_sector == SECT_END_OF_CHAIN {
            return Ok(());
        }
        self.ministream = self.read_chain(root.start_sector, root.size as usize, "ministream")?;
        Ok(())
    }

    fn read_mini_chain(
        &self,
        start: u32,
        size: usize,
        what: &str,
    ) -> Result<Vec<u8>, FormatError> {
        let mut out = Vec::with_capacity(size);
        let mut sid = start;
        while sid != SECT_END_OF_CHAIN && sid != SECT_FREE {
            if out.len() / self.mini_sector_size > self.minifat.len() {
                return Err(corrupt(format!("mini chain of '{}' loops", what)));
            }
            let offset = sid as usize * self.mini_sector_size;
            let end = (offset + self.mini_sector_size).min(self.ministream.len());
            if offset >= self.ministream.len() {
                return Err(corrupt(format!(
                    "mini sector {} of '{}' out of bounds",
                    sid, what
                )));
            }
            out.extend_from_slice(&self.ministream[offset..end]);
            if out.len() >= size {
                break;
            }
            sid = *self
                .minifat
                .get(sid as usize)
                .ok_or_else(|| corrupt(format!("mini chain of '{}' leaves the MiniFAT", what)))?;
        }
        if out.len() < size {
            return Err(corrupt(format!(
                "stream '{}' shorter than declared size",
                what
            )));
        }
        out.truncate(size);
        Ok(out)
    }

    /// Walk the red-black sibling trees and record the path of every stream.
    fn build_paths(&mut self) -> Result<(), FormatError> {
        let mut paths = BTreeMap::new();
        let mut visited = vec![false; self.entries.len()];
        // (entry sid, storage prefix)
        let mut stack: Vec<(u32, String)> = Vec::new();

        let root_child = self.entries[0].sid_child;
        if root_child != NO_SID {
            stack.push((root_child, String::new()));
        }

        while let Some((sid, prefix)) = stack.pop() {
            let idx = sid as usize;
            let Some(entry) = self.entries.get(idx) else {
                continue;
            };
            if visited[idx] {
                return Err(corrupt("directory sibling tree loops"));
            }
            visited[idx] = true;

            if entry.sid_left != NO_SID {
                stack.push((entry.sid_left, prefix.clone()));
            }
            if entry.sid_right != NO_SID {
                stack.push((entry.sid_right, prefix.clone()));
            }

            let path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", prefix, entry.name)
            };

            match entry.entry_type {
                ENTRY_TYPE_STREAM => {
                    paths.insert(path, idx);
                },
                ENTRY_TYPE_STORAGE => {
                    if entry.sid_child != NO_SID {
                        stack.push((entry.sid_child, path));
                    }
                },
                _ => {},
            }
        }

        self.paths = paths;
        Ok(())
    }
}
