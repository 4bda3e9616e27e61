use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use crc32fast::Hasher;
use memmap2::Mmap;
use crate::compression::compress::{CompressedBlock, CompressionType};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::TableKind;
use crate::storage::layout::sibling_path;

pub const REGION_MAGIC: [u8; 4] = *b"TSRG";
pub const REGION_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 32;

/// Set while a region's in-memory state matches its payload.
pub const FLAG_CLEAN: u8 = 0x01;

/// What a region stores; checked on open to refuse reinterpreting storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectTag {
    Table(TableKind),
    Column,
    IndexColumn,
}

impl ObjectTag {
    pub fn code(&self) -> u8 {
        match self {
            ObjectTag::Table(TableKind::Array) => 1,
            ObjectTag::Table(TableKind::Hash) => 2,
            ObjectTag::Table(TableKind::PatriciaTrie) => 3,
            ObjectTag::Table(TableKind::DoubleArrayTrie) => 4,
            ObjectTag::Column => 10,
            ObjectTag::IndexColumn => 11,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            1 => ObjectTag::Table(TableKind::Array),
            2 => ObjectTag::Table(TableKind::Hash),
            3 => ObjectTag::Table(TableKind::PatriciaTrie),
            4 => ObjectTag::Table(TableKind::DoubleArrayTrie),
            10 => ObjectTag::Column,
            11 => ObjectTag::IndexColumn,
            other => {
                return Err(Error::new(ErrorKind::Corrupt, format!("unknown object tag {}", other)));
            }
        })
    }

    pub fn describe(&self) -> String {
        match self {
            ObjectTag::Table(kind) => format!("{} table", kind.name()),
            ObjectTag::Column => "column".to_string(),
            ObjectTag::IndexColumn => "index column".to_string(),
        }
    }
}

// [ MAGIC(4) | VERSION(4) | TAG(1) | FLAGS(1) | COMPRESSION(1) | PAD(5) ]
// [ PAYLOAD_LEN(8) | CHECKSUM(4) | PAD(4) ]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionHeader {
    pub version: u32,
    pub tag: ObjectTag,
    pub flags: u8,
    pub compression: CompressionType,
    pub payload_len: u64,
    pub checksum: u32,
}

impl RegionHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&REGION_MAGIC);
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8] = self.tag.code();
        buf[9] = self.flags;
        buf[10] = self.compression.tag();
        buf[16..24].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[24..28].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE || buf[0..4] != REGION_MAGIC {
            return Err(Error::new(ErrorKind::Corrupt, "not a region file (bad magic)"));
        }
        let mut u32_buf = [0u8; 4];
        let mut u64_buf = [0u8; 8];

        u32_buf.copy_from_slice(&buf[4..8]);
        let version = u32::from_le_bytes(u32_buf);
        if version != REGION_VERSION {
            return Err(Error::new(ErrorKind::Corrupt, format!("unsupported region version {}", version)));
        }
        u64_buf.copy_from_slice(&buf[16..24]);
        u32_buf.copy_from_slice(&buf[24..28]);

        Ok(RegionHeader {
            version,
            tag: ObjectTag::from_code(buf[8])?,
            flags: buf[9],
            compression: CompressionType::from_tag(buf[10])?,
            payload_len: u64::from_le_bytes(u64_buf),
            checksum: u32::from_le_bytes(u32_buf),
        })
    }

    pub fn is_clean(&self) -> bool {
        self.flags & FLAG_CLEAN != 0
    }
}

enum Backing {
    Anonymous(Vec<u8>),
    File { file: File, map: Option<Mmap> },
}

/// Byte-addressable storage area backing one table or column.
/// File-backed regions are durable and named by path; anonymous regions
/// live only as long as the process and leave no files.
pub struct Region {
    backing: Backing,
    path: Option<PathBuf>,
}

impl Region {
    pub fn anonymous() -> Self {
        Region {
            backing: Backing::Anonymous(Vec::new()),
            path: None,
        }
    }

    /// Creates a new, empty file region. Fails with `AlreadyExists`.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => Error::new(
                    ErrorKind::AlreadyExists,
                    format!("{} already exists", path.display()),
                ),
                _ => e.into(),
            })?;

        Ok(Region {
            backing: Backing::File { file, map: None },
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens an existing file region. Fails with `NotFound`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::not_found(format!(
                    "no such file or directory: {}", path.display()
                )),
                _ => e.into(),
            })?;

        let mut region = Region {
            backing: Backing::File { file, map: None },
            path: Some(path.to_path_buf()),
        };
        region.remap()?;
        Ok(region)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    pub fn len(&self) -> u64 {
        match &self.backing {
            Backing::Anonymous(buf) => buf.len() as u64,
            Backing::File { map, .. } => map.as_ref().map(|m| m.len() as u64).unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Anonymous(buf) => buf,
            Backing::File { map, .. } => map.as_deref().unwrap_or(&[]),
        }
    }

    pub fn read_at(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let start = offset as usize;
        self.bytes()
            .get(start..start + len)
            .ok_or_else(|| Error::new(
                ErrorKind::OutOfRange,
                format!("read of {} bytes at {} past end of region ({})", len, offset, self.len()),
            ))
    }

    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        match &mut self.backing {
            Backing::Anonymous(buf) => {
                let end = offset as usize + data.len();
                if buf.len() < end {
                    buf.resize(end, 0);
                }
                buf[offset as usize..end].copy_from_slice(data);
            }
            Backing::File { file, map } => {
                // Drop the map before growing the file underneath it.
                *map = None;
                file.seek(SeekFrom::Start(offset))?;
                file.write_all(data)?;
            }
        }
        self.remap()
    }

    pub fn append(&mut self, data: &[u8]) -> Result<u64> {
        let offset = self.len();
        self.write_at(offset, data)?;
        Ok(offset)
    }

    pub fn truncate(&mut self, len: u64) -> Result<()> {
        match &mut self.backing {
            Backing::Anonymous(buf) => buf.truncate(len as usize),
            Backing::File { file, map } => {
                *map = None;
                file.set_len(len)?;
            }
        }
        self.remap()
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Backing::File { file, .. } = &mut self.backing {
            file.sync_all()?;
        }
        Ok(())
    }

    fn remap(&mut self) -> Result<()> {
        if let Backing::File { file, map } = &mut self.backing {
            let len = file.metadata()?.len();
            *map = if len == 0 {
                None
            } else {
                // The region owns the file; other handles only replace it by rename.
                Some(unsafe { Mmap::map(&*file)? })
            };
        }
        Ok(())
    }

    /// Deletes the backing file. Anonymous regions just drop their bytes.
    pub fn remove(self) -> Result<()> {
        if let Some(path) = self.path {
            drop(self.backing);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn header(&self) -> Result<Option<RegionHeader>> {
        if self.is_empty() {
            return Ok(None);
        }
        RegionHeader::decode(self.read_at(0, HEADER_SIZE)?).map(Some)
    }

    /// Verifies the stored object tag against what the caller expects.
    pub fn expect_tag(&self, expected: ObjectTag) -> Result<()> {
        if let Some(header) = self.header()? {
            if header.tag != expected {
                return Err(Error::type_mismatch(format!(
                    "{} holds a {}, not a {}",
                    self.describe_path(),
                    header.tag.describe(),
                    expected.describe()
                )));
            }
        }
        Ok(())
    }

    pub fn set_flags(&mut self, flags: u8) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        self.write_at(9, &[flags])
    }

    /// Replaces the region content with `header + payload`.
    /// File regions are rewritten through a temporary file and renamed, so
    /// a crash leaves either the old or the new snapshot.
    pub fn write_snapshot(
        &mut self,
        tag: ObjectTag,
        payload: &[u8],
        compression: CompressionType,
    ) -> Result<()> {
        let block = CompressedBlock::compress(payload, compression);
        let mut hasher = Hasher::new();
        hasher.update(&block.data);

        let header = RegionHeader {
            version: REGION_VERSION,
            tag,
            flags: FLAG_CLEAN,
            compression,
            payload_len: payload.len() as u64,
            checksum: hasher.finalize(),
        };

        let mut bytes = Vec::with_capacity(HEADER_SIZE + block.data.len());
        bytes.extend_from_slice(&header.encode());
        bytes.extend_from_slice(&block.data);

        match self.path.clone() {
            None => self.backing = Backing::Anonymous(bytes),
            Some(path) => {
                let tmp = sibling_path(&path, ".tmp");
                {
                    let mut out = File::create(&tmp)?;
                    out.write_all(&bytes)?;
                    out.sync_all()?;
                }
                fs::rename(&tmp, &path)?;
                let file = OpenOptions::new().read(true).write(true).open(&path)?;
                self.backing = Backing::File { file, map: None };
            }
        }
        self.remap()
    }

    /// Returns the decompressed payload, or `None` for a never-written region.
    pub fn read_snapshot(&self) -> Result<Option<(RegionHeader, Vec<u8>)>> {
        let header = match self.header()? {
            Some(header) => header,
            None => return Ok(None),
        };
        let data = &self.bytes()[HEADER_SIZE..];

        let mut hasher = Hasher::new();
        hasher.update(data);
        if hasher.finalize() != header.checksum {
            return Err(Error::new(
                ErrorKind::Corrupt,
                format!("checksum mismatch in {}", self.describe_path()),
            ));
        }

        let block = CompressedBlock {
            data: data.to_vec(),
            original_size: header.payload_len as usize,
            compression: header.compression,
        };
        Ok(Some((header, block.decompress()?)))
    }

    pub fn describe_path(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => "(temporary)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region");
        let mut region = Region::create(&path).unwrap();
        region
            .write_snapshot(ObjectTag::Column, b"payload bytes", CompressionType::Lz4)
            .unwrap();
        drop(region);

        let region = Region::open(&path).unwrap();
        let (header, payload) = region.read_snapshot().unwrap().unwrap();
        assert_eq!(header.tag, ObjectTag::Column);
        assert!(header.is_clean());
        assert_eq!(payload, b"payload bytes");
    }

    #[test]
    fn wrong_tag_is_a_type_mismatch() {
        let mut region = Region::anonymous();
        region
            .write_snapshot(ObjectTag::Table(TableKind::Hash), b"x", CompressionType::None)
            .unwrap();
        let err = region
            .expect_tag(ObjectTag::Table(TableKind::PatriciaTrie))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn corrupted_payload_is_detected() {
        let mut region = Region::anonymous();
        region
            .write_snapshot(ObjectTag::Column, b"abcdef", CompressionType::None)
            .unwrap();
        region.write_at(HEADER_SIZE as u64, b"z").unwrap();
        assert_eq!(region.read_snapshot().unwrap_err().kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn random_access_and_append() {
        let mut region = Region::anonymous();
        assert_eq!(region.append(b"hello").unwrap(), 0);
        assert_eq!(region.append(b" world").unwrap(), 5);
        region.write_at(0, b"J").unwrap();
        assert_eq!(region.read_at(0, 11).unwrap(), b"Jello world");
        assert_eq!(region.read_at(8, 10).unwrap_err().kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Region::open(&dir.path().join("nope")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
