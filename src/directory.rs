//! Directory-entry records: NTFS-style attributes, alternate data streams,
//! and the recursive tree they form inside one image's metadata stream.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::sync::Arc;

use scroll::{Pread, LE};

use crate::archive::Archive;
use crate::consts::{file_attribute, reparse_tag};
use crate::error::{Error, Result};
use crate::reparse::ReparsePoint;
use crate::resource::ResourceStream;

fn align8(x: usize) -> usize {
    (x + 7) & !7
}

fn read_utf16(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::Malformed("UTF-16 name has odd byte length".into()));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

/// One record in an image's directory tree.
///
/// Cheap to clone: the decompressed metadata buffer is shared via `Arc`,
/// and the archive handle is itself a thin, cheaply-clonable facade.
#[derive(Clone)]
pub struct DirectoryEntry<R> {
    metadata: Arc<[u8]>,
    archive: Archive<R>,
    pub attributes: u32,
    pub security_id: u32,
    subdir_offset: u64,
    pub creation_time: u64,
    pub last_access_time: u64,
    pub last_write_time: u64,
    pub reparse_tag: u32,
    pub hard_link: u64,
    pub name: String,
    pub short_name: String,
    pub extra: Vec<u8>,
    default_hash: [u8; 20],
    streams: HashMap<String, [u8; 20]>,
}

impl<R: Read + Seek> DirectoryEntry<R> {
    pub(crate) fn parse_at(
        archive: &Archive<R>,
        metadata: &Arc<[u8]>,
        offset: &mut usize,
    ) -> Result<Self> {
        let bytes: &[u8] = metadata;
        let start = *offset;

        let length: u64 = bytes.gread_with(offset, LE)?;
        let attributes: u32 = bytes.gread_with(offset, LE)?;
        let security_id: u32 = bytes.gread_with(offset, LE)?;
        let subdir_offset: u64 = bytes.gread_with(offset, LE)?;
        for _ in 0..5 {
            let _reserved: u64 = bytes.gread_with(offset, LE)?;
        }
        let creation_time: u64 = bytes.gread_with(offset, LE)?;
        let last_access_time: u64 = bytes.gread_with(offset, LE)?;
        let last_write_time: u64 = bytes.gread_with(offset, LE)?;
        let reparse_tag_val: u32 = bytes.gread_with(offset, LE)?;
        let _reparse_reserved: u32 = bytes.gread_with(offset, LE)?;
        let hard_link: u64 = bytes.gread_with(offset, LE)?;
        let streams_count: u16 = bytes.gread_with(offset, LE)?;
        let short_name_length: u16 = bytes.gread_with(offset, LE)?;
        let name_length: u16 = bytes.gread_with(offset, LE)?;
        let mut default_hash = [0u8; 20];
        default_hash.copy_from_slice(bytes.gread_with::<&[u8]>(offset, 20)?);

        let name = if name_length > 0 {
            let raw = bytes.gread_with::<&[u8]>(offset, name_length as usize)?;
            let s = read_utf16(raw)?;
            *offset += 2; // NUL terminator, not part of name_length
            s
        } else {
            String::new()
        };

        let short_name = if short_name_length > 0 {
            let raw = bytes.gread_with::<&[u8]>(offset, short_name_length as usize)?;
            let s = read_utf16(raw)?;
            *offset += 2;
            s
        } else {
            String::new()
        };

        let end = *offset;
        let aligned_end = align8(end);
        let a = length as i64 - (aligned_end as i64 - start as i64);
        let extra_len = if a > 0 {
            *offset = aligned_end;
            a as usize
        } else {
            let b = length as i64 - (end as i64 - start as i64);
            if b > 0 { b as usize } else { 0 }
        };
        let extra = if extra_len > 0 {
            bytes.gread_with::<&[u8]>(offset, extra_len)?.to_vec()
        } else {
            Vec::new()
        };

        let mut streams = HashMap::new();
        if streams_count > 0 {
            for _ in 0..streams_count {
                *offset = align8(*offset);
                let stream_start = *offset;
                let stream_length: u64 = bytes.gread_with(offset, LE)?;
                let _reserved: u64 = bytes.gread_with(offset, LE)?;
                let mut hash = [0u8; 20];
                hash.copy_from_slice(bytes.gread_with::<&[u8]>(offset, 20)?);
                let stream_name_length: u16 = bytes.gread_with(offset, LE)?;
                let stream_name = if stream_name_length > 0 {
                    let raw = bytes.gread_with::<&[u8]>(offset, stream_name_length as usize)?;
                    let s = read_utf16(raw)?;
                    *offset += 2;
                    s
                } else {
                    String::new()
                };
                let consumed = *offset - stream_start;
                if stream_length as usize > consumed {
                    *offset += stream_length as usize - consumed;
                } else if (stream_length as usize) < consumed {
                    return Err(Error::Malformed(format!(
                        "stream entry at {} declares length {} shorter than its {}-byte fixed portion",
                        stream_start, stream_length, consumed
                    )));
                }
                streams.insert(stream_name, hash);
            }
        } else {
            streams.insert(String::new(), default_hash);
        }

        log::trace!(
            "parsed directory entry {:?} at {}: length={} attributes={:#x} streams={}",
            name, start, length, attributes, streams.len()
        );

        Ok(DirectoryEntry {
            metadata: metadata.clone(),
            archive: archive.clone(),
            attributes,
            security_id,
            subdir_offset,
            creation_time,
            last_access_time,
            last_write_time,
            reparse_tag: reparse_tag_val,
            hard_link,
            name,
            short_name,
            extra,
            default_hash,
            streams,
        })
    }

    /// A reparse-point directory is reported as a file: its payload is
    /// reparse data, not children.
    pub fn is_dir(&self) -> bool {
        self.attributes & (file_attribute::DIRECTORY | file_attribute::REPARSE_POINT)
            == file_attribute::DIRECTORY
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }

    pub fn is_reparse_point(&self) -> bool {
        self.attributes & file_attribute::REPARSE_POINT != 0
    }

    pub fn is_symlink(&self) -> bool {
        self.is_reparse_point() && self.reparse_tag == reparse_tag::SYMLINK
    }

    pub fn is_mount_point(&self) -> bool {
        self.is_reparse_point() && self.reparse_tag == reparse_tag::MOUNT_POINT
    }

    /// Creation time as a wall-clock UTC instant, converted from the raw
    /// FILETIME ticks in `creation_time`. `None` if the tick count is out
    /// of `time`'s representable range.
    pub fn creation_time(&self) -> Option<time::OffsetDateTime> {
        crate::timestamp::ticks_to_datetime(self.creation_time)
    }

    pub fn last_access_time(&self) -> Option<time::OffsetDateTime> {
        crate::timestamp::ticks_to_datetime(self.last_access_time)
    }

    pub fn last_write_time(&self) -> Option<time::OffsetDateTime> {
        crate::timestamp::ticks_to_datetime(self.last_write_time)
    }

    /// The default-stream hash recorded directly on this entry (distinct
    /// from `streams[""]`, which may differ if the record declares an
    /// explicit default-named stream entry).
    pub fn default_hash(&self) -> [u8; 20] {
        self.default_hash
    }

    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(|s| s.as_str())
    }

    fn stream_hash(&self, stream_name: &str) -> Option<[u8; 20]> {
        self.streams.get(stream_name).copied()
    }

    /// Open a named stream (the default unnamed stream if `stream_name` is
    /// `""`) as a decompressed, seekable byte view.
    pub fn open(&self, stream_name: &str) -> Result<ResourceStream<R>> {
        let hash = self.stream_hash(stream_name).ok_or_else(|| {
            Error::FileNotFound(format!("stream {:?} not present on {:?}", stream_name, self.name))
        })?;
        let resource = self.archive.resource_by_hash(&hash).ok_or_else(|| {
            Error::FileNotFound(format!(
                "no resource with hash {} (entry {:?}, stream {:?})",
                hex(&hash),
                self.name,
                stream_name
            ))
        })?;
        let mut stream = resource.open(&self.archive)?;

        #[cfg(feature = "verify-hashes")]
        if self.archive.options().verify_hashes {
            verify_hash(&mut stream, &hash)?;
        }

        Ok(stream)
    }

    pub fn size(&self, stream_name: &str) -> Result<u64> {
        Ok(self.open(stream_name)?.len())
    }

    /// Parse and return the reparse-point payload of this entry's default
    /// stream.
    pub fn reparse_point(&self) -> Result<ReparsePoint> {
        if !self.is_reparse_point() {
            return Err(Error::NotAReparsePoint(format!("{:?} is not a reparse point", self.name)));
        }
        let mut stream = self.open("")?;
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut stream, &mut buf)?;
        ReparsePoint::parse(self.reparse_tag, &buf)
    }

    /// Iterate this directory's immediate children in on-disk order.
    pub fn iterdir(&self) -> Result<DirIter<R>> {
        if !self.is_dir() {
            return Err(Error::NotADirectory(format!("{:?} is not a directory", self.name)));
        }
        Ok(DirIter {
            archive: self.archive.clone(),
            metadata: self.metadata.clone(),
            offset: self.subdir_offset as usize,
            done: false,
        })
    }

    pub fn listdir(&self) -> Result<HashMap<String, DirectoryEntry<R>>> {
        let mut map = HashMap::new();
        for entry in self.iterdir()? {
            let entry = entry?;
            map.insert(entry.name.clone(), entry);
        }
        Ok(map)
    }

    /// Resolve a `/`- or `\`-separated path relative to this entry.
    pub fn get(&self, path: &str) -> Result<DirectoryEntry<R>> {
        let normalized = path.replace('/', "\\");
        let mut current = self.clone();
        for component in normalized.split('\\').filter(|c| !c.is_empty()) {
            let children = current.listdir()?;
            current = children
                .get(component)
                .cloned()
                .ok_or_else(|| Error::FileNotFound(format!("no such path component {:?}", component)))?;
        }
        Ok(current)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(feature = "verify-hashes")]
fn verify_hash<R: Read + Seek>(stream: &mut ResourceStream<R>, expected: &[u8; 20]) -> Result<()> {
    use sha1::{Digest, Sha1};
    use std::io::SeekFrom;

    let mut hasher = Sha1::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    if digest.as_slice() != expected {
        return Err(Error::Malformed(format!(
            "stream hash mismatch: expected {}, got {}",
            hex(expected),
            hex(&digest)
        )));
    }
    stream.seek(SeekFrom::Start(0))?;
    Ok(())
}

impl<R> std::fmt::Debug for DirectoryEntry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryEntry")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .field("streams", &self.streams.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Lazy iterator over a directory's immediate children, terminated by an
/// 8-byte-or-shorter record length sentinel.
pub struct DirIter<R> {
    archive: Archive<R>,
    metadata: Arc<[u8]>,
    offset: usize,
    done: bool,
}

impl<R: Read + Seek> Iterator for DirIter<R> {
    type Item = Result<DirectoryEntry<R>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let bytes: &[u8] = &self.metadata;
        let mut peek = self.offset;
        let length: u64 = match bytes.gread_with(&mut peek, LE) {
            Ok(v) => v,
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        };
        if length <= 8 {
            self.done = true;
            return None;
        }

        let mut offset = self.offset;
        let entry = DirectoryEntry::parse_at(&self.archive, &self.metadata, &mut offset);
        match entry {
            Ok(entry) => {
                self.offset = align8(offset);
                Some(Ok(entry))
            }
            Err(e) => {
                // A corrupt entry aborts only this iteration, not the whole archive.
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
