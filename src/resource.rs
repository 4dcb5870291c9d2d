//! A `Resource` is a descriptor for one contiguous (possibly compressed)
//! blob inside the archive; `Resource::open` turns it into a seekable,
//! randomly-readable, uncompressed byte stream.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Mutex;

use scroll::{Pread, LE};

use crate::archive::Archive;
use crate::compress::CompressedStream;
use crate::consts;
use crate::error::{Error, Result};
use crate::header::ShortResourceHeader;

/// A resource descriptor: where it lives, how big it is compressed and
/// uncompressed, and (for resource-table entries) which part of a spanned
/// set it belongs to, how many directory entries reference it, and its
/// content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub compressed_size: u64,
    pub flags: u8,
    pub offset: u64,
    pub original_size: u64,
    pub part_number: Option<u16>,
    pub reference_count: Option<u32>,
    pub hash: Option<[u8; 20]>,
}

impl Resource {
    pub(crate) fn from_short_header(header: ShortResourceHeader) -> Self {
        Resource {
            compressed_size: header.size,
            flags: header.flags,
            offset: header.offset,
            original_size: header.original_size,
            part_number: None,
            reference_count: None,
            hash: None,
        }
    }

    /// Parse one 50-byte resource-table entry: a short resource header
    /// followed by part number, reference count, and content hash.
    pub(crate) fn parse_table_entry(bytes: &[u8], offset: &mut usize) -> Result<Self> {
        let header = ShortResourceHeader::parse(bytes, offset)?;
        let part_number: u16 = bytes.gread_with(offset, LE)?;
        let reference_count: u32 = bytes.gread_with(offset, LE)?;
        let mut hash = [0u8; 20];
        hash.copy_from_slice(bytes.gread_with::<&[u8]>(offset, 20)?);

        let mut resource = Resource::from_short_header(header);
        resource.part_number = Some(part_number);
        resource.reference_count = Some(reference_count);
        resource.hash = Some(hash);
        Ok(resource)
    }

    pub fn is_metadata(&self) -> bool {
        self.flags & consts::resource_flag::METADATA != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & consts::resource_flag::COMPRESSED != 0
    }

    pub fn is_spanned(&self) -> bool {
        self.flags & consts::resource_flag::SPANNED != 0
    }

    /// Open a readable, seekable view over this resource's uncompressed
    /// bytes. Reads/seeks on the returned stream are expressed in
    /// uncompressed byte positions.
    pub fn open<R: Read + Seek>(&self, archive: &Archive<R>) -> Result<ResourceStream<R>> {
        if self.is_spanned() {
            return Err(Error::Unsupported("spanned resources are not supported".into()));
        }

        if self.is_compressed() {
            let algorithm = archive.header().compression_algorithm();
            let decompressor = archive.decompressor(algorithm).ok_or_else(|| {
                Error::Unsupported(format!(
                    "no decompressor registered for compression algorithm {:#x}",
                    algorithm
                ))
            })?;
            Ok(ResourceStream::Compressed(CompressedStream::new(
                archive.source(),
                self.offset,
                self.compressed_size,
                self.original_size,
                archive.header().chunk_size as u64,
                decompressor,
                archive.options().chunk_cache_capacity,
            )?))
        } else {
            Ok(ResourceStream::Plain(RelativeStream::new(
                archive.source(),
                self.offset,
                self.compressed_size,
            )))
        }
    }
}

/// A window over `[offset, offset + len)` of the shared backing source,
/// presented as its own independent `Read + Seek` stream starting at 0.
pub struct RelativeStream<R> {
    source: std::sync::Arc<Mutex<R>>,
    base: u64,
    len: u64,
    pos: u64,
}

impl<R: Read + Seek> RelativeStream<R> {
    pub(crate) fn new(source: std::sync::Arc<Mutex<R>>, base: u64, len: u64) -> Self {
        RelativeStream { source, base, len, pos: 0 }
    }

    pub fn len(&self) -> u64 {
        self.len
    }
}

impl<R: Read + Seek> Read for RelativeStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len {
            return Ok(0);
        }
        let remaining = (self.len - self.pos) as usize;
        let take = remaining.min(buf.len());
        let mut source = self.source.lock().unwrap();
        source.seek(SeekFrom::Start(self.base + self.pos))?;
        let read = source.read(&mut buf[..take])?;
        self.pos += read as u64;
        Ok(read)
    }
}

impl<R: Read + Seek> Seek for RelativeStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::Current(p) => self.pos as i64 + p,
            SeekFrom::End(p) => self.len as i64 + p,
        };
        if new_pos < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start"));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}

/// The stream returned by [`Resource::open`]: either a plain byte-range
/// window, or a chunked, decompressing view.
pub enum ResourceStream<R> {
    Plain(RelativeStream<R>),
    Compressed(CompressedStream<R>),
}

impl<R: Read + Seek> ResourceStream<R> {
    pub fn len(&self) -> u64 {
        match self {
            ResourceStream::Plain(s) => s.len(),
            ResourceStream::Compressed(s) => s.len(),
        }
    }
}

impl<R: Read + Seek> Read for ResourceStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ResourceStream::Plain(s) => s.read(buf),
            ResourceStream::Compressed(s) => s.read(buf),
        }
    }
}

impl<R: Read + Seek> Seek for ResourceStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ResourceStream::Plain(s) => s.seek(pos),
            ResourceStream::Compressed(s) => s.seek(pos),
        }
    }
}
