//! The chunked decompression engine: turns a request for an arbitrary
//! uncompressed byte range into the right sequence of compressed-chunk
//! fetches, decompressing each chunk at most once per LRU window.

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::error::{Error, Result};

/// A pure byte-in/byte-out decompression transform, keyed by the header's
/// compression-algorithm flag. The actual XPRESS/LZX/LZMS codecs are out of
/// scope for this crate; callers register their own, or use
/// [`DecompressorRegistry::store`] to exercise the chunk engine uncompressed.
pub trait Decompressor: Send + Sync {
    /// Decompress one chunk. `expected_len` is the uncompressed length this
    /// chunk is expected to produce (the chunk size, or the remainder for
    /// the final chunk); implementations may use it to preallocate.
    fn decompress(&self, compressed: &[u8], expected_len: usize) -> Result<Vec<u8>>;
}

/// An identity transform, used to test the chunk-table/LRU machinery
/// without a real codec.
struct StoreDecompressor;

impl Decompressor for StoreDecompressor {
    fn decompress(&self, compressed: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        if compressed.len() != expected_len {
            return Err(Error::Malformed(format!(
                "store chunk length mismatch: got {}, expected {}",
                compressed.len(),
                expected_len
            )));
        }
        Ok(compressed.to_vec())
    }
}

/// Maps a header's compression-algorithm flag (`Flags & 0xFFFF0000`) to a
/// decompressor implementation.
#[derive(Clone, Default)]
pub struct DecompressorRegistry {
    entries: HashMap<u32, Arc<dyn Decompressor>>,
}

impl DecompressorRegistry {
    pub fn new() -> Self {
        DecompressorRegistry { entries: HashMap::new() }
    }

    pub fn register(&mut self, algorithm: u32, decompressor: Arc<dyn Decompressor>) -> &mut Self {
        self.entries.insert(algorithm, decompressor);
        self
    }

    /// Registers the identity transform under `algorithm`, for tests and for
    /// archives whose resources are never actually compressed.
    pub fn register_store(&mut self, algorithm: u32) -> &mut Self {
        self.register(algorithm, Arc::new(StoreDecompressor))
    }

    pub fn get(&self, algorithm: u32) -> Option<Arc<dyn Decompressor>> {
        self.entries.get(&algorithm).cloned()
    }
}

/// A seekable, decompressing view over one compressed resource's bytes.
pub struct CompressedStream<R> {
    source: Arc<Mutex<R>>,
    /// Absolute archive offset of the start of the chunk table.
    resource_offset: u64,
    /// Size, in bytes, of the on-disk chunk table preceding the chunk data.
    table_bytes: u64,
    /// Total on-disk size of the resource (table + all compressed chunks).
    compressed_size: u64,
    original_size: u64,
    chunk_size: u64,
    /// `chunk_offsets[i]` is the offset of chunk `i`'s compressed bytes,
    /// relative to the end of the chunk table. `chunk_offsets[0] == 0`.
    chunk_offsets: Vec<u64>,
    decompressor: Arc<dyn Decompressor>,
    cache: LruCache<u64, Arc<[u8]>>,
    pos: u64,
}

impl<R: Read + Seek> CompressedStream<R> {
    pub(crate) fn new(
        source: Arc<Mutex<R>>,
        resource_offset: u64,
        compressed_size: u64,
        original_size: u64,
        chunk_size: u64,
        decompressor: Arc<dyn Decompressor>,
        cache_capacity: usize,
    ) -> Result<Self> {
        let total_chunks = if original_size == 0 {
            1
        } else {
            ((original_size + chunk_size - 1) / chunk_size) as usize
        };
        let num_entries = total_chunks.saturating_sub(1);
        let entry_width: usize = if original_size > u32::MAX as u64 { 8 } else { 4 };
        let table_bytes = (num_entries * entry_width) as u64;

        let mut chunk_offsets = Vec::with_capacity(total_chunks);
        chunk_offsets.push(0u64);
        if num_entries > 0 {
            let mut raw = vec![0u8; num_entries * entry_width];
            {
                let mut guard = source.lock().unwrap();
                guard.seek(SeekFrom::Start(resource_offset))?;
                guard.read_exact(&mut raw)?;
            }
            for i in 0..num_entries {
                let value = if entry_width == 8 {
                    u64::from_le_bytes(raw[i * 8..i * 8 + 8].try_into().unwrap())
                } else {
                    u32::from_le_bytes(raw[i * 4..i * 4 + 4].try_into().unwrap()) as u64
                };
                chunk_offsets.push(value);
            }
        }

        let capacity = NonZeroUsize::new(cache_capacity.max(1)).unwrap();
        Ok(CompressedStream {
            source,
            resource_offset,
            table_bytes,
            compressed_size,
            original_size,
            chunk_size,
            chunk_offsets,
            decompressor,
            cache: LruCache::new(capacity),
            pos: 0,
        })
    }

    pub fn len(&self) -> u64 {
        self.original_size
    }

    fn total_chunks(&self) -> usize {
        self.chunk_offsets.len()
    }

    fn chunk_bounds(&self, chunk_idx: usize) -> Result<(u64, u64, usize)> {
        let total = self.total_chunks();
        if chunk_idx >= total {
            return Err(Error::Malformed(format!(
                "chunk index {} out of range (total chunks {})",
                chunk_idx, total
            )));
        }
        let start = self.chunk_offsets[chunk_idx];
        if chunk_idx + 1 < total {
            let end = self.chunk_offsets[chunk_idx + 1];
            Ok((start, end, self.chunk_size as usize))
        } else {
            let end = self.compressed_size - self.table_bytes;
            let expected = (self.original_size - (chunk_idx as u64) * self.chunk_size) as usize;
            Ok((start, end, expected))
        }
    }

    fn fetch_chunk(&mut self, chunk_idx: usize) -> Result<Arc<[u8]>> {
        let (start, end, expected_len) = self.chunk_bounds(chunk_idx)?;
        if let Some(cached) = self.cache.get(&start) {
            return Ok(cached.clone());
        }
        if end < start {
            return Err(Error::Malformed(format!(
                "chunk {} has negative length (start {} > end {})",
                chunk_idx, start, end
            )));
        }
        let mut compressed = vec![0u8; (end - start) as usize];
        {
            let mut guard = self.source.lock().unwrap();
            guard.seek(SeekFrom::Start(self.resource_offset + self.table_bytes + start))?;
            guard.read_exact(&mut compressed)?;
        }
        let decompressed: Arc<[u8]> = self
            .decompressor
            .decompress(&compressed, expected_len)?
            .into();
        self.cache.put(start, decompressed.clone());
        Ok(decompressed)
    }

    fn read_at(&mut self, off: u64, len: usize) -> Result<Vec<u8>> {
        let mut result = Vec::with_capacity(len);
        let mut off = off;
        let mut remaining = len;

        let mut chunk_idx = (off / self.chunk_size) as usize;
        let mut intra = (off % self.chunk_size) as usize;

        while remaining > 0 && chunk_idx < self.total_chunks() {
            let uncompressed_remaining = if chunk_idx + 1 < self.total_chunks() {
                self.chunk_size as usize - intra
            } else {
                let expected = (self.original_size - (chunk_idx as u64) * self.chunk_size) as usize;
                expected.saturating_sub(intra)
            };
            let take = uncompressed_remaining.min(remaining);
            if take == 0 {
                break;
            }
            let chunk = self.fetch_chunk(chunk_idx)?;
            let end_in_chunk = (intra + take).min(chunk.len());
            if intra < chunk.len() {
                result.extend_from_slice(&chunk[intra..end_in_chunk]);
            }

            remaining -= take;
            off += take as u64;
            chunk_idx += 1;
            intra = 0;
        }

        Ok(result)
    }
}

impl<R: Read + Seek> Read for CompressedStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.original_size {
            return Ok(0);
        }
        let remaining = (self.original_size - self.pos) as usize;
        let take = remaining.min(buf.len());
        let data = self
            .read_at(self.pos, take)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        buf[..data.len()].copy_from_slice(&data);
        self.pos += data.len() as u64;
        Ok(data.len())
    }
}

impl<R: Read + Seek> Seek for CompressedStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::Current(p) => self.pos as i64 + p,
            SeekFrom::End(p) => self.original_size as i64 + p,
        };
        if new_pos < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start"));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}
