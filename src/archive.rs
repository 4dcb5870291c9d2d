//! The archive facade: header validation, resource-table construction, and
//! image enumeration. The single entry point everything else hangs off.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::compress::{Decompressor, DecompressorRegistry};
use crate::consts;
use crate::error::Result;
use crate::header::Header;
use crate::image::Image;
use crate::options::ParseOptions;
use crate::resource::Resource;

struct ArchiveInner<R> {
    source: Arc<Mutex<R>>,
    header: Header,
    resources: HashMap<[u8; 20], Resource>,
    metadata_resources: Vec<Resource>,
    decompressors: DecompressorRegistry,
    options: ParseOptions,
}

/// A parsed WIM archive. Cheap to clone (an `Arc` handle); every clone
/// shares the same backing source, resource table, and decompressor
/// registry.
pub struct Archive<R>(Arc<ArchiveInner<R>>);

impl<R> Clone for Archive<R> {
    fn clone(&self) -> Self {
        Archive(self.0.clone())
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Parse an archive with no decompressors registered. Fine for
    /// archives whose resources are all stored uncompressed; opening a
    /// compressed resource will fail with `Error::Unsupported`.
    pub fn new(source: R, options: ParseOptions) -> Result<Self> {
        Self::with_decompressors(source, options, DecompressorRegistry::new())
    }

    /// Parse an archive, using `decompressors` to resolve any compressed
    /// resource's algorithm flag (`header.flags & 0xFFFF0000`) to a codec.
    pub fn with_decompressors(
        mut source: R,
        options: ParseOptions,
        decompressors: DecompressorRegistry,
    ) -> Result<Self> {
        let mut header_bytes = [0u8; consts::SIZEOF_HEADER];
        source.seek(SeekFrom::Start(0))?;
        source.read_exact(&mut header_bytes)?;
        let header = Header::parse(&header_bytes)?;

        let inner = ArchiveInner {
            source: Arc::new(Mutex::new(source)),
            header,
            resources: HashMap::new(),
            metadata_resources: Vec::new(),
            decompressors,
            options,
        };
        let mut archive = Archive(Arc::new(inner));

        let offset_table = Resource::from_short_header(archive.header().offset_table);
        let mut table_stream = offset_table.open(&archive)?;
        let mut table_bytes = Vec::new();
        table_stream.read_to_end(&mut table_bytes)?;
        drop(table_stream);

        let mut resources = HashMap::new();
        let mut metadata_resources = Vec::new();
        let mut offset = 0usize;
        while offset + consts::SIZEOF_RESHDR <= table_bytes.len() {
            let resource = Resource::parse_table_entry(&table_bytes, &mut offset)?;
            if resource.is_metadata() {
                metadata_resources.push(resource);
            }
            if let Some(hash) = resource.hash {
                resources.insert(hash, resource);
            }
        }

        log::debug!(
            "built resource table: {} resources, {} metadata resources",
            resources.len(),
            metadata_resources.len()
        );

        // `archive` is still the sole owner of the outer `Arc`: the clones
        // taken above (`archive.source()`, etc.) only touched the inner
        // `Arc<Mutex<R>>` and `Arc<dyn Decompressor>` fields.
        let inner_mut = Arc::get_mut(&mut archive.0)
            .expect("archive has no other owners during construction");
        inner_mut.resources = resources;
        inner_mut.metadata_resources = metadata_resources;

        Ok(archive)
    }

    pub fn header(&self) -> &Header {
        &self.0.header
    }

    pub fn options(&self) -> &ParseOptions {
        &self.0.options
    }

    pub(crate) fn source(&self) -> Arc<Mutex<R>> {
        self.0.source.clone()
    }

    pub(crate) fn decompressor(&self, algorithm: u32) -> Option<Arc<dyn Decompressor>> {
        self.0.decompressors.get(algorithm)
    }

    /// All distinct resources in the archive, in unspecified but
    /// deterministic order.
    pub fn resources(&self) -> impl Iterator<Item = Resource> + '_ {
        self.0.resources.values().copied()
    }

    /// O(1) hash -> resource lookup, backing `DirectoryEntry::open`.
    pub(crate) fn resource_by_hash(&self, hash: &[u8; 20]) -> Option<Resource> {
        self.0.resources.get(hash).copied()
    }

    /// Every image stored in the archive, in file order of metadata
    /// resources.
    pub fn images(&self) -> impl Iterator<Item = Result<Image<R>>> + '_ {
        let archive = self.clone();
        self.0.metadata_resources.iter().map(move |resource| {
            let mut stream = resource.open(&archive)?;
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf)?;
            Image::parse(&archive, buf.into())
        })
    }
}

impl Archive<BufReader<File>> {
    /// Open and parse a WIM file from a path, with no decompressors
    /// registered. See [`Archive::with_decompressors`] for compressed
    /// archives.
    pub fn open<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<Self> {
        let file = File::open(path)?;
        Archive::new(BufReader::new(file), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header_bytes(image_count: u32, flags: u32, chunk_size: u32) -> Vec<u8> {
        let mut h = Vec::new();
        h.extend_from_slice(b"MSWIM\0\0\0");
        h.extend_from_slice(&208u32.to_le_bytes());
        h.extend_from_slice(&0x0001_0d00u32.to_le_bytes());
        h.extend_from_slice(&flags.to_le_bytes());
        h.extend_from_slice(&chunk_size.to_le_bytes());
        h.extend_from_slice(&[0u8; 16]);
        h.extend_from_slice(&1u16.to_le_bytes());
        h.extend_from_slice(&1u16.to_le_bytes());
        h.extend_from_slice(&image_count.to_le_bytes());
        // offset_table: size=0, flags=0, offset=208, original_size=0
        h.extend_from_slice(&0u64.to_le_bytes());
        h.extend_from_slice(&208u64.to_le_bytes());
        h.extend_from_slice(&0u64.to_le_bytes());
        h.extend_from_slice(&[0u8; 24]); // xml_data
        h.extend_from_slice(&[0u8; 24]); // boot_metadata
        h.extend_from_slice(&0u32.to_le_bytes()); // boot_index
        h.extend_from_slice(&[0u8; 24]); // integrity
        h.resize(208, 0);
        h
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = header_bytes(0, 0, 0x8000);
        data[0] = b'X';
        let err = Archive::new(Cursor::new(data), ParseOptions::default()).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidHeader(_)));
    }

    #[test]
    fn rejects_spanned_archives() {
        let data = header_bytes(0, consts::header_flag::SPANNED, 0x8000);
        let err = Archive::new(Cursor::new(data), ParseOptions::default()).unwrap_err();
        assert!(matches!(err, crate::error::Error::Unsupported(_)));
    }

    #[test]
    fn parses_empty_resource_table() {
        let data = header_bytes(0, 0, 0x8000);
        let archive = Archive::new(Cursor::new(data), ParseOptions::default()).unwrap();
        assert_eq!(archive.resources().count(), 0);
        assert_eq!(archive.images().count(), 0);
    }
}
