//! One logical filesystem root captured inside a WIM archive: a security
//! block followed by a recursively-navigable directory tree.

use std::io::{Read, Seek};
use std::sync::Arc;

use crate::archive::Archive;
use crate::directory::DirectoryEntry;
use crate::error::Result;
use crate::security::SecurityBlock;

fn align8(x: usize) -> usize {
    (x + 7) & !7
}

/// The decompressed content of one metadata resource: a security block and
/// the root of the directory tree.
pub struct Image<R> {
    pub security: SecurityBlock,
    pub root: DirectoryEntry<R>,
}

impl<R: Read + Seek> Image<R> {
    pub(crate) fn parse(archive: &Archive<R>, metadata: Arc<[u8]>) -> Result<Self> {
        let bytes: &[u8] = &metadata;
        let mut offset = 0usize;
        let security = SecurityBlock::parse(bytes, &mut offset)?;

        offset = align8(offset);
        let root = DirectoryEntry::parse_at(archive, &metadata, &mut offset)?;

        log::debug!(
            "parsed image: {} bytes of metadata, {} security descriptors",
            metadata.len(),
            security.descriptors.len()
        );

        Ok(Image { security, root })
    }

    /// Convenience wrapper around `root.get(path)`.
    pub fn get(&self, path: &str) -> Result<DirectoryEntry<R>> {
        self.root.get(path)
    }
}
