//! The security block: a leading table of NT security descriptor lengths
//! followed by the descriptors themselves, at the start of every image's
//! decompressed metadata stream.

use scroll::{Pread, LE};

use crate::error::Result;

/// The security descriptor table at the head of an image's metadata stream.
///
/// This crate does not interpret descriptor contents (ACLs, owner/group
/// SIDs); it only tracks enough to skip past the block to the root
/// directory entry. `descriptors` preserves the raw bytes of each entry for
/// callers that do care.
#[derive(Debug, Clone)]
pub struct SecurityBlock {
    pub total_length: u32,
    pub descriptors: Vec<Vec<u8>>,
}

impl SecurityBlock {
    /// Parse the block starting at `bytes[*offset]`, advancing `offset` past
    /// the block's 8-byte-aligned end.
    pub(crate) fn parse(bytes: &[u8], offset: &mut usize) -> Result<Self> {
        let start = *offset;
        let total_length: u32 = bytes.gread_with(offset, LE)?;
        let num_entries: u32 = bytes.gread_with(offset, LE)?;

        let mut entry_lengths = Vec::with_capacity(num_entries as usize);
        for _ in 0..num_entries {
            let len: u32 = bytes.gread_with(offset, LE)?;
            entry_lengths.push(len);
        }

        let mut descriptors = Vec::with_capacity(num_entries as usize);
        for len in entry_lengths {
            let descriptor = bytes.gread_with::<&[u8]>(offset, len as usize)?;
            descriptors.push(descriptor.to_vec());
        }

        // The block is padded to an 8-byte boundary from its own start,
        // independent of whatever `total_length` claims.
        let consumed = *offset - start;
        let padded = (consumed + 7) & !7;
        *offset = start + padded;

        Ok(SecurityBlock { total_length, descriptors })
    }
}
