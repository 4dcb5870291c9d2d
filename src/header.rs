//! The fixed 208-byte WIM header and the short resource header shape it
//! embeds three copies of. Parsed field-by-field with `scroll::gread_with`,
//! the same idiom the teacher crate uses for `pe::header::DosHeader` (whose
//! reserved/padding fields are skipped by hand rather than derived).

use scroll::{Pread, LE};

use crate::consts::{self, header_flag};
use crate::error::{Error, Result};

/// A resource's location and size, as embedded directly in the WIM header
/// (the offset table, XML data, and integrity table all use this shape).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShortResourceHeader {
    /// Compressed size in bytes (56 bits on disk).
    pub size: u64,
    /// Resource flags (`consts::resource_flag::*`).
    pub flags: u8,
    /// Absolute byte offset of the resource within the archive.
    pub offset: u64,
    /// Uncompressed size in bytes.
    pub original_size: u64,
}

impl ShortResourceHeader {
    pub(crate) const SIZE: usize = consts::SIZEOF_SHORT_RESHDR;

    pub(crate) fn parse(bytes: &[u8], offset: &mut usize) -> Result<Self> {
        let size_and_flags: u64 = bytes.gread_with(offset, LE)?;
        let size = size_and_flags & 0x00FF_FFFF_FFFF_FFFF;
        let flags = (size_and_flags >> 56) as u8;
        let resource_offset: u64 = bytes.gread_with(offset, LE)?;
        let original_size: u64 = bytes.gread_with(offset, LE)?;
        Ok(ShortResourceHeader {
            size,
            flags,
            offset: resource_offset,
            original_size,
        })
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
}

/// The parsed 208-byte WIM header.
#[derive(Debug, Clone)]
pub struct Header {
    pub image_tag: [u8; 8],
    pub header_size: u32,
    pub version: u32,
    pub flags: u32,
    /// Uncompressed chunk size used by every compressed resource in this archive.
    pub chunk_size: u32,
    pub guid: [u8; 16],
    pub part_number: u16,
    pub total_parts: u16,
    pub image_count: u32,
    pub offset_table: ShortResourceHeader,
    pub xml_data: ShortResourceHeader,
    pub boot_metadata: ShortResourceHeader,
    pub boot_index: u32,
    pub integrity: ShortResourceHeader,
}

impl Header {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < consts::SIZEOF_HEADER {
            return Err(Error::Malformed(format!(
                "header buffer too short: {} < {}",
                bytes.len(),
                consts::SIZEOF_HEADER
            )));
        }

        let mut offset = 0usize;
        let mut image_tag = [0u8; 8];
        image_tag.copy_from_slice(bytes.gread_with::<&[u8]>(&mut offset, 8)?);
        if image_tag != consts::WIM_IMAGE_TAG {
            return Err(Error::InvalidHeader(image_tag));
        }

        let header_size: u32 = bytes.gread_with(&mut offset, LE)?;
        let version: u32 = bytes.gread_with(&mut offset, LE)?;
        if version != consts::VERSION_DEFAULT {
            return Err(Error::Unsupported(format!(
                "unsupported WIM version {:#x}, only {:#x} is supported",
                version,
                consts::VERSION_DEFAULT
            )));
        }

        let flags: u32 = bytes.gread_with(&mut offset, LE)?;
        if flags & header_flag::SPANNED != 0 {
            return Err(Error::Unsupported("spanned WIM archives are not supported".into()));
        }

        let chunk_size: u32 = bytes.gread_with(&mut offset, LE)?;

        let mut guid = [0u8; 16];
        guid.copy_from_slice(bytes.gread_with::<&[u8]>(&mut offset, 16)?);

        let part_number: u16 = bytes.gread_with(&mut offset, LE)?;
        let total_parts: u16 = bytes.gread_with(&mut offset, LE)?;
        let image_count: u32 = bytes.gread_with(&mut offset, LE)?;

        let offset_table = ShortResourceHeader::parse(bytes, &mut offset)?;
        let xml_data = ShortResourceHeader::parse(bytes, &mut offset)?;
        let boot_metadata = ShortResourceHeader::parse(bytes, &mut offset)?;
        let boot_index: u32 = bytes.gread_with(&mut offset, LE)?;
        let integrity = ShortResourceHeader::parse(bytes, &mut offset)?;

        log::debug!(
            "parsed WIM header: version={:#x} chunk_size={:#x} images={} offset_table={:?}",
            version, chunk_size, image_count, offset_table
        );

        // Remaining bytes up to SIZEOF_HEADER are reserved; no need to read them.
        Ok(Header {
            image_tag,
            header_size,
            version,
            flags,
            chunk_size,
            guid,
            part_number,
            total_parts,
            image_count,
            offset_table,
            xml_data,
            boot_metadata,
            boot_index,
            integrity,
        })
    }

    /// The compression-algorithm key used for decompressor lookup, masked
    /// out of the header flags per §4.1.
    pub fn compression_algorithm(&self) -> u32 {
        self.flags & header_flag::COMPRESSION_ALGORITHM_MASK
    }
}
