//! Flag and tag constants from the on-disk WIM layout.
//!
//! These mirror the constants a WIM reader needs from `wimlib`/MS-WIM:
//! resource flags, header flags, file attributes, and reparse tags. Kept as
//! plain masks rather than a bitflags type, matching how the teacher crate
//! exposes PE/ELF flag constants (e.g. `pe::resource::IMAGE_RESOURCE_*`).

/// Expected value of the header's 8-byte image tag.
pub const WIM_IMAGE_TAG: [u8; 8] = *b"MSWIM\0\0\0";

/// The only header version this crate understands.
pub const VERSION_DEFAULT: u32 = 0x0001_0d00;

/// Size in bytes of the fixed WIM header.
pub const SIZEOF_HEADER: usize = 208;

/// Size in bytes of a short resource header (as embedded in the WIM header).
pub const SIZEOF_SHORT_RESHDR: usize = 24;

/// Size in bytes of a full resource-table entry.
pub const SIZEOF_RESHDR: usize = SIZEOF_SHORT_RESHDR + 2 + 4 + 20;

/// Resource flags, packed into the high byte of a resource header's `u64` size field.
pub mod resource_flag {
    /// The resource is unused (should not normally be encountered).
    pub const FREE: u8 = 0x01;
    /// The resource is a per-image metadata blob (security block + directory tree).
    pub const METADATA: u8 = 0x02;
    /// The resource is stored as a sequence of independently-compressed chunks.
    pub const COMPRESSED: u8 = 0x04;
    /// The resource spans multiple WIM parts. Unsupported by this crate.
    pub const SPANNED: u8 = 0x08;
}

/// Header flags (low 16 bits: behavioral flags; high 16 bits: compression algorithm).
pub mod header_flag {
    pub const RESERVED: u32 = 0x0000_0001;
    pub const COMPRESSION: u32 = 0x0000_0002;
    pub const READONLY: u32 = 0x0000_0004;
    pub const SPANNED: u32 = 0x0000_0008;
    pub const RESOURCE_ONLY: u32 = 0x0000_0010;
    pub const METADATA_ONLY: u32 = 0x0000_0020;
    pub const WRITE_IN_PROGRESS: u32 = 0x0000_0040;
    pub const RP_FIX: u32 = 0x0000_0080;

    /// Mask selecting the compression-algorithm bits out of `Header::flags`.
    pub const COMPRESSION_ALGORITHM_MASK: u32 = 0xFFFF_0000;

    pub const XPRESS: u32 = 0x0002_0000;
    pub const LZX: u32 = 0x0004_0000;
    pub const LZMS: u32 = 0x0008_0000;
    pub const XPRESS2: u32 = 0x0020_0000;
}

/// NTFS file attribute bits (subset relevant to navigation).
pub mod file_attribute {
    pub const READONLY: u32 = 0x0000_0001;
    pub const HIDDEN: u32 = 0x0000_0002;
    pub const SYSTEM: u32 = 0x0000_0004;
    pub const DIRECTORY: u32 = 0x0000_0010;
    pub const ARCHIVE: u32 = 0x0000_0020;
    pub const NORMAL: u32 = 0x0000_0080;
    pub const TEMPORARY: u32 = 0x0000_0100;
    pub const COMPRESSED: u32 = 0x0000_0800;
    pub const REPARSE_POINT: u32 = 0x0000_0400;
    pub const ENCRYPTED: u32 = 0x0000_4000;
}

/// Reparse point tags (subset this crate understands structurally).
pub mod reparse_tag {
    pub const MOUNT_POINT: u32 = 0xA000_0003;
    pub const SYMLINK: u32 = 0xA000_000C;
}

/// Symlink reparse buffer flags.
pub mod symlink_flag {
    pub const ABSOLUTE: u32 = 0;
    pub const RELATIVE: u32 = 1;
}
