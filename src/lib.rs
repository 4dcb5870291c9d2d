//! A read-only parser and random-access reader for the Windows Imaging
//! Format (WIM).
//!
//! Start with [`Archive::open`] or [`Archive::new`], enumerate images with
//! [`Archive::images`], and navigate each image's tree from
//! [`Image::root`] via [`DirectoryEntry::get`] / [`DirectoryEntry::iterdir`].
//! Opening a file's content comes down to [`DirectoryEntry::open`], which
//! returns a `Read + Seek` view over the (possibly chunk-compressed) bytes.
//!
//! The actual decompression codecs (XPRESS/LZX/LZMS) are not implemented
//! here; register implementations of [`Decompressor`] with a
//! [`DecompressorRegistry`] and construct the archive with
//! [`Archive::with_decompressors`].

pub mod archive;
pub mod compress;
pub mod consts;
pub mod directory;
pub mod error;
pub mod header;
pub mod image;
pub mod options;
pub mod reparse;
pub mod resource;
pub mod security;
pub mod timestamp;

pub use archive::Archive;
pub use compress::{CompressedStream, Decompressor, DecompressorRegistry};
pub use directory::{DirIter, DirectoryEntry};
pub use error::{Error, Result};
pub use header::Header;
pub use image::Image;
pub use options::ParseOptions;
pub use reparse::ReparsePoint;
pub use resource::{Resource, ResourceStream};
pub use security::SecurityBlock;
