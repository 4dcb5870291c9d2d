//! Crate-wide error type.
//!
//! One variant per failure kind the format can surface: a bad magic number,
//! an unsupported archive feature, a missing path/stream/resource, a
//! navigation call made on the wrong kind of entry, an I/O failure, or a
//! record that violates a format invariant.

use core::fmt;
use std::io;

#[derive(Debug)]
pub enum Error {
    /// The 8-byte image tag did not match `MSWIM\0\0\0`.
    InvalidHeader([u8; 8]),
    /// A WIM feature this crate does not implement (non-default version,
    /// spanned archives/resources, or an unregistered compression algorithm).
    Unsupported(String),
    /// A path component, stream name, or resource hash could not be found.
    FileNotFound(String),
    /// `iterdir`/`listdir` called on an entry that is not a directory.
    NotADirectory(String),
    /// A reparse accessor called on an entry without `REPARSE_POINT` set.
    NotAReparsePoint(String),
    /// The backing source failed a read or seek.
    Io(io::Error),
    /// A record violates a structural invariant (bad length, odd-length
    /// UTF-16 payload, chunk table entry out of range, hash mismatch).
    Malformed(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHeader(tag) => write!(f, "invalid WIM header magic: {:02x?}", tag),
            Error::Unsupported(msg) => write!(f, "unsupported: {}", msg),
            Error::FileNotFound(msg) => write!(f, "not found: {}", msg),
            Error::NotADirectory(msg) => write!(f, "not a directory: {}", msg),
            Error::NotAReparsePoint(msg) => write!(f, "not a reparse point: {}", msg),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Malformed(msg) => write!(f, "malformed entity: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<scroll::Error> for Error {
    fn from(err: scroll::Error) -> Self {
        Error::Malformed(err.to_string())
    }
}
