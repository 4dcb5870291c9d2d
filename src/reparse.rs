//! Reparse-point payloads: the content of a `REPARSE_POINT` entry's default
//! stream, structured for `MOUNT_POINT`/`SYMLINK` tags and left opaque for
//! anything else.

use scroll::{Pread, LE};

use crate::consts::{reparse_tag, symlink_flag};
use crate::error::Result;

/// The structured fields `MOUNT_POINT` and `SYMLINK` buffers share: two
/// offset/length pairs into a trailing UTF-16 name buffer, plus (for
/// symlinks only) an absolute/relative flag.
#[derive(Debug, Clone)]
pub struct ReparseInfo {
    substitute_name: String,
    print_name: String,
    flags: Option<u32>,
}

/// A parsed reparse-point buffer.
#[derive(Debug, Clone)]
pub struct ReparsePoint {
    pub tag: u32,
    /// `None` for tags this crate does not structurally understand.
    pub info: Option<ReparseInfo>,
}

impl ReparsePoint {
    pub(crate) fn parse(tag: u32, bytes: &[u8]) -> Result<Self> {
        let info = match tag {
            reparse_tag::MOUNT_POINT => Some(Self::parse_info(bytes, false)?),
            reparse_tag::SYMLINK => Some(Self::parse_info(bytes, true)?),
            other => {
                log::warn!("reparse tag {:#x} is not MOUNT_POINT/SYMLINK, treating as opaque", other);
                None
            }
        };
        Ok(ReparsePoint { tag, info })
    }

    fn parse_info(bytes: &[u8], has_flags: bool) -> Result<ReparseInfo> {
        let mut offset = 0usize;
        let substitute_name_offset: u16 = bytes.gread_with(&mut offset, LE)?;
        let substitute_name_length: u16 = bytes.gread_with(&mut offset, LE)?;
        let print_name_offset: u16 = bytes.gread_with(&mut offset, LE)?;
        let print_name_length: u16 = bytes.gread_with(&mut offset, LE)?;
        let flags = if has_flags {
            let flags: u32 = bytes.gread_with(&mut offset, LE)?;
            Some(flags)
        } else {
            None
        };

        let name_buffer = &bytes[offset..];
        let substitute_name = read_utf16_slice(
            name_buffer,
            substitute_name_offset as usize,
            substitute_name_length as usize,
        )?;
        let print_name = read_utf16_slice(
            name_buffer,
            print_name_offset as usize,
            print_name_length as usize,
        )?;

        Ok(ReparseInfo { substitute_name, print_name, flags })
    }

    pub fn is_mount_point(&self) -> bool {
        self.tag == reparse_tag::MOUNT_POINT
    }

    pub fn is_symlink(&self) -> bool {
        self.tag == reparse_tag::SYMLINK
    }

    /// The link target as recorded by NT (e.g. `\??\C:\dir\target`).
    ///
    /// Resolves the structured-buffer fields guarded on whether the tag is
    /// one this crate understands structurally.
    pub fn substitute_name(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.substitute_name.as_str())
    }

    /// The display-friendly link target.
    pub fn print_name(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.print_name.as_str())
    }

    /// True for non-symlink reparse points, and for symlinks whose flags
    /// equal `ABSOLUTE`.
    pub fn absolute(&self) -> bool {
        match self.info.as_ref().and_then(|i| i.flags) {
            Some(flags) => flags == symlink_flag::ABSOLUTE,
            None => true,
        }
    }

    /// True only for symlinks whose flags equal `RELATIVE`.
    pub fn relative(&self) -> bool {
        matches!(self.info.as_ref().and_then(|i| i.flags), Some(flags) if flags == symlink_flag::RELATIVE)
    }
}

fn read_utf16_slice(buffer: &[u8], offset: usize, length: usize) -> Result<String> {
    use crate::error::Error;
    if offset + length > buffer.len() {
        return Err(Error::Malformed(format!(
            "reparse name range [{}, {}) exceeds buffer of length {}",
            offset,
            offset + length,
            buffer.len()
        )));
    }
    if length % 2 != 0 {
        return Err(Error::Malformed("reparse name length is not even".into()));
    }
    let slice = &buffer[offset..offset + length];
    let units: Vec<u16> = slice
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn mount_point_reads_print_name() {
        let print = utf16("C:\\dir\\another.txt");
        let sub = utf16("\\??\\C:\\dir\\another.txt");
        let mut name_buffer = Vec::new();
        name_buffer.extend_from_slice(&sub);
        name_buffer.extend_from_slice(&print);

        let mut buf = Vec::new();
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&(sub.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(sub.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(print.len() as u16).to_le_bytes());
        buf.extend_from_slice(&name_buffer);

        let rp = ReparsePoint::parse(reparse_tag::MOUNT_POINT, &buf).unwrap();
        assert!(rp.is_mount_point());
        assert_eq!(rp.print_name(), Some("C:\\dir\\another.txt"));
        assert!(rp.absolute());
    }

    #[test]
    fn opaque_tag_has_no_info() {
        let rp = ReparsePoint::parse(0x1234_5678, &[1, 2, 3, 4]).unwrap();
        assert!(rp.info.is_none());
        assert_eq!(rp.substitute_name(), None);
        // Non-symlink (and here, non-structurally-understood) reparse
        // points are reported as absolute.
        assert!(rp.absolute());
        assert!(!rp.relative());
    }

    #[test]
    fn relative_symlink_flag() {
        let sub = utf16("target.txt");
        let print = utf16("target.txt");
        let mut name_buffer = Vec::new();
        name_buffer.extend_from_slice(&sub);
        name_buffer.extend_from_slice(&print);

        let mut buf = Vec::new();
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&(sub.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(sub.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(print.len() as u16).to_le_bytes());
        buf.extend_from_slice(&symlink_flag::RELATIVE.to_le_bytes());
        buf.extend_from_slice(&name_buffer);

        let rp = ReparsePoint::parse(reparse_tag::SYMLINK, &buf).unwrap();
        assert!(rp.is_symlink());
        assert!(rp.relative());
        assert!(!rp.absolute());
    }
}
