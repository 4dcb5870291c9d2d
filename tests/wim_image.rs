//! Builds a small, fully uncompressed WIM archive in memory (one image:
//! `file.txt`, `ads.txt` with an alternate stream, `link.txt` as a mount
//! point, and `dir/another.txt`) and exercises the public navigation API
//! against it end to end.

use std::io::Cursor;

use wim::options::ParseOptions;
use wim::Archive;

/// Surfaces `log::debug!` output (header parse, resource-table size) when
/// these tests are run with `--nocapture`; harmless no-op otherwise.
fn init_logging() {
    let _ = stderrlog::new().verbosity(4).init();
}

fn align8(x: usize) -> usize {
    (x + 7) & !7
}

fn utf16(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

/// Accumulates bytes for one image's decompressed metadata stream,
/// tracking the absolute position so alignment matches what
/// `DirectoryEntry::parse_at` expects.
struct MetadataBuilder {
    buf: Vec<u8>,
}

impl MetadataBuilder {
    fn new() -> Self {
        MetadataBuilder { buf: Vec::new() }
    }

    fn pos(&self) -> usize {
        self.buf.len()
    }

    fn align_to_8(&mut self) {
        let target = align8(self.pos());
        self.buf.resize(target, 0);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    fn security_block(&mut self) {
        self.u32(8); // total_length
        self.u32(0); // num_entries
    }

    /// Writes one directory entry and returns its absolute start offset.
    /// `streams` is empty for entries relying on the synthetic default
    /// stream (keyed by `default_hash`); non-empty for explicit stream
    /// tables (e.g. alternate data streams).
    fn entry(
        &mut self,
        attributes: u32,
        reparse_tag: u32,
        name: &str,
        short_name: &str,
        default_hash: [u8; 20],
        streams: &[(&str, [u8; 20])],
        subdir_offset: u64,
    ) -> usize {
        // Every record begins 8-byte aligned, whether it's the image root,
        // a sibling reached after the previous one's (possibly unaligned)
        // end, or a child reached via a stored subdir_offset.
        self.align_to_8();
        let start = self.pos();
        let name_bytes = utf16(name);
        let short_name_bytes = utf16(short_name);

        let length_pos = self.pos();
        self.u64(0); // length placeholder, patched below
        self.u32(attributes);
        self.u32(0); // security_id
        self.u64(subdir_offset);
        for _ in 0..5 {
            self.u64(0); // reserved
        }
        self.u64(0); // creation_time
        self.u64(0); // last_access_time
        self.u64(0); // last_write_time
        self.u32(reparse_tag);
        self.u32(0); // reparse_reserved
        self.u64(0); // hard_link
        self.u16(streams.len() as u16);
        self.u16(short_name_bytes.len() as u16);
        self.u16(name_bytes.len() as u16);
        self.bytes(&default_hash);

        if !name_bytes.is_empty() {
            self.bytes(&name_bytes);
            self.u16(0); // NUL terminator
        }
        if !short_name_bytes.is_empty() {
            self.bytes(&short_name_bytes);
            self.u16(0);
        }

        let end = self.pos();
        let length = (end - start) as u64;
        self.buf[length_pos..length_pos + 8].copy_from_slice(&length.to_le_bytes());

        for (stream_name, hash) in streams {
            self.align_to_8();
            let stream_start = self.pos();
            let stream_length_pos = self.pos();
            self.u64(0); // length placeholder
            self.u64(0); // reserved
            self.bytes(hash);
            let name_bytes = utf16(stream_name);
            self.u16(name_bytes.len() as u16);
            if !name_bytes.is_empty() {
                self.bytes(&name_bytes);
                self.u16(0);
            }
            let stream_end = self.pos();
            let stream_length = (stream_end - stream_start) as u64;
            self.buf[stream_length_pos..stream_length_pos + 8]
                .copy_from_slice(&stream_length.to_le_bytes());
        }

        start
    }

    fn terminator(&mut self) {
        self.align_to_8();
        self.u64(0);
    }
}

struct ArchiveBuilder {
    buf: Vec<u8>,
}

impl ArchiveBuilder {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.resize(208, 0);
        ArchiveBuilder { buf }
    }

    fn append_resource(&mut self, data: &[u8]) -> (u64, u64) {
        let offset = self.buf.len() as u64;
        self.buf.extend_from_slice(data);
        (offset, data.len() as u64)
    }

    fn table_entry(&self, offset: u64, size: u64, flags: u8, hash: [u8; 20]) -> Vec<u8> {
        let mut v = Vec::new();
        let size_and_flags = (size & 0x00FF_FFFF_FFFF_FFFF) | ((flags as u64) << 56);
        v.extend_from_slice(&size_and_flags.to_le_bytes());
        v.extend_from_slice(&offset.to_le_bytes());
        v.extend_from_slice(&size.to_le_bytes());
        v.extend_from_slice(&0u16.to_le_bytes()); // part_number
        v.extend_from_slice(&0u32.to_le_bytes()); // reference_count
        v.extend_from_slice(&hash);
        v
    }

    fn finish(mut self, offset_table_offset: u64, offset_table_size: u64) -> Vec<u8> {
        let header = &mut self.buf[0..208];
        header[0..8].copy_from_slice(b"MSWIM\0\0\0");
        header[8..12].copy_from_slice(&208u32.to_le_bytes());
        header[12..16].copy_from_slice(&0x0001_0d00u32.to_le_bytes());
        header[16..20].copy_from_slice(&0u32.to_le_bytes()); // flags: uncompressed
        header[20..24].copy_from_slice(&0x8000u32.to_le_bytes()); // chunk_size (unused, nothing compressed)
        // guid: header[24..40] left zero
        header[40..42].copy_from_slice(&1u16.to_le_bytes()); // part_number
        header[42..44].copy_from_slice(&1u16.to_le_bytes()); // total_parts
        header[44..48].copy_from_slice(&1u32.to_le_bytes()); // image_count
        // offset_table short resource header @ 48
        header[48..56].copy_from_slice(&offset_table_size.to_le_bytes());
        header[56..64].copy_from_slice(&offset_table_offset.to_le_bytes());
        header[64..72].copy_from_slice(&offset_table_size.to_le_bytes());
        // xml_data @72..96, boot_metadata @96..120, boot_index @120..124, integrity @124..148 all zero
        self.buf
    }
}

const FILE_ATTR_DIRECTORY: u32 = 0x0000_0010;
const REPARSE_TAG_MOUNT_POINT: u32 = 0xA000_0003;
const FILE_ATTR_REPARSE_POINT: u32 = 0x0000_0400;

struct Fixture {
    bytes: Vec<u8>,
    file_len: u64,
    ads_default_len: u64,
    ads_alt_len: u64,
    ads_alt_content: Vec<u8>,
    another_len: u64,
}

fn build_archive() -> Fixture {
    let file_hash = [1u8; 20];
    let ads_default_hash = [2u8; 20];
    let ads_alt_hash = [3u8; 20];
    let link_hash = [4u8; 20];
    let another_hash = [5u8; 20];

    let file_content = b"hello from file.txt, seventy bytes padded out with filler...".to_vec();
    let ads_default_content = b"default ads stream content...".to_vec();
    let ads_alt_content = b"alternate data stream payload!!!!!!!!".to_vec();
    let another_content = b"content of dir/another.txt, sixty bytes of filler text!!!!".to_vec();

    // MOUNT_POINT reparse buffer: substitute + print name, both pointing at
    // the same target for simplicity.
    let print_name = utf16("C:\\dir\\another.txt");
    let sub_name = utf16("\\??\\C:\\dir\\another.txt");
    let mut link_content = Vec::new();
    link_content.extend_from_slice(&0u16.to_le_bytes()); // substitute_name_offset
    link_content.extend_from_slice(&(sub_name.len() as u16).to_le_bytes());
    link_content.extend_from_slice(&(sub_name.len() as u16).to_le_bytes()); // print_name_offset
    link_content.extend_from_slice(&(print_name.len() as u16).to_le_bytes());
    link_content.extend_from_slice(&sub_name);
    link_content.extend_from_slice(&print_name);

    // Build the metadata stream (security block + directory tree) first;
    // it is wholly self-contained, addressed only by offsets within itself.
    let mut meta = MetadataBuilder::new();
    meta.security_block();
    meta.align_to_8();

    // We don't know the root's subdir_offset until we've written the root
    // entry itself, so reserve the root entry first with a placeholder,
    // then patch it once the children's start position is known.
    let root_start = meta.entry(FILE_ATTR_DIRECTORY, 0, "", "", [0u8; 20], &[], 0);
    meta.align_to_8();
    let children_of_root = meta.pos();

    meta.entry(0, 0, "file.txt", "", file_hash, &[], 0);
    meta.entry(
        0,
        0,
        "ads.txt",
        "",
        ads_default_hash,
        &[("", ads_default_hash), ("spookystream", ads_alt_hash)],
        0,
    );
    let link_attrs = FILE_ATTR_REPARSE_POINT;
    meta.entry(link_attrs, REPARSE_TAG_MOUNT_POINT, "link.txt", "", link_hash, &[], 0);

    let dir_start = meta.entry(FILE_ATTR_DIRECTORY, 0, "dir", "", [0u8; 20], &[], 0); // subdir_offset patched below
    meta.terminator(); // ends children_of_root

    let children_of_dir = meta.pos();
    meta.entry(0, 0, "another.txt", "", another_hash, &[], 0);
    meta.terminator(); // ends children_of_dir

    // Patch root.subdir_offset and dir.subdir_offset (both are the 4th
    // field in the fixed record, at byte offset 8+4+4 = 16 from entry start).
    meta.buf[root_start + 16..root_start + 24]
        .copy_from_slice(&(children_of_root as u64).to_le_bytes());
    meta.buf[dir_start + 16..dir_start + 24]
        .copy_from_slice(&(children_of_dir as u64).to_le_bytes());

    let metadata_bytes = meta.buf;

    let mut archive = ArchiveBuilder::new();
    let (metadata_offset, metadata_size) = archive.append_resource(&metadata_bytes);
    let (file_offset, file_size) = archive.append_resource(&file_content);
    let (ads_default_offset, ads_default_size) = archive.append_resource(&ads_default_content);
    let (ads_alt_offset, ads_alt_size) = archive.append_resource(&ads_alt_content);
    let (link_offset, link_size) = archive.append_resource(&link_content);
    let (another_offset, another_size) = archive.append_resource(&another_content);

    let mut table = Vec::new();
    table.extend(archive.table_entry(metadata_offset, metadata_size, 0x02, [0u8; 20]));
    table.extend(archive.table_entry(file_offset, file_size, 0, file_hash));
    table.extend(archive.table_entry(ads_default_offset, ads_default_size, 0, ads_default_hash));
    table.extend(archive.table_entry(ads_alt_offset, ads_alt_size, 0, ads_alt_hash));
    table.extend(archive.table_entry(link_offset, link_size, 0, link_hash));
    table.extend(archive.table_entry(another_offset, another_size, 0, another_hash));

    let (table_offset, table_size) = archive.append_resource(&table);
    let bytes = archive.finish(table_offset, table_size);

    Fixture {
        bytes,
        file_len: file_size,
        ads_default_len: ads_default_size,
        ads_alt_len: ads_alt_size,
        ads_alt_content,
        another_len: another_size,
    }
}

#[test]
fn navigates_a_synthetic_image() {
    init_logging();
    let fixture = build_archive();

    let archive = Archive::new(Cursor::new(fixture.bytes), ParseOptions::default()).unwrap();
    assert_eq!(archive.header().image_tag, *b"MSWIM\0\0\0");
    assert_eq!(archive.header().chunk_size, 0x8000);

    let images: Vec<_> = archive.images().collect::<Result<_, _>>().unwrap();
    assert_eq!(images.len(), 1);
    let image = &images[0];

    let mut names: Vec<_> = image.root.listdir().unwrap().into_keys().collect();
    names.sort();
    assert_eq!(names, vec!["ads.txt", "dir", "file.txt", "link.txt"]);

    let file = image.get("file.txt").unwrap();
    assert!(file.is_file());
    assert_eq!(file.size("").unwrap(), fixture.file_len);

    let ads = image.get("ads.txt").unwrap();
    assert!(ads.is_file());
    assert_eq!(ads.size("").unwrap(), fixture.ads_default_len);
    assert_eq!(ads.size("spookystream").unwrap(), fixture.ads_alt_len);
    let mut alt = ads.open("spookystream").unwrap();
    let mut buf = Vec::new();
    std::io::Read::read_to_end(&mut alt, &mut buf).unwrap();
    assert_eq!(buf, fixture.ads_alt_content);

    let link = image.get("link.txt").unwrap();
    assert!(link.is_file());
    assert!(link.is_reparse_point());
    assert!(link.is_mount_point());
    let reparse = link.reparse_point().unwrap();
    assert_eq!(reparse.print_name(), Some("C:\\dir\\another.txt"));
    assert!(reparse.absolute());

    let dir = image.get("dir").unwrap();
    assert!(dir.is_dir());
    let dir_children: Vec<_> = dir.listdir().unwrap().into_keys().collect();
    assert_eq!(dir_children, vec!["another.txt"]);

    let nested_via_slash = image.get("dir/another.txt").unwrap();
    let nested_via_backslash = image.get("dir\\another.txt").unwrap();
    assert_eq!(nested_via_slash.name, nested_via_backslash.name);
    assert_eq!(nested_via_slash.size("").unwrap(), fixture.another_len);

    assert!(image.get("does-not-exist.txt").is_err());
}

#[test]
fn resource_table_invariants_hold() {
    let fixture = build_archive();
    let len = fixture.bytes.len() as u64;
    let archive = Archive::new(Cursor::new(fixture.bytes), ParseOptions::default()).unwrap();
    for resource in archive.resources() {
        assert!(resource.offset + resource.compressed_size <= len);
        if !resource.is_compressed() {
            assert_eq!(resource.compressed_size, resource.original_size);
        }
    }
}
