//! Binary on-disk section cache (C4, spec §4.4): one file per (chapter,
//! render-configuration), holding a fixed header, length-prefixed page
//! records, and a trailing page-offset LUT (spec §4.4.1, §6.1).
//!
//! Split out from `reflow-layout` because C4 is the first component that
//! touches actual storage I/O (spec §6.3 `Storage` collaborator) rather than
//! pure in-memory layout, mirroring how the teacher keeps its render-layout
//! crate free of filesystem/zip concerns.

pub mod format;
pub mod header;
pub mod storage;

use std::io::{Read, Write};

use reflow_core::error::{CoreError, ErrorKind, ErrorPhase};
use reflow_core::model::{Page, RenderConfig};

use header::{CacheHeader, FILE_VERSION, HEADER_LEN};
use storage::Storage;

fn io_err(e: std::io::Error) -> CoreError {
    CoreError::new(ErrorPhase::Cache, ErrorKind::IoFailure, e.to_string())
}

fn corrupt(message: impl Into<String>) -> CoreError {
    CoreError::new(ErrorPhase::Cache, ErrorKind::CorruptedCache, message)
}

/// Read an entire reader's contents, streaming in ~1 KB chunks (spec §6.3
/// Storage: "reads stream in ~1 KB chunks") rather than assuming a single
/// large allocation-friendly read is available.
fn read_all(reader: &mut impl Read) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out)
}

fn parse_lut(bytes: &[u8], header: &CacheHeader) -> Result<Vec<u32>, CoreError> {
    let lut_offset = header.lut_offset as usize;
    if lut_offset < HEADER_LEN || lut_offset > bytes.len() {
        return Err(corrupt("lut_offset outside file bounds"));
    }
    let lut_bytes = &bytes[lut_offset..];
    if lut_bytes.len() % 4 != 0 {
        return Err(corrupt("LUT is not a whole number of u32 entries"));
    }
    let entry_count = lut_bytes.len() / 4;
    if entry_count != header.page_count as usize {
        return Err(corrupt(format!(
            "LUT has {entry_count} entries, header declares page_count {}",
            header.page_count
        )));
    }
    let mut lut = Vec::with_capacity(entry_count);
    for chunk in lut_bytes.chunks_exact(4) {
        let offset = u32::from_le_bytes(chunk.try_into().unwrap());
        if (offset as usize) < HEADER_LEN || offset as usize >= lut_offset {
            return Err(corrupt(format!(
                "LUT entry {offset} outside page region [{HEADER_LEN}, {lut_offset})"
            )));
        }
        lut.push(offset);
    }
    Ok(lut)
}

/// Open `path`, validating its header against `cfg` and its LUT against
/// its own declared `page_count` (spec §4.4.2, §8 property 9). A header
/// mismatch, unsupported version, or structural corruption deletes the file
/// and reports a miss rather than an error — a fresh build is the only
/// recovery (spec §7 `CorruptedCache`/`UnsupportedVersion`).
fn read_and_validate<St: Storage>(
    storage: &St,
    path: &str,
    cfg: &RenderConfig,
) -> Result<Option<(CacheHeader, Vec<u8>)>, CoreError> {
    if !storage.exists(path) {
        return Ok(None);
    }
    let mut reader = storage.open_read(path).map_err(io_err)?;
    let bytes = read_all(&mut reader).map_err(io_err)?;
    drop(reader);

    let outcome = CacheHeader::decode(&bytes).and_then(|header| {
        if !header.matches(cfg) {
            return Err(corrupt("render configuration mismatch"));
        }
        parse_lut(&bytes, &header)?;
        Ok(header)
    });

    match outcome {
        Ok(header) => Ok(Some((header, bytes))),
        Err(err)
            if err.kind == ErrorKind::CorruptedCache || err.kind == ErrorKind::UnsupportedVersion =>
        {
            log::warn!("discarding section cache {path}: {err}");
            storage.remove(path).map_err(io_err)?;
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Result of opening a section cache file.
pub enum OpenOutcome<St: Storage> {
    /// The file validated cleanly; `page_count()` pages are available.
    Hit(CacheHandle<St>),
    /// No usable cache exists at `path` (absent, stale, or corrupt — any
    /// stale/corrupt file found has already been deleted).
    Miss,
}

/// A validated, open section cache. Holds only the header and LUT in
/// memory; `read_page` reopens the file per call (spec §3 "memory handles
/// are opened per-request and closed immediately").
pub struct CacheHandle<St: Storage> {
    header: CacheHeader,
    lut: Vec<u32>,
    path: String,
    _storage: std::marker::PhantomData<St>,
}

impl<St: Storage> CacheHandle<St> {
    pub fn page_count(&self) -> u16 {
        self.header.page_count
    }

    pub fn file_version(&self) -> u8 {
        self.header.file_version
    }

    /// Read and deserialize page `index`, applying the §4.4.4 guards.
    pub fn read_page(&self, storage: &St, index: u16) -> Result<Page, CoreError> {
        if index >= self.header.page_count {
            return Err(CoreError::new(
                ErrorPhase::Cache,
                ErrorKind::PageUnavailable,
                format!("page {index} beyond cached page_count {}", self.header.page_count),
            ));
        }
        let start = self.lut[index as usize];
        let end = self
            .lut
            .get(index as usize + 1)
            .copied()
            .unwrap_or(self.header.lut_offset);
        if end < start {
            return Err(corrupt("LUT entries out of order"));
        }
        let len = (end - start) as usize;
        let mut reader = storage.open_read(&self.path).map_err(io_err)?;
        let mut skip = [0u8; 1024];
        let mut remaining = start as usize;
        while remaining > 0 {
            let n = remaining.min(skip.len());
            reader.read_exact(&mut skip[..n]).map_err(io_err)?;
            remaining -= n;
        }
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).map_err(io_err)?;
        format::decode_page(&buf)
    }
}

fn write_atomic<St: Storage>(
    storage: &St,
    path: &str,
    header: &CacheHeader,
    pages_bytes: &[u8],
    lut: &[u32],
) -> Result<(), CoreError> {
    let tmp_path = format!("{path}.tmp");
    {
        let mut writer = storage.open_write(&tmp_path).map_err(io_err)?;
        writer.write_all(&header.encode()).map_err(io_err)?;
        writer.write_all(pages_bytes).map_err(io_err)?;
        for offset in lut {
            writer.write_all(&offset.to_le_bytes()).map_err(io_err)?;
        }
        writer.flush().map_err(io_err)?;
    }
    storage.rename(&tmp_path, path).map_err(io_err)
}

/// Open an existing cache for `path` under `cfg`, or report a miss.
pub fn open<St: Storage>(storage: &St, path: &str, cfg: &RenderConfig) -> Result<OpenOutcome<St>, CoreError> {
    match read_and_validate(storage, path, cfg)? {
        None => Ok(OpenOutcome::Miss),
        Some((header, bytes)) => {
            let lut = parse_lut(&bytes, &header)?;
            Ok(OpenOutcome::Hit(CacheHandle {
                header,
                lut,
                path: path.to_string(),
                _storage: std::marker::PhantomData,
            }))
        }
    }
}

/// Build a brand-new cache file containing exactly `pages`, discarding
/// anything previously at `path` (spec §4.4.1 finalize: header patched
/// last, atomic rename).
pub fn create<St: Storage>(
    storage: &St,
    path: &str,
    cfg: &RenderConfig,
    pages: &[Page],
) -> Result<(), CoreError> {
    let mut header = CacheHeader::for_config(cfg);
    let mut pages_bytes = Vec::new();
    let mut lut = Vec::with_capacity(pages.len());
    let mut offset = HEADER_LEN as u32;
    for page in pages {
        lut.push(offset);
        let encoded = format::encode_page(page)?;
        offset = offset
            .checked_add(encoded.len() as u32)
            .ok_or_else(|| corrupt("cache file exceeds u32 addressable size"))?;
        pages_bytes.extend_from_slice(&encoded);
    }
    header.page_count = pages.len().min(u16::MAX as usize) as u16;
    header.lut_offset = offset;
    write_atomic(storage, path, &header, &pages_bytes, &lut)
}

/// Extend an existing (possibly partial) cache with `new_pages`, appended
/// after whatever pages it already holds (spec §4.4.3). If no valid cache
/// exists yet, behaves like [`create`].
pub fn extend<St: Storage>(
    storage: &St,
    path: &str,
    cfg: &RenderConfig,
    new_pages: &[Page],
) -> Result<(), CoreError> {
    let Some((mut header, bytes)) = read_and_validate(storage, path, cfg)? else {
        return create(storage, path, cfg, new_pages);
    };
    let prior_lut = parse_lut(&bytes, &header)?;
    let mut pages_bytes = bytes[HEADER_LEN..header.lut_offset as usize].to_vec();
    let mut lut = prior_lut;
    let mut offset = header.lut_offset;
    for page in new_pages {
        lut.push(offset);
        let encoded = format::encode_page(page)?;
        offset = offset
            .checked_add(encoded.len() as u32)
            .ok_or_else(|| corrupt("cache file exceeds u32 addressable size"))?;
        pages_bytes.extend_from_slice(&encoded);
    }
    header.page_count = lut.len().min(u16::MAX as usize) as u16;
    header.lut_offset = offset;
    write_atomic(storage, path, &header, &pages_bytes, &lut)
}

pub use header::CacheHeader as Header;
pub use storage::{FsStorage, Storage as StorageTrait};

/// Re-exported for callers that want to sanity-check the on-disk version
/// without constructing a header.
pub const CURRENT_FILE_VERSION: u8 = FILE_VERSION;

#[cfg(test)]
mod tests {
    use super::*;
    use reflow_core::model::{
        BlockStyle, ImageBlock, PageElement, ParagraphAlignment, PositionedWord, Style, TextBlock,
    };
    use storage::test_support::MemStorage;

    fn cfg() -> RenderConfig {
        RenderConfig {
            font_id: 1,
            line_compression: 1.0,
            indent_level: 0,
            spacing_level: 0,
            paragraph_alignment: ParagraphAlignment::Left,
            hyphenation_enabled: false,
            show_images: false,
            viewport_width: 300,
            viewport_height: 400,
        }
    }

    fn line_page(text: &str) -> Page {
        let mut page = Page::new();
        page.push(PageElement::Line(
            TextBlock {
                words: vec![PositionedWord { text: text.into(), x: 0, style: Style::Regular }],
                block_style: BlockStyle::Left,
            },
            0,
            0,
        ));
        page
    }

    #[test]
    fn round_trip_then_reopen_reproduces_pages() {
        let storage = MemStorage::new();
        let cfg = cfg();
        let pages = vec![line_page("one"), line_page("two"), line_page("three")];
        create(&storage, "ch1.cache", &cfg, &pages).unwrap();

        let OpenOutcome::Hit(handle) = open(&storage, "ch1.cache", &cfg).unwrap() else {
            panic!("expected cache hit");
        };
        assert_eq!(handle.page_count(), 3);
        for (i, expected) in pages.iter().enumerate() {
            let got = handle.read_page(&storage, i as u16).unwrap();
            assert_eq!(&got, expected);
        }
    }

    #[test]
    fn config_change_invalidates_cache() {
        let storage = MemStorage::new();
        let cfg = cfg();
        create(&storage, "ch1.cache", &cfg, &[line_page("one")]).unwrap();

        let mut other = cfg;
        other.viewport_width += 1;
        let outcome = open(&storage, "ch1.cache", &other).unwrap();
        assert!(matches!(outcome, OpenOutcome::Miss));
        assert!(!storage.exists("ch1.cache"));
    }

    #[test]
    fn extend_appends_pages_without_losing_existing_ones() {
        let storage = MemStorage::new();
        let cfg = cfg();
        create(&storage, "ch1.cache", &cfg, &[line_page("one")]).unwrap();
        extend(&storage, "ch1.cache", &cfg, &[line_page("two"), line_page("three")]).unwrap();

        let OpenOutcome::Hit(handle) = open(&storage, "ch1.cache", &cfg).unwrap() else {
            panic!("expected cache hit");
        };
        assert_eq!(handle.page_count(), 3);
        assert_eq!(handle.read_page(&storage, 0).unwrap(), line_page("one"));
        assert_eq!(handle.read_page(&storage, 2).unwrap(), line_page("three"));
    }

    #[test]
    fn extend_on_missing_cache_behaves_like_create() {
        let storage = MemStorage::new();
        let cfg = cfg();
        extend(&storage, "ch1.cache", &cfg, &[line_page("only")]).unwrap();
        let OpenOutcome::Hit(handle) = open(&storage, "ch1.cache", &cfg).unwrap() else {
            panic!("expected cache hit");
        };
        assert_eq!(handle.page_count(), 1);
    }

    #[test]
    fn page_beyond_count_is_page_unavailable() {
        let storage = MemStorage::new();
        let cfg = cfg();
        create(&storage, "ch1.cache", &cfg, &[line_page("only")]).unwrap();
        let OpenOutcome::Hit(handle) = open(&storage, "ch1.cache", &cfg).unwrap() else {
            panic!("expected cache hit");
        };
        let err = handle.read_page(&storage, 5).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PageUnavailable);
    }

    #[test]
    fn image_page_round_trips() {
        let storage = MemStorage::new();
        let cfg = cfg();
        let mut page = Page::new();
        page.push(PageElement::Image(
            ImageBlock { cached_bmp_path: "a.bmp".into(), width: 100, height: 150 },
            20,
            30,
        ));
        create(&storage, "ch1.cache", &cfg, &[page.clone()]).unwrap();
        let OpenOutcome::Hit(handle) = open(&storage, "ch1.cache", &cfg).unwrap() else {
            panic!("expected cache hit");
        };
        assert_eq!(handle.read_page(&storage, 0).unwrap(), page);
    }
}
