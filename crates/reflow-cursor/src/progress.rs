//! Progress-file read/write (spec §6.2): the last successfully rendered
//! `(spine, section_page)`, persisted per document.
//!
//! Read defensively: files written by an older build may be the 2-byte
//! legacy form with no spine index.

use std::io::{Read, Write};

use reflow_core::error::{CoreError, ErrorKind, ErrorPhase};
use reflow_core::model::ReaderPosition;

fn io_err(e: std::io::Error) -> CoreError {
    CoreError::new(ErrorPhase::Navigation, ErrorKind::IoFailure, e.to_string())
}

/// Decode a progress-file payload. `section_page` is stored as a `u16`
/// (the cover pseudo-page is represented on disk as page `0` of spine `0`,
/// per spec §4.5 "the cover pseudo-page maps to (0, 0)").
pub fn decode(bytes: &[u8]) -> Result<ReaderPosition, CoreError> {
    if bytes.len() < 2 {
        return Err(CoreError::new(
            ErrorPhase::Navigation,
            ErrorKind::CorruptedCache,
            "progress file shorter than 2 bytes",
        ));
    }
    let section_page = u16::from_le_bytes([bytes[0], bytes[1]]);
    let spine_index = if bytes.len() >= 4 {
        u16::from_le_bytes([bytes[2], bytes[3]])
    } else {
        0
    };
    Ok(ReaderPosition {
        spine_index,
        section_page: section_page as i32,
        flat_page: 0,
    })
}

/// Encode a position for persistence. The cover pseudo-page (`section_page
/// == -1`) is written as `(0, 0)`, matching how a reader that doesn't know
/// about the cover page would resume (spec §4.5).
pub fn encode(position: ReaderPosition) -> [u8; 4] {
    let page = if position.is_cover() { 0 } else { position.section_page.max(0) as u16 };
    let mut out = [0u8; 4];
    out[0..2].copy_from_slice(&page.to_le_bytes());
    out[2..4].copy_from_slice(&position.spine_index.to_le_bytes());
    out
}

pub fn read(reader: &mut impl Read) -> Result<ReaderPosition, CoreError> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).map_err(io_err)?;
    decode(&buf)
}

pub fn write(writer: &mut impl Write, position: ReaderPosition) -> Result<(), CoreError> {
    writer.write_all(&encode(position)).map_err(io_err)
}
