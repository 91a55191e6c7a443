//! Fixed 21-byte cache header (spec §4.4.1) and render-configuration
//! invalidation (spec §3 "Render configuration", §4.4.2, §7 `CorruptedCache`).

use reflow_core::error::{CoreError, ErrorKind, ErrorPhase};
use reflow_core::model::{ParagraphAlignment, RenderConfig};

/// Bump on any layout change to the on-disk format.
pub const FILE_VERSION: u8 = 1;

/// `file_version(1) + font_id(4) + line_compression(4) + extra_paragraph_spacing(1)
/// + paragraph_alignment(1) + viewport_width(2) + viewport_height(2) + page_count(2)
/// + lut_offset(4)`.
pub const HEADER_LEN: usize = 1 + 4 + 4 + 1 + 1 + 2 + 2 + 2 + 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheHeader {
    pub file_version: u8,
    pub font_id: i32,
    pub line_compression: f32,
    /// The header has no room for the full `spacing_level` range (spec
    /// §4.4.1 fixes this field as a boolean); non-default spacing (level 1
    /// or 3) collapses to `true`. A switch between level 1 and level 3 is
    /// not header-visible and will not by itself invalidate a cache.
    pub extra_paragraph_spacing: bool,
    pub paragraph_alignment: u8,
    pub viewport_width: u16,
    pub viewport_height: u16,
    pub page_count: u16,
    pub lut_offset: u32,
}

fn paragraph_alignment_tag(a: ParagraphAlignment) -> u8 {
    match a {
        ParagraphAlignment::Justified => 0,
        ParagraphAlignment::Left => 1,
    }
}

impl CacheHeader {
    /// Build the header a fresh cache for `cfg` should carry, with
    /// `page_count`/`lut_offset` left at zero pending finalization.
    pub fn for_config(cfg: &RenderConfig) -> Self {
        Self {
            file_version: FILE_VERSION,
            font_id: cfg.font_id,
            line_compression: cfg.line_compression,
            extra_paragraph_spacing: cfg.spacing_level != 0,
            paragraph_alignment: paragraph_alignment_tag(cfg.paragraph_alignment),
            viewport_width: cfg.viewport_width,
            viewport_height: cfg.viewport_height,
            page_count: 0,
            lut_offset: 0,
        }
    }

    /// True if `cfg` would produce byte-identical header fields to this one
    /// (ignoring `page_count`/`lut_offset`, which are per-build bookkeeping,
    /// not configuration).
    pub fn matches(&self, cfg: &RenderConfig) -> bool {
        let fresh = Self::for_config(cfg);
        self.file_version == FILE_VERSION
            && self.font_id == fresh.font_id
            && self.line_compression == fresh.line_compression
            && self.extra_paragraph_spacing == fresh.extra_paragraph_spacing
            && self.paragraph_alignment == fresh.paragraph_alignment
            && self.viewport_width == fresh.viewport_width
            && self.viewport_height == fresh.viewport_height
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        let mut i = 0;
        out[i] = self.file_version;
        i += 1;
        out[i..i + 4].copy_from_slice(&self.font_id.to_le_bytes());
        i += 4;
        out[i..i + 4].copy_from_slice(&self.line_compression.to_le_bytes());
        i += 4;
        out[i] = self.extra_paragraph_spacing as u8;
        i += 1;
        out[i] = self.paragraph_alignment;
        i += 1;
        out[i..i + 2].copy_from_slice(&self.viewport_width.to_le_bytes());
        i += 2;
        out[i..i + 2].copy_from_slice(&self.viewport_height.to_le_bytes());
        i += 2;
        out[i..i + 2].copy_from_slice(&self.page_count.to_le_bytes());
        i += 2;
        out[i..i + 4].copy_from_slice(&self.lut_offset.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() < HEADER_LEN {
            return Err(CoreError::new(
                ErrorPhase::Cache,
                ErrorKind::CorruptedCache,
                "header short read",
            ));
        }
        let mut i = 0;
        let file_version = bytes[i];
        i += 1;
        let font_id = i32::from_le_bytes(bytes[i..i + 4].try_into().unwrap());
        i += 4;
        let line_compression = f32::from_le_bytes(bytes[i..i + 4].try_into().unwrap());
        i += 4;
        let extra_paragraph_spacing = bytes[i] != 0;
        i += 1;
        let paragraph_alignment = bytes[i];
        i += 1;
        let viewport_width = u16::from_le_bytes(bytes[i..i + 2].try_into().unwrap());
        i += 2;
        let viewport_height = u16::from_le_bytes(bytes[i..i + 2].try_into().unwrap());
        i += 2;
        let page_count = u16::from_le_bytes(bytes[i..i + 2].try_into().unwrap());
        i += 2;
        let lut_offset = u32::from_le_bytes(bytes[i..i + 4].try_into().unwrap());
        if file_version != FILE_VERSION {
            return Err(CoreError::new(
                ErrorPhase::Cache,
                ErrorKind::UnsupportedVersion,
                format!("file_version {file_version} unknown, expected {FILE_VERSION}"),
            ));
        }
        Ok(Self {
            file_version,
            font_id,
            line_compression,
            extra_paragraph_spacing,
            paragraph_alignment,
            viewport_width,
            viewport_height,
            page_count,
            lut_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflow_core::model::ParagraphAlignment;

    fn cfg() -> RenderConfig {
        RenderConfig {
            font_id: 7,
            line_compression: 1.1,
            indent_level: 1,
            spacing_level: 1,
            paragraph_alignment: ParagraphAlignment::Justified,
            hyphenation_enabled: true,
            show_images: true,
            viewport_width: 600,
            viewport_height: 800,
        }
    }

    #[test]
    fn header_round_trips() {
        let mut h = CacheHeader::for_config(&cfg());
        h.page_count = 12;
        h.lut_offset = 4096;
        let decoded = CacheHeader::decode(&h.encode()).unwrap();
        assert_eq!(decoded, h);
    }

    #[test]
    fn matches_detects_viewport_change() {
        let h = CacheHeader::for_config(&cfg());
        let mut other = cfg();
        other.viewport_width = 601;
        assert!(!h.matches(&other));
    }

    #[test]
    fn matches_ignores_page_count_and_lut_offset() {
        let mut h = CacheHeader::for_config(&cfg());
        h.page_count = 99;
        h.lut_offset = 12345;
        assert!(h.matches(&cfg()));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut h = CacheHeader::for_config(&cfg());
        h.file_version = FILE_VERSION + 1;
        let bytes = h.encode();
        let err = CacheHeader::decode(&bytes).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedVersion);
    }
}
