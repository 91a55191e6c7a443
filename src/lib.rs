//! Streaming word/style ingestion and text-layout primitives for a
//! memory-bounded e-reader pagination engine.
//!
//! This crate owns the data model (§3), CJK word segmentation, the
//! hyphenation/metrics/CSS collaborator traits hosts implement, and the
//! SAX-driven chapter parser (C3). Line composition, page assembly, section
//! caching, and the reader cursor live in `reflow-layout`, `reflow-cache`,
//! and `reflow-cursor`, built on top of this crate.

#![cfg_attr(
    not(test),
    deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)
)]

pub mod abort;
pub mod cjk;
pub mod error;
pub mod hyphenate;
pub mod imagecache;
pub mod metrics;
pub mod model;
pub mod parser;
pub mod spine;
pub mod style;

pub use error::{CoreError, ErrorKind, ErrorPhase};
pub use model::{
    BlockStyle, GlyphRun, ImageBlock, Page, PageElement, ParagraphAlignment, PositionedWord,
    ReaderPosition, RenderConfig, Style, TextBlock, WordList, MAX_IMAGE_DIMENSION,
    MAX_PAGE_ELEMENTS, MAX_TEXTBLOCK_WORDS, SOFT_HYPHEN,
};
pub use imagecache::{ImageCache, NoImages};
pub use parser::{strip_data_uris, ChapterParserDriver, ParseOutcome, ParserCheckpoint, StyledEvent};
pub use spine::{SectionDescriptor, Spine};
