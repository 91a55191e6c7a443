//! Reader Cursor (C5, spec §4.5): a flat, bidirectional navigation model
//! over a multi-chapter document's section caches.
//!
//! Integrates C3+C1+C2 (`reflow_layout::drive::ChapterDriver`) and C4
//! (`reflow_cache`): `next_page`/`prev_page` walk a [`ReaderPosition`],
//! `ensure_cached` drives the parser one batch at a time when a section's
//! cache doesn't yet cover the requested page.

pub mod background;
pub mod progress;

use std::collections::HashMap;

use reflow_cache::storage::Storage;
use reflow_cache::OpenOutcome;
use reflow_core::abort::ShouldAbort;
use reflow_core::error::{CoreError, ErrorKind, ErrorPhase};
use reflow_core::hyphenate::Hyphenator;
use reflow_core::imagecache::ImageCache;
use reflow_core::metrics::TextMetrics;
use reflow_core::model::{BlockStyle, RenderConfig, WordList};
use reflow_core::parser::ParserCheckpoint;
use reflow_core::spine::Spine;
use reflow_core::style::StyleResolver;
use reflow_layout::drive::{ChapterDriver, DriveOutcome};

pub use reflow_core::model::ReaderPosition;

fn unavailable(message: impl Into<String>) -> CoreError {
    CoreError::new(ErrorPhase::Navigation, ErrorKind::PageUnavailable, message)
}

/// Resolves a spine section id (spec §3 "Section") to its raw document
/// bytes, so the cursor can (re)build a cache on demand without owning any
/// notion of archive/filesystem layout itself.
pub trait SectionSource {
    fn open(&self, section_id: &str) -> Result<Vec<u8>, CoreError>;
}

/// In-flight, resumable parse state for the section currently being
/// extended. Spec §5: "Word lists, page builders, and parser state are not
/// shared" — at most one of these exists at a time, for the section
/// currently under construction.
struct ChapterBuildState {
    spine_index: u16,
    document: Vec<u8>,
    checkpoint: ParserCheckpoint,
    anchors: HashMap<String, u64>,
    pending_words: WordList,
    pending_block_style: BlockStyle,
}

fn cache_path(cache_dir: &str, section_id: &str) -> String {
    format!("{cache_dir}/{section_id}.cache")
}

/// Flat, bidirectional navigation over a document's section caches.
pub struct ReaderCursor<'a> {
    spine: &'a Spine,
    cache_dir: String,
    cfg: RenderConfig,
    position: ReaderPosition,
    build_state: Option<ChapterBuildState>,
    /// Spine indices whose chapter has been driven to `DriveOutcome::Finished`
    /// this session, so `ensure_cached` never re-opens and re-parses a
    /// fully-drained section from byte zero just because the caller asked
    /// for a page past the end (spec §7 `PageUnavailable`: "source
    /// exhausted", not "re-derive the same pages again").
    finished_sections: std::collections::HashSet<u16>,
}

impl<'a> ReaderCursor<'a> {
    pub fn new(spine: &'a Spine, cache_dir: impl Into<String>, cfg: RenderConfig) -> Self {
        Self {
            spine,
            cache_dir: cache_dir.into(),
            cfg,
            position: ReaderPosition::start(),
            build_state: None,
            finished_sections: std::collections::HashSet::new(),
        }
    }

    pub fn position(&self) -> ReaderPosition {
        self.position
    }

    /// Restore a position previously persisted via [`progress::write`].
    pub fn restore_position(&mut self, position: ReaderPosition) {
        self.position = position;
    }

    fn section_id(&self, spine_index: u16) -> Result<&'a str, CoreError> {
        self.spine
            .get(spine_index)
            .map(|s| s.id.as_str())
            .ok_or_else(|| unavailable(format!("no section at spine index {spine_index}")))
    }

    /// Cached page count for `spine_index`, or `0` if no cache exists yet
    /// (not an error: an absent cache just means nothing is ready).
    fn cached_page_count<St: Storage>(&self, storage: &St, spine_index: u16) -> Result<u16, CoreError> {
        let id = self.section_id(spine_index)?;
        let path = cache_path(&self.cache_dir, id);
        match reflow_cache::open(storage, &path, &self.cfg)? {
            OpenOutcome::Hit(handle) => Ok(handle.page_count()),
            OpenOutcome::Miss => Ok(0),
        }
    }

    /// Ensure page `page` of `spine_index` is present in its section cache,
    /// driving the chapter parser through one more batch if it isn't (spec
    /// §4.5 `ensure_cached`). A single call advances at most one batch;
    /// callers that still see `PageUnavailable` and want to keep building
    /// should call again (observing their own `should_abort`).
    #[allow(clippy::too_many_arguments)]
    pub fn ensure_cached<St, Sr, S, H, M, I, A>(
        &mut self,
        storage: &St,
        source: &Sr,
        style_resolver: &S,
        hyphenator: &H,
        metrics: &M,
        images: &I,
        should_abort: &A,
        spine_index: u16,
        page: u16,
    ) -> Result<(), CoreError>
    where
        St: Storage,
        Sr: SectionSource,
        S: StyleResolver,
        H: Hyphenator,
        M: TextMetrics,
        I: ImageCache,
        A: ShouldAbort,
    {
        if page < self.cached_page_count(storage, spine_index)? {
            return Ok(());
        }
        if self.finished_sections.contains(&spine_index) {
            return Err(unavailable(format!(
                "section {spine_index} has no page {page}: already fully built"
            )));
        }

        let resuming = self
            .build_state
            .as_ref()
            .is_some_and(|s| s.spine_index == spine_index);
        if !resuming {
            let id = self.section_id(spine_index)?;
            let document = source.open(id)?;
            self.build_state = Some(ChapterBuildState {
                spine_index,
                document,
                checkpoint: ParserCheckpoint::start(),
                anchors: HashMap::new(),
                pending_words: WordList::new(),
                pending_block_style: BlockStyle::Left,
            });
        }

        let state = self.build_state.take().expect("just populated above");
        log::debug!(
            "{} section {spine_index} to cover page {page}",
            if resuming { "resuming build of" } else { "starting build of" }
        );
        let mut driver = if resuming {
            ChapterDriver::resume(
                &state.document,
                style_resolver,
                state.checkpoint,
                state.anchors,
                state.pending_words,
                state.pending_block_style,
                &self.cfg,
                metrics,
            )
        } else {
            ChapterDriver::new(&state.document, style_resolver, &self.cfg, metrics)
        };

        let outcome = driver.drive_batch(hyphenator, metrics, images, self.cfg.show_images, should_abort);
        let new_pages = driver.take_pages();
        let next_checkpoint = driver.checkpoint();
        let next_anchors = driver.anchors().clone();
        let next_pending_words = driver.pending_words().clone();
        let next_pending_block_style = driver.pending_block_style();
        drop(driver);

        let outcome = outcome?;
        let id = self.section_id(spine_index)?;
        let path = cache_path(&self.cache_dir, id);
        if !new_pages.is_empty() || matches!(outcome, DriveOutcome::Finished) {
            reflow_cache::extend(storage, &path, &self.cfg, &new_pages)?;
        }

        if matches!(outcome, DriveOutcome::Suspended) {
            self.build_state = Some(ChapterBuildState {
                spine_index,
                document: state.document,
                checkpoint: next_checkpoint,
                anchors: next_anchors,
                pending_words: next_pending_words,
                pending_block_style: next_pending_block_style,
            });
        } else {
            self.build_state = None;
            self.finished_sections.insert(spine_index);
        }

        if page < self.cached_page_count(storage, spine_index)? {
            Ok(())
        } else {
            Err(unavailable(format!(
                "page {page} of section {spine_index} not available after one build batch"
            )))
        }
    }

    /// Advance to the next page, crossing into the next section if the
    /// current one is exhausted (spec §4.5 `next_page`).
    #[allow(clippy::too_many_arguments)]
    pub fn next_page<St, Sr, S, H, M, I, A>(
        &mut self,
        storage: &St,
        source: &Sr,
        style_resolver: &S,
        hyphenator: &H,
        metrics: &M,
        images: &I,
        should_abort: &A,
    ) -> Result<ReaderPosition, CoreError>
    where
        St: Storage,
        Sr: SectionSource,
        S: StyleResolver,
        H: Hyphenator,
        M: TextMetrics,
        I: ImageCache,
        A: ShouldAbort,
    {
        if self.position.is_cover() {
            self.position = ReaderPosition::start();
            return Ok(self.position);
        }

        let current_page = self.position.section_page.max(0) as u16;
        let spine_index = self.position.spine_index;
        // Drive the current section further before concluding it's
        // exhausted — a partial/suspended cache must not be mistaken for
        // the section's true end (spec §4.5).
        match self.ensure_cached(
            storage,
            source,
            style_resolver,
            hyphenator,
            metrics,
            images,
            should_abort,
            spine_index,
            current_page + 1,
        ) {
            Ok(()) => {
                self.position.section_page += 1;
            }
            Err(err) if err.kind == ErrorKind::PageUnavailable => {
                let next_spine = spine_index
                    .checked_add(1)
                    .filter(|&i| i < self.spine.section_count())
                    .ok_or_else(|| unavailable("already at the last page of the document"))?;
                self.ensure_cached(
                    storage,
                    source,
                    style_resolver,
                    hyphenator,
                    metrics,
                    images,
                    should_abort,
                    next_spine,
                    0,
                )?;
                self.position.spine_index = next_spine;
                self.position.section_page = 0;
            }
            Err(err) => return Err(err),
        }
        self.position.flat_page += 1;
        Ok(self.position)
    }

    /// Step back one page, including the spine-0/page-0 -> cover transition
    /// (spec §4.5 `prev_page`).
    pub fn prev_page<St: Storage>(&mut self, storage: &St, has_cover: bool) -> Result<ReaderPosition, CoreError> {
        if self.position.is_cover() {
            return Err(unavailable("already at the cover page"));
        }
        if self.position.section_page == 0 {
            if self.position.spine_index == 0 {
                if has_cover && self.cfg.show_images {
                    self.position = ReaderPosition::cover();
                    return Ok(self.position);
                }
                return Err(unavailable("already at the start of the document"));
            }
            self.position.spine_index -= 1;
            let count = self.cached_page_count(storage, self.position.spine_index)?;
            self.position.section_page = count.saturating_sub(1) as i32;
        } else {
            self.position.section_page -= 1;
        }
        self.position.flat_page = self.position.flat_page.saturating_sub(1);
        Ok(self.position)
    }

    /// Persist the current position as the progress file (spec §6.2, §4.5
    /// "progress save"). Call only with a position that actually rendered
    /// successfully (spec §7: "records the last *rendered* position... not
    /// the requested one").
    pub fn save_progress(&self, writer: &mut impl std::io::Write) -> Result<(), CoreError> {
        progress::write(writer, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflow_cache::storage::test_support::MemStorage;
    use reflow_core::abort::NeverAbort;
    use reflow_core::hyphenate::NoopHyphenator;
    use reflow_core::imagecache::NoImages;
    use reflow_core::metrics::test_support::FixedWidthMetrics;
    use reflow_core::model::ParagraphAlignment;
    use reflow_core::spine::SectionDescriptor;
    use reflow_core::style::TagOnlyStyleResolver;

    struct StaticSource(HashMap<&'static str, &'static str>);

    impl SectionSource for StaticSource {
        fn open(&self, section_id: &str) -> Result<Vec<u8>, CoreError> {
            self.0
                .get(section_id)
                .map(|s| s.as_bytes().to_vec())
                .ok_or_else(|| unavailable(format!("unknown section {section_id}")))
        }
    }

    fn cfg() -> RenderConfig {
        RenderConfig {
            font_id: 0,
            line_compression: 1.0,
            indent_level: 0,
            spacing_level: 0,
            paragraph_alignment: ParagraphAlignment::Left,
            hyphenation_enabled: false,
            show_images: false,
            viewport_width: 100,
            viewport_height: 40,
        }
    }

    fn two_chapter_spine() -> Spine {
        Spine::new(vec![
            SectionDescriptor::new("ch0"),
            SectionDescriptor::new("ch1"),
        ])
    }

    #[test]
    fn ensure_cached_builds_then_reports_page_available() {
        let spine = two_chapter_spine();
        let storage = MemStorage::new();
        let mut source_map = HashMap::new();
        source_map.insert("ch0", "<p>one two three four five six seven eight</p>");
        source_map.insert("ch1", "<p>nine ten eleven twelve</p>");
        let source = StaticSource(source_map);
        let resolver = TagOnlyStyleResolver;
        let metrics = FixedWidthMetrics { advance: 10, line_height: 20 };
        let mut cursor = ReaderCursor::new(&spine, "cache", cfg());

        cursor
            .ensure_cached(
                &storage, &source, &resolver, &NoopHyphenator, &metrics, &NoImages, &NeverAbort, 0, 0,
            )
            .unwrap();
    }

    #[test]
    fn next_page_crosses_into_next_section() {
        let spine = two_chapter_spine();
        let storage = MemStorage::new();
        let mut source_map = HashMap::new();
        source_map.insert("ch0", "<p>only line</p>");
        source_map.insert("ch1", "<p>second chapter line</p>");
        let source = StaticSource(source_map);
        let resolver = TagOnlyStyleResolver;
        let metrics = FixedWidthMetrics { advance: 10, line_height: 20 };
        let mut cursor = ReaderCursor::new(&spine, "cache", cfg());

        cursor
            .ensure_cached(
                &storage, &source, &resolver, &NoopHyphenator, &metrics, &NoImages, &NeverAbort, 0, 0,
            )
            .unwrap();
        let pos = cursor
            .next_page(&storage, &source, &resolver, &NoopHyphenator, &metrics, &NoImages, &NeverAbort)
            .unwrap();
        assert_eq!(pos.spine_index, 1);
        assert_eq!(pos.section_page, 0);
    }

    #[test]
    fn next_page_resumes_a_suspended_section_instead_of_crossing_early() {
        // Simulate a chapter whose cache only covers its first page because
        // an earlier batch was suspended partway through: one page already
        // extended to storage, and a live `ChapterBuildState` holding the
        // rest of the document still to parse. `next_page` must drive that
        // remainder (via `ensure_cached`) rather than treating the 1-page
        // cache as the whole, exhausted section.
        let spine = two_chapter_spine();
        let storage = MemStorage::new();
        let mut source_map = HashMap::new();
        source_map.insert("ch0", "<p>unused: build_state already holds the real bytes</p>");
        source_map.insert("ch1", "<p>second chapter</p>");
        let source = StaticSource(source_map);
        let resolver = TagOnlyStyleResolver;
        let metrics = FixedWidthMetrics { advance: 10, line_height: 20 };
        let mut cursor = ReaderCursor::new(&spine, "cache", cfg());

        reflow_cache::extend(
            &storage,
            &cache_path("cache", "ch0"),
            &cursor.cfg,
            &[reflow_core::model::Page { elements: Vec::new() }],
        )
        .unwrap();
        cursor.build_state = Some(ChapterBuildState {
            spine_index: 0,
            document: b"<p>the remainder of chapter zero</p>".to_vec(),
            checkpoint: ParserCheckpoint::start(),
            anchors: HashMap::new(),
            pending_words: WordList::new(),
            pending_block_style: BlockStyle::Left,
        });

        let pos = cursor
            .next_page(&storage, &source, &resolver, &NoopHyphenator, &metrics, &NoImages, &NeverAbort)
            .unwrap();

        assert_eq!(pos.spine_index, 0, "must keep resuming section 0, not cross to section 1");
        assert_eq!(pos.section_page, 1);
    }

    #[test]
    fn prev_page_from_start_moves_to_cover_when_available() {
        let spine = two_chapter_spine();
        let storage = MemStorage::new();
        let mut cfg = cfg();
        cfg.show_images = true;
        let mut cursor = ReaderCursor::new(&spine, "cache", cfg);
        let pos = cursor.prev_page(&storage, true).unwrap();
        assert!(pos.is_cover());
    }

    #[test]
    fn prev_page_without_cover_fails_at_document_start() {
        let spine = two_chapter_spine();
        let storage = MemStorage::new();
        let mut cursor = ReaderCursor::new(&spine, "cache", cfg());
        assert!(cursor.prev_page(&storage, false).is_err());
    }
}
