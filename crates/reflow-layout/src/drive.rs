//! Chapter-to-pages orchestration (spec §4.3.4 "makePages").
//!
//! This is the piece that actually "drives C1 and C2" the way the component
//! design describes the Chapter Parser Driver doing: `reflow_core::parser`
//! only emits a flat [`StyledEvent`] stream (it can't depend on this crate's
//! `compose`/`page` without a dependency cycle, since this crate depends on
//! `reflow-core`), so this module is where that stream is actually turned
//! into pages, mirroring the teacher's `ChapterRenderer` orchestration loop
//! that ties its SAX handler to its layout engine.

use std::collections::HashMap;

use reflow_core::abort::ShouldAbort;
use reflow_core::error::CoreError;
use reflow_core::hyphenate::Hyphenator;
use reflow_core::imagecache::ImageCache;
use reflow_core::metrics::TextMetrics;
use reflow_core::model::{BlockStyle, GlyphRun, ImageBlock, Page, ParagraphAlignment, RenderConfig, Style, WordList};
use reflow_core::parser::{ChapterParserDriver, ParseOutcome, ParserCheckpoint, StyledEvent};
use reflow_core::style::StyleResolver;

use crate::compose::{compose, ComposeOutcome, LineComposerConfig};
use crate::page::{PageAssembler, PageAssemblerConfig, SpacingLevel};

/// Outcome of a [`ChapterDriver::drive_batch`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveOutcome {
    /// The chapter's last byte was consumed and every page flushed.
    Finished,
    /// `should_abort` fired. Call `checkpoint()`/`pending_words()`/
    /// `anchors()` to persist state and resume with [`ChapterDriver::resume`].
    Suspended,
}

fn default_block_style(cfg: &RenderConfig) -> BlockStyle {
    match cfg.paragraph_alignment {
        ParagraphAlignment::Justified => BlockStyle::Justified,
        ParagraphAlignment::Left => BlockStyle::Left,
    }
}

/// Spec §4.3.2: skip images with any dimension at or below the configured
/// decorative-image threshold rather than laying them out.
fn is_decorative(block: &ImageBlock, threshold_px: u16) -> bool {
    block.width <= threshold_px || block.height <= threshold_px
}

/// Spec §4.3.2: on image-resolution failure, insert an italic placeholder
/// word instead of the image.
fn image_fallback_run(alt: &str) -> GlyphRun {
    let text = if alt.is_empty() {
        "[Image]".to_string()
    } else {
        format!("[Image: {alt}]")
    };
    GlyphRun::new(text, Style::Italic)
}

/// Drives a [`ChapterParserDriver`]'s event stream into composed pages.
///
/// Owns the in-flight paragraph's word list and the page assembler so a
/// suspended batch can be resumed without replaying already-composed pages
/// (spec §4.1.8, §4.3.6).
pub struct ChapterDriver<'a, S: StyleResolver> {
    parser: ChapterParserDriver<'a, S>,
    assembler: PageAssembler,
    line_cfg: LineComposerConfig,
    pending_words: WordList,
    pending_block_style: BlockStyle,
    default_block_style: BlockStyle,
    decorative_image_threshold: u16,
    pages: Vec<Page>,
}

impl<'a, S: StyleResolver> ChapterDriver<'a, S> {
    pub fn new(source: &'a [u8], style_resolver: &'a S, cfg: &RenderConfig, metrics: &impl TextMetrics) -> Self {
        let parser = ChapterParserDriver::new(source, style_resolver, cfg.font_id);
        Self::from_parts(parser, cfg, metrics, WordList::new(), default_block_style(cfg))
    }

    /// Resume a suspended chapter. `source` must be the same document bytes
    /// the original `ChapterDriver` was built from.
    #[allow(clippy::too_many_arguments)]
    pub fn resume(
        source: &'a [u8],
        style_resolver: &'a S,
        checkpoint: ParserCheckpoint,
        anchors: HashMap<String, u64>,
        pending_words: WordList,
        pending_block_style: BlockStyle,
        cfg: &RenderConfig,
        metrics: &impl TextMetrics,
    ) -> Self {
        let parser = ChapterParserDriver::resume(source, style_resolver, cfg.font_id, checkpoint, anchors);
        Self::from_parts(parser, cfg, metrics, pending_words, pending_block_style)
    }

    fn from_parts(
        parser: ChapterParserDriver<'a, S>,
        cfg: &RenderConfig,
        metrics: &impl TextMetrics,
        pending_words: WordList,
        pending_block_style: BlockStyle,
    ) -> Self {
        let line_cfg = LineComposerConfig {
            font_id: cfg.font_id,
            viewport_width: cfg.viewport_width,
            use_greedy: false,
            indent_level: cfg.indent_level,
            hyphenation_enabled: cfg.hyphenation_enabled,
            rtl: false,
        };
        let page_cfg = PageAssemblerConfig {
            viewport_width: cfg.viewport_width,
            viewport_height: cfg.viewport_height,
            base_line_height: metrics.line_height(cfg.font_id),
            line_compression: cfg.line_compression,
            spacing_level: SpacingLevel::from_level(cfg.spacing_level),
        };
        Self {
            parser,
            assembler: PageAssembler::new(page_cfg),
            line_cfg,
            pending_words,
            pending_block_style,
            default_block_style: default_block_style(cfg),
            decorative_image_threshold: cfg.decorative_image_threshold_px(),
            pages: Vec::new(),
        }
    }

    pub fn checkpoint(&self) -> ParserCheckpoint {
        self.parser.checkpoint()
    }

    pub fn anchors(&self) -> &HashMap<String, u64> {
        self.parser.anchors()
    }

    pub fn pending_words(&self) -> &WordList {
        &self.pending_words
    }

    pub fn pending_block_style(&self) -> BlockStyle {
        self.pending_block_style
    }

    /// Drain pages completed since the last call.
    pub fn take_pages(&mut self) -> Vec<Page> {
        std::mem::take(&mut self.pages)
    }

    /// Parse and lay out until `should_abort` fires or the chapter ends.
    ///
    /// `images` resolves `<img>` references to pre-scaled bitmaps; pass
    /// [`reflow_core::imagecache::NoImages`] when `cfg.show_images` is false.
    pub fn drive_batch<H, M, I, A>(
        &mut self,
        hyphenator: &H,
        metrics: &M,
        images: &I,
        show_images: bool,
        should_abort: &A,
    ) -> Result<DriveOutcome, CoreError>
    where
        H: Hyphenator,
        M: TextMetrics,
        I: ImageCache,
        A: ShouldAbort,
    {
        let parse_outcome = self.parser.parse_batch(should_abort)?;
        let events = self.parser.take_events();

        for event in events {
            match event {
                StyledEvent::Run(run) => self.pending_words.push_back(run),
                StyledEvent::ParagraphBreak { block_style } => {
                    if !self.flush_paragraph(hyphenator, metrics, should_abort)? {
                        return Ok(DriveOutcome::Suspended);
                    }
                    self.pending_block_style = block_style.unwrap_or(self.default_block_style);
                }
                StyledEvent::Image { href, alt } => {
                    if !self.flush_paragraph(hyphenator, metrics, should_abort)? {
                        return Ok(DriveOutcome::Suspended);
                    }
                    if show_images {
                        match images.resolve(&href, self.line_cfg.viewport_width) {
                            Some(block) if is_decorative(&block, self.decorative_image_threshold) => {}
                            Some(block) => {
                                let pages = &mut self.pages;
                                self.assembler.add_image(block, |p| {
                                    pages.push(p);
                                    true
                                });
                            }
                            None => self.pending_words.push_back(image_fallback_run(&alt)),
                        }
                    }
                }
                StyledEvent::SectionEnd => {
                    if !self.flush_paragraph(hyphenator, metrics, should_abort)? {
                        return Ok(DriveOutcome::Suspended);
                    }
                    let pages = &mut self.pages;
                    self.assembler.finish(|p| {
                        pages.push(p);
                        true
                    });
                }
            }
        }

        match parse_outcome {
            ParseOutcome::Finished => Ok(DriveOutcome::Finished),
            ParseOutcome::Suspended => {
                log::debug!(
                    "chapter batch suspended at byte offset {}, {} words pending",
                    self.parser.checkpoint().byte_offset,
                    self.pending_words.len()
                );
                Ok(DriveOutcome::Suspended)
            }
        }
    }

    /// Compose everything in `pending_words` into lines and feed them to the
    /// page assembler. Returns `false` if composition was interrupted
    /// (`pending_words` retains the unlaid remainder for a later resume).
    fn flush_paragraph<H: Hyphenator, M: TextMetrics, A: ShouldAbort>(
        &mut self,
        hyphenator: &H,
        metrics: &M,
        should_abort: &A,
    ) -> Result<bool, CoreError> {
        if self.pending_words.is_empty() {
            return Ok(true);
        }
        let mut words = std::mem::take(&mut self.pending_words);
        let block_style = self.pending_block_style;
        let assembler = &mut self.assembler;
        let pages = &mut self.pages;
        let outcome = compose(
            &mut words,
            block_style,
            metrics,
            hyphenator,
            &self.line_cfg,
            should_abort,
            true,
            |line| {
                assembler.add_line(line, |p| {
                    pages.push(p);
                    true
                });
            },
        )?;
        match outcome {
            ComposeOutcome::Finished => {
                self.assembler.end_of_paragraph(false);
                Ok(true)
            }
            ComposeOutcome::Suspended => {
                self.pending_words = words;
                self.assembler.end_of_paragraph(true);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflow_core::abort::NeverAbort;
    use reflow_core::hyphenate::NoopHyphenator;
    use reflow_core::imagecache::NoImages;
    use reflow_core::metrics::test_support::FixedWidthMetrics;
    use reflow_core::style::TagOnlyStyleResolver;

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

    #[test]
    fn simple_chapter_produces_pages() {
        let resolver = TagOnlyStyleResolver;
        let metrics = FixedWidthMetrics { advance: 10, line_height: 20 };
        let render_cfg = cfg();
        let mut driver = ChapterDriver::new(
            b"<p>one two three four five six seven eight</p>",
            &resolver,
            &render_cfg,
            &metrics,
        );
        let outcome = driver
            .drive_batch(&NoopHyphenator, &metrics, &NoImages, false, &NeverAbort)
            .unwrap();
        assert_eq!(outcome, DriveOutcome::Finished);
        let pages = driver.take_pages();
        assert!(!pages.is_empty());
        assert!(pages.iter().any(|p| !p.elements.is_empty()));
    }

    #[test]
    fn heading_then_paragraph_resets_block_style() {
        let resolver = TagOnlyStyleResolver;
        let metrics = FixedWidthMetrics { advance: 10, line_height: 20 };
        let render_cfg = cfg();
        let mut driver = ChapterDriver::new(
            b"<h1>Title</h1><p>body text here</p>",
            &resolver,
            &render_cfg,
            &metrics,
        );
        driver
            .drive_batch(&NoopHyphenator, &metrics, &NoImages, false, &NeverAbort)
            .unwrap();
        let pages = driver.take_pages();
        let mut styles = Vec::new();
        for page in &pages {
            for el in &page.elements {
                if let reflow_core::model::PageElement::Line(block, _, _) = el {
                    styles.push(block.block_style);
                }
            }
        }
        assert!(styles.contains(&BlockStyle::Center));
        assert!(styles.contains(&BlockStyle::Left));
    }

    struct FakeImages(Option<ImageBlock>);

    impl reflow_core::imagecache::ImageCache for FakeImages {
        fn resolve(&self, _href: &str, _viewport_width: u16) -> Option<ImageBlock> {
            self.0.clone()
        }
    }

    fn image_elements(pages: &[Page]) -> Vec<&ImageBlock> {
        pages
            .iter()
            .flat_map(|p| p.elements.iter())
            .filter_map(|el| match el {
                reflow_core::model::PageElement::Image(block, _, _) => Some(block),
                _ => None,
            })
            .collect()
    }

    fn word_texts(pages: &[Page]) -> Vec<String> {
        pages
            .iter()
            .flat_map(|p| p.elements.iter())
            .filter_map(|el| match el {
                reflow_core::model::PageElement::Line(block, _, _) => Some(block),
                _ => None,
            })
            .flat_map(|block| block.words.iter())
            .map(|w| w.text.clone())
            .collect()
    }

    #[test]
    fn resolved_image_is_appended_to_the_page() {
        let resolver = TagOnlyStyleResolver;
        let metrics = FixedWidthMetrics { advance: 10, line_height: 20 };
        let mut render_cfg = cfg();
        render_cfg.show_images = true;
        let images = FakeImages(Some(ImageBlock {
            cached_bmp_path: "cover.bmp".to_string(),
            width: 80,
            height: 60,
        }));
        let mut driver = ChapterDriver::new(
            br#"<p>before</p><img src="cover.jpg" alt="Cover"/><p>after</p>"#,
            &resolver,
            &render_cfg,
            &metrics,
        );
        driver
            .drive_batch(&NoopHyphenator, &metrics, &images, true, &NeverAbort)
            .unwrap();
        let pages = driver.take_pages();
        assert_eq!(image_elements(&pages).len(), 1);
        assert!(!word_texts(&pages).iter().any(|t| t.starts_with("[Image")));
    }

    #[test]
    fn decorative_sized_image_is_skipped_without_fallback() {
        let resolver = TagOnlyStyleResolver;
        let metrics = FixedWidthMetrics { advance: 10, line_height: 20 };
        let mut render_cfg = cfg();
        render_cfg.show_images = true;
        let images = FakeImages(Some(ImageBlock {
            cached_bmp_path: "spacer.bmp".to_string(),
            width: 2,
            height: 2,
        }));
        let mut driver = ChapterDriver::new(
            br#"<p>before</p><img src="spacer.gif" alt=""/><p>after</p>"#,
            &resolver,
            &render_cfg,
            &metrics,
        );
        driver
            .drive_batch(&NoopHyphenator, &metrics, &images, true, &NeverAbort)
            .unwrap();
        let pages = driver.take_pages();
        assert!(image_elements(&pages).is_empty());
        assert!(!word_texts(&pages).iter().any(|t| t.starts_with("[Image")));
    }

    #[test]
    fn failed_image_resolution_inserts_italic_fallback_word() {
        let resolver = TagOnlyStyleResolver;
        let metrics = FixedWidthMetrics { advance: 10, line_height: 20 };
        let mut render_cfg = cfg();
        render_cfg.show_images = true;
        let images = FakeImages(None);
        let mut driver = ChapterDriver::new(
            br#"<p>before</p><img src="missing.jpg" alt="Cover"/><p>after</p>"#,
            &resolver,
            &render_cfg,
            &metrics,
        );
        driver
            .drive_batch(&NoopHyphenator, &metrics, &images, true, &NeverAbort)
            .unwrap();
        let pages = driver.take_pages();
        assert!(image_elements(&pages).is_empty());
        assert!(word_texts(&pages).iter().any(|t| t == "[Image: Cover]"));
    }
}
