//! Page Assembler (C2, spec §4.2).
//!
//! Stacks lines and images from the Line Composer into fixed-height pages,
//! handing completed pages to a caller-supplied sink that decides whether
//! the current batch should keep going (mirrors the teacher's
//! `flush_line`/page-height bookkeeping in `render_layout.rs`, generalized
//! from the teacher's single-font-metrics assumption to the spec's explicit
//! `line_compression`/`spacing_level` policy knobs).

use reflow_core::model::{ImageBlock, Page, PageElement, TextBlock};

/// Spacing level configuration for end-of-paragraph bonus spacing (spec §4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpacingLevel {
    /// No extra spacing beyond the line height already advanced.
    None,
    /// `line_height / 4` extra.
    Light,
    /// A full extra `line_height`.
    Loose,
}

impl SpacingLevel {
    pub fn from_level(level: u8) -> Self {
        match level {
            1 => Self::Light,
            3 => Self::Loose,
            _ => Self::None,
        }
    }
}

/// Per-page-assembler configuration.
#[derive(Clone, Copy, Debug)]
pub struct PageAssemblerConfig {
    pub viewport_width: u16,
    pub viewport_height: u16,
    pub base_line_height: u16,
    pub line_compression: f32,
    pub spacing_level: SpacingLevel,
}

impl PageAssemblerConfig {
    pub fn line_height(&self) -> u16 {
        ((self.base_line_height as f32) * self.line_compression).round() as u16
    }
}

/// Accumulates lines and images into fixed-height pages.
pub struct PageAssembler {
    cfg: PageAssemblerConfig,
    cursor_y: i32,
    current_page: Page,
}

impl PageAssembler {
    pub fn new(cfg: PageAssemblerConfig) -> Self {
        Self {
            cfg,
            cursor_y: 0,
            current_page: Page::new(),
        }
    }

    pub fn cursor_y(&self) -> i32 {
        self.cursor_y
    }

    pub fn current_page_is_empty(&self) -> bool {
        self.current_page.is_empty()
    }

    /// Flush the current page (even if not full) to `sink`, returning what
    /// `sink` returned, and start a fresh page.
    fn flush(&mut self, sink: &mut impl FnMut(Page) -> bool) -> bool {
        let page = std::mem::take(&mut self.current_page);
        self.cursor_y = 0;
        sink(page)
    }

    /// Add a composed line. Returns `false` if a just-triggered flush's sink
    /// reported batch completion: the caller must stop feeding more lines
    /// and arrange for a resumable suspend.
    pub fn add_line(&mut self, line: TextBlock, mut page_complete: impl FnMut(Page) -> bool) -> bool {
        let lh = self.cfg.line_height() as i32;
        let mut keep_going = true;
        if self.cursor_y + lh > self.cfg.viewport_height as i32 {
            keep_going = self.flush(&mut page_complete);
        }
        self.current_page.push(PageElement::Line(line, 0, self.cursor_y));
        self.cursor_y += lh;
        keep_going
    }

    /// Apply end-of-paragraph spacing after the last line of a text block.
    ///
    /// `interrupted` suppresses the bump for a paragraph whose layout was
    /// cut short by an abort: the interrupted paragraph's own boundary never
    /// gets the bonus spacing, but later paragraphs (after a clean resume)
    /// are unaffected, since each call only speaks to the paragraph it
    /// closes (see DESIGN.md for the Open Question this resolves).
    pub fn end_of_paragraph(&mut self, interrupted: bool) {
        if interrupted {
            return;
        }
        let lh = self.cfg.line_height() as i32;
        let bump = match self.cfg.spacing_level {
            SpacingLevel::None => 0,
            SpacingLevel::Light => lh / 4,
            SpacingLevel::Loose => lh,
        };
        self.cursor_y += bump;
    }

    /// Add an image. Returns `false` under the same batch-stop contract as
    /// [`Self::add_line`].
    pub fn add_image(&mut self, img: ImageBlock, mut page_complete: impl FnMut(Page) -> bool) -> bool {
        let h = self.cfg.viewport_height as i32;
        let tall = img.height as i32 > h / 2;
        let lh = self.cfg.line_height() as i32;
        let mut keep_going = true;

        if tall && self.cursor_y > 0 {
            keep_going = self.flush(&mut page_complete) && keep_going;
        }
        if self.cursor_y + img.height as i32 > h {
            keep_going = self.flush(&mut page_complete) && keep_going;
        }

        let x = ((self.cfg.viewport_width as i32 - img.width as i32) / 2).max(0);
        let fresh_page = self.cursor_y == 0;
        let y = if tall && fresh_page && (img.height as i32) < h {
            (h - img.height as i32) / 2
        } else {
            self.cursor_y
        };

        self.current_page.push(PageElement::Image(img.clone(), x, y));
        self.cursor_y = y + img.height as i32 + lh;

        if tall {
            keep_going = self.flush(&mut page_complete) && keep_going;
        }

        keep_going
    }

    /// Flush whatever page is in progress, even if not full. Used at
    /// end-of-chapter (spec §4.3.4 makePages step (c) "input is exhausted").
    pub fn finish(&mut self, mut page_complete: impl FnMut(Page) -> bool) -> bool {
        if self.current_page.is_empty() {
            return true;
        }
        self.flush(&mut page_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflow_core::model::{BlockStyle, PositionedWord};

    fn cfg(h: u16) -> PageAssemblerConfig {
        PageAssemblerConfig {
            viewport_width: 200,
            viewport_height: h,
            base_line_height: 20,
            line_compression: 1.0,
            spacing_level: SpacingLevel::None,
        }
    }

    fn sample_line() -> TextBlock {
        TextBlock {
            words: vec![PositionedWord {
                text: "hi".to_string(),
                x: 0,
                style: reflow_core::model::Style::Regular,
            }],
            block_style: BlockStyle::Left,
        }
    }

    #[test]
    fn lines_accumulate_until_page_full() {
        let mut assembler = PageAssembler::new(cfg(50));
        let mut pages_flushed = Vec::new();
        for _ in 0..3 {
            assembler.add_line(sample_line(), |p| {
                pages_flushed.push(p);
                true
            });
        }
        // 20 + 20 + 20 > 50 on the third line, so one flush occurs.
        assert_eq!(pages_flushed.len(), 1);
        assert_eq!(pages_flushed[0].elements.len(), 2);
    }

    #[test]
    fn page_complete_false_propagates_as_stop() {
        let mut assembler = PageAssembler::new(cfg(30));
        assembler.add_line(sample_line(), |_| true);
        let keep_going = assembler.add_line(sample_line(), |_| false);
        assert!(!keep_going);
    }

    #[test]
    fn light_spacing_adds_quarter_line_height() {
        let mut a = cfg(1000);
        a.spacing_level = SpacingLevel::Light;
        let mut assembler = PageAssembler::new(a);
        assembler.add_line(sample_line(), |_| true);
        let before = assembler.cursor_y();
        assembler.end_of_paragraph(false);
        assert_eq!(assembler.cursor_y(), before + 5);
    }

    #[test]
    fn interrupted_paragraph_suppresses_spacing() {
        let mut a = cfg(1000);
        a.spacing_level = SpacingLevel::Loose;
        let mut assembler = PageAssembler::new(a);
        assembler.add_line(sample_line(), |_| true);
        let before = assembler.cursor_y();
        assembler.end_of_paragraph(true);
        assert_eq!(assembler.cursor_y(), before);
    }

    #[test]
    fn tall_image_gets_dedicated_page() {
        let mut assembler = PageAssembler::new(cfg(100));
        assembler.add_line(sample_line(), |_| true);
        let mut flushed = Vec::new();
        let img = ImageBlock {
            cached_bmp_path: "x.bmp".to_string(),
            width: 50,
            height: 80,
        };
        assembler.add_image(img, |p| {
            flushed.push(p);
            true
        });
        // one flush for the pre-existing line (tall && cursor_y>0), one for the dedicated page.
        assert_eq!(flushed.len(), 2);
        assert!(assembler.current_page_is_empty());
    }

    #[test]
    fn image_x_position_centers_horizontally() {
        let mut assembler = PageAssembler::new(cfg(1000));
        let mut placed = None;
        let img = ImageBlock {
            cached_bmp_path: "x.bmp".to_string(),
            width: 40,
            height: 20,
        };
        assembler.add_image(img, |p| {
            placed = Some(p);
            true
        });
        assembler.finish(|p| {
            placed = Some(p);
            true
        });
        let page = placed.unwrap();
        match &page.elements[0] {
            PageElement::Image(_, x, _) => assert_eq!(*x, 80),
            _ => panic!("expected image element"),
        }
    }
}
