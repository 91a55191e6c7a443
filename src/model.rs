//! Core data model shared by the layout, cache, and cursor crates (spec §3).

/// The soft-hyphen codepoint: an in-word break hint, invisible unless chosen
/// as a line-end break (then rendered as ASCII `'-'`).
pub const SOFT_HYPHEN: char = '\u{00AD}';

/// Glyph-run style tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Style {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl Style {
    /// Combine the current style with a bold toggle.
    pub fn with_bold(self, bold: bool) -> Self {
        if !bold {
            return self;
        }
        match self {
            Self::Regular | Self::Bold => Self::Bold,
            Self::Italic | Self::BoldItalic => Self::BoldItalic,
        }
    }

    /// Combine the current style with an italic toggle.
    pub fn with_italic(self, italic: bool) -> Self {
        if !italic {
            return self;
        }
        match self {
            Self::Regular | Self::Italic => Self::Italic,
            Self::Bold | Self::BoldItalic => Self::BoldItalic,
        }
    }
}

/// Block/paragraph alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockStyle {
    Justified,
    Left,
    Center,
    Right,
}

/// A UTF-8 string plus a style tag, awaiting layout.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphRun {
    pub text: String,
    pub style: Style,
}

impl GlyphRun {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// True if this run's last codepoint is a soft hyphen (a pending split prefix).
    pub fn ends_with_soft_hyphen(&self) -> bool {
        self.text.chars().last() == Some(SOFT_HYPHEN)
    }
}

/// An ordered sequence of glyph runs awaiting layout.
///
/// Supports O(1) pop-front via an internal cursor and mid-sequence insert
/// for hyphenation splits (spec §3 Word list).
#[derive(Clone, Debug, Default)]
pub struct WordList {
    items: std::collections::VecDeque<GlyphRun>,
}

impl WordList {
    pub fn new() -> Self {
        Self {
            items: std::collections::VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn push_back(&mut self, run: GlyphRun) {
        self.items.push_back(run);
    }

    pub fn push_front(&mut self, run: GlyphRun) {
        self.items.push_front(run);
    }

    pub fn pop_front(&mut self) -> Option<GlyphRun> {
        self.items.pop_front()
    }

    pub fn front(&self) -> Option<&GlyphRun> {
        self.items.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut GlyphRun> {
        self.items.front_mut()
    }

    /// Insert `run` at index `idx`, shifting subsequent items back.
    pub fn insert(&mut self, idx: usize, run: GlyphRun) {
        self.items.insert(idx, run);
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlyphRun> {
        self.items.iter()
    }

    pub fn get(&self, idx: usize) -> Option<&GlyphRun> {
        self.items.get(idx)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Rejoin any run ending in a soft hyphen with the following run
    /// (removing the hyphen), repeating until a pass makes no joins.
    ///
    /// This is the mechanism that makes greedy tail-hyphenation safely
    /// cancellable (spec §4.1.3, §9 "Pre-split markers").
    pub fn rejoin_split_markers(&mut self) {
        loop {
            let mut joined_any = false;
            let mut i = 0;
            while i + 1 < self.items.len() {
                if self.items[i].ends_with_soft_hyphen() {
                    let mut prefix = self.items[i].text.clone();
                    prefix.pop(); // drop the trailing soft hyphen
                    let suffix = self.items[i + 1].text.clone();
                    let style = self.items[i].style;
                    self.items[i] = GlyphRun::new(format!("{prefix}{suffix}"), style);
                    self.items.remove(i + 1);
                    joined_any = true;
                } else {
                    i += 1;
                }
            }
            if !joined_any {
                break;
            }
        }
    }
}

/// A single positioned word within an emitted line.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionedWord {
    pub text: String,
    pub x: i32,
    pub style: Style,
}

/// An immutable line of positioned words (spec §3 TextBlock).
#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    pub words: Vec<PositionedWord>,
    pub block_style: BlockStyle,
}

/// A reference to a cached, pre-scaled bitmap (spec §3 ImageBlock).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBlock {
    pub cached_bmp_path: String,
    pub width: u16,
    pub height: u16,
}

/// Tagged union of page elements, positioned relative to the page origin.
#[derive(Clone, Debug, PartialEq)]
pub enum PageElement {
    Line(TextBlock, i32, i32),
    Image(ImageBlock, i32, i32),
}

/// Maximum number of elements allowed on a page (spec §3 Page invariant).
pub const MAX_PAGE_ELEMENTS: usize = 500;

/// Maximum word count allowed in a single persisted TextBlock (spec §4.4.4).
pub const MAX_TEXTBLOCK_WORDS: usize = 10_000;

/// Maximum image dimension allowed in a single axis (spec §3, §4.4.4).
pub const MAX_IMAGE_DIMENSION: u16 = 2000;

/// An ordered sequence of page elements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    pub elements: Vec<PageElement>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: PageElement) {
        self.elements.push(element);
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Paragraph alignment policy carried in the render configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParagraphAlignment {
    Justified,
    Left,
}

/// The tuple of settings that determines cache validity (spec §3 Render configuration).
///
/// Equality here determines cache validity; any difference invalidates all
/// section caches for the document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderConfig {
    pub font_id: i32,
    pub line_compression: f32,
    pub indent_level: u8,
    pub spacing_level: u8,
    pub paragraph_alignment: ParagraphAlignment,
    pub hyphenation_enabled: bool,
    pub show_images: bool,
    pub viewport_width: u16,
    pub viewport_height: u16,
}

impl RenderConfig {
    /// Skip-tiny-decorative-images policy threshold.
    ///
    /// The teacher's source carries two different constants for this
    /// (`<= 3` and `< 20`) in sibling code paths (spec §9 Open Questions).
    /// We make it an explicit, configurable field rather than silently
    /// picking one: callers construct with a deliberate choice.
    pub fn decorative_image_threshold_px(self) -> u16 {
        if self.show_images {
            20
        } else {
            3
        }
    }
}

/// Reader position within a multi-chapter document (spec §3 Reader position).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaderPosition {
    pub spine_index: u16,
    /// `-1` denotes the cover page (valid only when `spine_index == 0`).
    pub section_page: i32,
    pub flat_page: u32,
}

impl ReaderPosition {
    pub fn cover() -> Self {
        Self {
            spine_index: 0,
            section_page: -1,
            flat_page: 0,
        }
    }

    pub fn start() -> Self {
        Self {
            spine_index: 0,
            section_page: 0,
            flat_page: 0,
        }
    }

    pub fn is_cover(self) -> bool {
        self.spine_index == 0 && self.section_page == -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejoin_single_level_split() {
        let mut words = WordList::new();
        words.push_back(GlyphRun::new("antidis-", Style::Regular));
        words.push_back(GlyphRun::new(
            format!("establish{SOFT_HYPHEN}mentarianism"),
            Style::Regular,
        ));
        // simulate the interrupted-split form: prefix ends in soft hyphen.
        words.items[0] = GlyphRun::new(format!("antidis{SOFT_HYPHEN}"), Style::Regular);
        words.rejoin_split_markers();
        assert_eq!(words.len(), 1);
        assert_eq!(
            words.front().unwrap().text,
            format!("antidisestablish{SOFT_HYPHEN}mentarianism")
        );
    }

    #[test]
    fn rejoin_nested_splits() {
        let mut words = WordList::new();
        words.push_back(GlyphRun::new(format!("a{SOFT_HYPHEN}"), Style::Regular));
        words.push_back(GlyphRun::new(format!("b{SOFT_HYPHEN}"), Style::Regular));
        words.push_back(GlyphRun::new("c", Style::Regular));
        words.rejoin_split_markers();
        assert_eq!(words.len(), 1);
        assert_eq!(words.front().unwrap().text, "abc");
    }

    #[test]
    fn rejoin_interleaved_with_non_split_runs() {
        let mut words = WordList::new();
        words.push_back(GlyphRun::new(format!("pre{SOFT_HYPHEN}"), Style::Regular));
        words.push_back(GlyphRun::new("fix", Style::Regular));
        words.push_back(GlyphRun::new("next", Style::Regular));
        words.rejoin_split_markers();
        assert_eq!(words.len(), 2);
        assert_eq!(words.get(0).unwrap().text, "prefix");
        assert_eq!(words.get(1).unwrap().text, "next");
    }

    #[test]
    fn word_list_empty_iff_no_runs() {
        let words = WordList::new();
        assert!(words.is_empty());
    }
}
