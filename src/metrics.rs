//! Text-measurement collaborator trait (spec §6.3).
//!
//! The core crate performs no glyph rasterization or font-file parsing
//! itself; it measures text through this trait, which the host implements
//! on top of whatever font backend it embeds. This mirrors the teacher's
//! `TextMeasurer` seam in `render_layout.rs`.

use crate::model::Style;

/// Host-supplied text metrics, queried by font id rather than a live font
/// handle so the trait stays object-safe and `Send`-friendly.
pub trait TextMetrics {
    /// Advance width, in layout units, of `text` rendered in `style` at
    /// `font_id`. Implementations should treat this as additive per
    /// codepoint for the CJK per-codepoint words the line composer emits.
    fn width(&self, font_id: i32, style: Style, text: &str) -> u16;

    /// Line height, in layout units, for `font_id`.
    fn line_height(&self, font_id: i32) -> u16;

    /// Width of a single ASCII space, in layout units, for `font_id`.
    fn space_width(&self, font_id: i32) -> u16;

    /// Whether `font_id` exposes grayscale-antialiased glyphs, which some
    /// hosts use to decide line-compression heuristics.
    fn supports_grayscale(&self, font_id: i32) -> bool;
}

/// A deterministic `TextMetrics` double, exported (not `cfg(test)`-gated)
/// so downstream crates (`reflow-layout`, `reflow-cursor`) can exercise
/// their own test suites without each reimplementing one.
pub mod test_support {
    use super::*;

    /// Deterministic fixed-width metrics for unit tests: every codepoint is
    /// `advance` units wide regardless of style.
    pub struct FixedWidthMetrics {
        pub advance: u16,
        pub line_height: u16,
    }

    impl TextMetrics for FixedWidthMetrics {
        fn width(&self, _font_id: i32, _style: Style, text: &str) -> u16 {
            (text.chars().count() as u32 * self.advance as u32).min(u16::MAX as u32) as u16
        }

        fn line_height(&self, _font_id: i32) -> u16 {
            self.line_height
        }

        fn space_width(&self, _font_id: i32) -> u16 {
            self.advance
        }

        fn supports_grayscale(&self, _font_id: i32) -> bool {
            false
        }
    }
}
