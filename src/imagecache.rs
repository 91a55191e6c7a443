//! Image-cache collaborator contract (spec §4.3.2, §6.3).
//!
//! The core never decodes image formats or touches a filesystem itself;
//! a host provides pre-scaled bitmaps (matching the teacher's pattern of
//! keeping codec/IO concerns outside the layout crate) keyed by the
//! document-relative `href` the parser extracted from an `<img>` tag.

use crate::model::ImageBlock;

/// Resolves an `<img>` reference to a pre-scaled, cached bitmap.
pub trait ImageCache {
    /// Returns the cached bitmap for `href`, scaled to fit within
    /// `viewport_width`, or `None` if the image can't be resolved or should
    /// be skipped (below the decorative-image threshold, unsupported
    /// format, missing from the archive).
    fn resolve(&self, href: &str, viewport_width: u16) -> Option<ImageBlock>;
}

/// An `ImageCache` that never resolves anything. Used when
/// `RenderConfig::show_images` is false, or as a test double.
pub struct NoImages;

impl ImageCache for NoImages {
    fn resolve(&self, _href: &str, _viewport_width: u16) -> Option<ImageBlock> {
        None
    }
}
