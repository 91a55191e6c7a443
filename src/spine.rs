//! Minimal spine/section descriptor list (SPEC_FULL.md §C).
//!
//! Not a navigation state machine: no history, no bookmarks, no UI. Just the
//! ordered list of section ids the host hands the Reader Cursor at
//! construction so `ReaderPosition::spine_index` has something to range
//! over, grounded on the flattened, href-bearing shape of the teacher's
//! `navigation::NavPoint`/`Navigation` trimmed down to the core's needs.

/// One section in reading order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionDescriptor {
    /// Opaque identifier the host resolves to section content (a file path,
    /// an archive entry name, a database key — the core never interprets it).
    pub id: String,
    /// Human-readable label, if the source document provided one (a TOC
    /// entry title, a chapter heading). Not required for layout.
    pub label: Option<String>,
}

impl SectionDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// The ordered spine: every section of the document, in reading order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Spine {
    sections: Vec<SectionDescriptor>,
}

impl Spine {
    pub fn new(sections: Vec<SectionDescriptor>) -> Self {
        Self { sections }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, index: u16) -> Option<&SectionDescriptor> {
        self.sections.get(index as usize)
    }

    /// Number of sections, clamped to the `u16` range `spine_index` uses.
    pub fn section_count(&self) -> u16 {
        self.sections.len().min(u16::MAX as usize) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_spine_has_zero_sections() {
        let spine = Spine::default();
        assert_eq!(spine.section_count(), 0);
        assert!(spine.is_empty());
    }

    #[test]
    fn get_returns_section_by_index() {
        let spine = Spine::new(vec![
            SectionDescriptor::new("ch1.xhtml").with_label("Chapter One"),
            SectionDescriptor::new("ch2.xhtml"),
        ]);
        assert_eq!(spine.section_count(), 2);
        assert_eq!(spine.get(0).unwrap().label.as_deref(), Some("Chapter One"));
        assert_eq!(spine.get(1).unwrap().label, None);
        assert!(spine.get(2).is_none());
    }
}
