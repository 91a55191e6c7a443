//! CJK codepoint detection and per-codepoint word segmentation (spec §4.1.2).
//!
//! Scripts without whitespace word boundaries are broken at (almost) every
//! codepoint instead of at space boundaries, so the line composer can wrap
//! them like any other sequence of atomic "words".
//!
//! Thai is a different kind of non-whitespace-delimited script: it needs
//! dictionary-driven grapheme clustering rather than a codepoint-range test,
//! and that clustering is intentionally not ported here (SPEC_FULL.md §C).
//! Thai runs fall through as ordinary whitespace-delimited words.

use crate::model::{GlyphRun, Style, WordList};

/// Ranges pulled verbatim from the component design: Hiragana, Katakana, CJK
/// Unified Ideographs Extension A, CJK Unified Ideographs, Hangul Syllables,
/// CJK Compatibility Ideographs, halfwidth/fullwidth forms, and the
/// Supplementary Ideographic Plane.
const CJK_RANGES: &[(u32, u32)] = &[
    (0x3040, 0x309F),   // Hiragana
    (0x30A0, 0x30FF),   // Katakana
    (0x3400, 0x4DBF),   // CJK Unified Ideographs Extension A
    (0x4E00, 0x9FFF),   // CJK Unified Ideographs
    (0xAC00, 0xD7AF),   // Hangul Syllables
    (0xF900, 0xFAFF),   // CJK Compatibility Ideographs
    (0xFF00, 0xFFEF),   // Halfwidth and Fullwidth Forms
    (0x20000, 0x2A6DF), // CJK Unified Ideographs Extension B
];

/// True if `c` falls in one of the breakable-everywhere CJK ranges.
pub fn is_cjk(c: char) -> bool {
    let cp = c as u32;
    CJK_RANGES.iter().any(|&(lo, hi)| cp >= lo && cp <= hi)
}

/// True if the string contains at least one CJK codepoint.
pub fn contains_cjk(s: &str) -> bool {
    s.chars().any(is_cjk)
}

/// Segment a run of text into line-composer words.
///
/// Non-CJK text is pushed as a single run. Runs containing CJK codepoints are
/// split so each CJK codepoint becomes its own one-character word (a legal
/// break point on either side), while runs of non-CJK codepoints embedded in
/// CJK text (numbers, Latin inline text) stay glued together as a single
/// word, matching the "almost every codepoint" wording in the component
/// design rather than a blanket per-codepoint split.
pub fn push_segmented(words: &mut WordList, text: &str, style: Style) {
    if !contains_cjk(text) {
        if !text.is_empty() {
            words.push_back(GlyphRun::new(text, style));
        }
        return;
    }

    let mut current = String::new();
    for c in text.chars() {
        if is_cjk(c) {
            if !current.is_empty() {
                words.push_back(GlyphRun::new(std::mem::take(&mut current), style));
            }
            let mut buf = String::new();
            buf.push(c);
            words.push_back(GlyphRun::new(buf, style));
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push_back(GlyphRun::new(current, style));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cjk_unified_ideographs() {
        assert!(is_cjk('書'));
    }

    #[test]
    fn detects_hiragana_katakana_hangul() {
        assert!(is_cjk('あ'));
        assert!(is_cjk('ア'));
        assert!(is_cjk('한'));
    }

    #[test]
    fn ascii_is_not_cjk() {
        assert!(!is_cjk('a'));
        assert!(!is_cjk(' '));
    }

    #[test]
    fn pure_latin_run_stays_one_word() {
        let mut words = WordList::new();
        push_segmented(&mut words, "hello", Style::Regular);
        assert_eq!(words.len(), 1);
        assert_eq!(words.front().unwrap().text, "hello");
    }

    #[test]
    fn cjk_run_splits_per_codepoint() {
        let mut words = WordList::new();
        push_segmented(&mut words, "東京都", Style::Regular);
        assert_eq!(words.len(), 3);
        assert_eq!(words.get(0).unwrap().text, "東");
        assert_eq!(words.get(1).unwrap().text, "京");
        assert_eq!(words.get(2).unwrap().text, "都");
    }

    #[test]
    fn hello_world_exclaim_matches_documented_scenario() {
        let mut words = WordList::new();
        push_segmented(&mut words, "Hello世界!", Style::Regular);
        let texts: Vec<_> = words.iter().map(|w| w.text.clone()).collect();
        assert_eq!(texts, vec!["Hello", "世", "界", "!"]);
    }

    #[test]
    fn mixed_latin_and_cjk_glues_latin_runs() {
        let mut words = WordList::new();
        push_segmented(&mut words, "abc書def", Style::Regular);
        assert_eq!(words.len(), 3);
        assert_eq!(words.get(0).unwrap().text, "abc");
        assert_eq!(words.get(1).unwrap().text, "書");
        assert_eq!(words.get(2).unwrap().text, "def");
    }
}
