//! Hyphenation collaborator trait and soft-hyphen pre-split pass (spec §4.1.4, §6.3).

use crate::abort::{PollCadence, ShouldAbort, PRESPLIT_POLL_CADENCE};
use crate::model::{GlyphRun, WordList, SOFT_HYPHEN};

/// A single legal break point inside a word, as reported by a `Hyphenator`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BreakOffset {
    /// Byte offset into the word at which a break may occur.
    pub byte_offset: usize,
    /// Whether choosing this break requires inserting a visible hyphen
    /// (true for dictionary-derived breaks; false when the break point is
    /// already a soft hyphen in the source text).
    pub requires_inserted_hyphen: bool,
}

/// Host-supplied hyphenation dictionary lookup.
///
/// The core never ships its own hyphenation patterns; hosts provide a
/// dictionary-backed or heuristic implementation.
pub trait Hyphenator {
    /// Return legal break offsets within `word`, in ascending byte-offset
    /// order. `strict` requests a conservative dictionary (fewer, safer
    /// breaks), used when a prior pass already tried a looser one and still
    /// overflowed.
    fn break_offsets(&self, word: &str, strict: bool) -> Vec<BreakOffset>;
}

/// A `Hyphenator` that finds no breaks beyond ones already marked with an
/// explicit soft hyphen in the source text. Suitable when `hyphenation_enabled`
/// is false in the render configuration, or as a test double.
pub struct NoopHyphenator;

impl Hyphenator for NoopHyphenator {
    fn break_offsets(&self, _word: &str, _strict: bool) -> Vec<BreakOffset> {
        Vec::new()
    }
}

/// Maximum number of pre-split iterations per word (spec §4.1.4), guarding
/// against pathological dictionaries that report zero-progress breaks.
const MAX_PRESPLIT_ITERATIONS: u32 = 100;

/// Pre-split every word in `words` wider than `max_word_width` into soft-hyphen
/// joined pieces, so the line composer never has to reconsider hyphenation
/// mid-layout.
///
/// This runs once, ahead of line composition (spec §4.1.4 "Design Notes" /
/// §9 "Pre-split markers"): later, `WordList::rejoin_split_markers` can
/// losslessly undo it if layout is cancelled before the pieces are consumed.
/// Returns `true` if the pass completed; `false` if `should_abort` fired
/// before every word was examined, in which case `words` still holds every
/// word not yet processed (in original order, at the front) so the caller
/// can resume the pass, or line composition, in a later call (spec §4.1.8).
pub fn presplit_overlong_words<M, H, A>(
    words: &mut WordList,
    metrics: &M,
    hyphenator: &H,
    font_id: i32,
    max_word_width: u16,
    should_abort: &A,
) -> bool
where
    M: crate::metrics::TextMetrics,
    H: Hyphenator,
    A: ShouldAbort,
{
    let mut rebuilt = WordList::new();
    let mut cadence = PollCadence::new(PRESPLIT_POLL_CADENCE);
    while let Some(run) = words.pop_front() {
        if cadence.tick() && should_abort.should_abort() {
            words.push_front(run);
            while let Some(remaining) = words.pop_front() {
                rebuilt.push_back(remaining);
            }
            *words = rebuilt;
            return false;
        }
        split_one(&mut rebuilt, run, metrics, hyphenator, font_id, max_word_width);
    }
    *words = rebuilt;
    true
}

fn strip_soft_hyphens(s: &str) -> String {
    s.chars().filter(|&c| c != SOFT_HYPHEN).collect()
}

fn split_one<M, H>(
    out: &mut WordList,
    run: GlyphRun,
    metrics: &M,
    hyphenator: &H,
    font_id: i32,
    max_word_width: u16,
) where
    M: crate::metrics::TextMetrics,
    H: Hyphenator,
{
    if metrics.width(font_id, run.style, &strip_soft_hyphens(&run.text)) <= max_word_width {
        out.push_back(run);
        return;
    }

    if run.text.contains(SOFT_HYPHEN) {
        split_at_soft_hyphens(out, run, metrics, font_id, max_word_width);
        return;
    }

    let breaks = hyphenator.break_offsets(&run.text, false);
    if breaks.is_empty() {
        // No legal break: emit as-is, the layer above must hard-wrap or overflow.
        out.push_back(run);
        return;
    }

    let mut remaining = run.text;
    let mut iterations = 0u32;
    loop {
        if iterations >= MAX_PRESPLIT_ITERATIONS {
            out.push_back(GlyphRun::new(remaining, run.style));
            return;
        }
        iterations += 1;

        if metrics.width(font_id, run.style, &remaining) <= max_word_width {
            out.push_back(GlyphRun::new(remaining, run.style));
            return;
        }

        let breaks_here = hyphenator.break_offsets(&remaining, false);
        let Some(best) = best_break_under(&breaks_here, &remaining, metrics, run.style, font_id, max_word_width)
        else {
            out.push_back(GlyphRun::new(remaining, run.style));
            return;
        };

        let (prefix, suffix) = remaining.split_at(best.byte_offset);
        let mut piece = prefix.to_string();
        if best.requires_inserted_hyphen {
            piece.push(SOFT_HYPHEN);
        }
        out.push_back(GlyphRun::new(piece, run.style));
        remaining = suffix.to_string();
    }
}

/// First branch of spec §4.1.4: the word already carries soft hyphens from
/// the source document, so split at those rather than consulting the
/// hyphenation collaborator. Iteratively breaks at the **rightmost** soft
/// hyphen whose prefix (rendered with a trailing '-') fits `max_word_width`;
/// the suffix keeps its remaining soft hyphens and is re-evaluated. Emitted
/// pieces keep the soft hyphen as their own trailing marker (same
/// convention as the dictionary branch) rather than an already-visible '-';
/// line extraction (C1 §4.1.7) renders that marker as '-' for the piece that
/// actually ends a line.
fn split_at_soft_hyphens<M: crate::metrics::TextMetrics>(
    out: &mut WordList,
    run: GlyphRun,
    metrics: &M,
    font_id: i32,
    max_word_width: u16,
) {
    let mut remaining = run.text;
    let mut iterations = 0u32;
    loop {
        if iterations >= MAX_PRESPLIT_ITERATIONS {
            out.push_back(GlyphRun::new(remaining, run.style));
            return;
        }
        iterations += 1;

        if metrics.width(font_id, run.style, &strip_soft_hyphens(&remaining)) <= max_word_width {
            out.push_back(GlyphRun::new(remaining, run.style));
            return;
        }

        let Some(split_at) =
            rightmost_fitting_soft_hyphen(&remaining, metrics, run.style, font_id, max_word_width)
        else {
            out.push_back(GlyphRun::new(remaining, run.style));
            return;
        };

        let (prefix, suffix) = remaining.split_at(split_at);
        out.push_back(GlyphRun::new(prefix.to_string(), run.style));
        if suffix.is_empty() {
            return;
        }
        remaining = suffix.to_string();
    }
}

/// Byte offset just past the rightmost soft hyphen in `word` whose prefix,
/// rendered with a trailing '-' in place of the soft hyphen, still fits
/// `max_word_width`. `None` if no embedded soft hyphen's prefix fits.
fn rightmost_fitting_soft_hyphen<M: crate::metrics::TextMetrics>(
    word: &str,
    metrics: &M,
    style: crate::model::Style,
    font_id: i32,
    max_word_width: u16,
) -> Option<usize> {
    word.char_indices()
        .filter(|&(_, c)| c == SOFT_HYPHEN)
        .filter(|&(i, _)| {
            let rendered = format!("{}-", strip_soft_hyphens(&word[..i]));
            metrics.width(font_id, style, &rendered) <= max_word_width
        })
        .map(|(i, c)| i + c.len_utf8())
        .max()
}

fn best_break_under<M: crate::metrics::TextMetrics>(
    breaks: &[BreakOffset],
    word: &str,
    metrics: &M,
    style: crate::model::Style,
    font_id: i32,
    max_word_width: u16,
) -> Option<BreakOffset> {
    breaks
        .iter()
        .filter(|b| b.byte_offset > 0 && b.byte_offset < word.len())
        .filter(|b| {
            let prefix_with_dash = format!("{}-", &word[..b.byte_offset]);
            let measured = if b.requires_inserted_hyphen {
                &prefix_with_dash
            } else {
                &word[..b.byte_offset]
            };
            metrics.width(font_id, style, measured) <= max_word_width
        })
        .max_by_key(|b| b.byte_offset)
        .copied()
}
