//! Line Composer (C1, spec §4.1).
//!
//! Consumes words from the front of a [`WordList`] and emits justified/aligned
//! [`TextBlock`]s via a sink closure, mirroring the teacher's
//! `LayoutEngine`/`LayoutSession` split between a stateless algorithm and a
//! per-paragraph driving loop in `render_layout.rs`.

use reflow_core::abort::{PollCadence, ShouldAbort, DP_POLL_CADENCE, GREEDY_POLL_CADENCE};
use reflow_core::error::{CoreError, ErrorKind, ErrorPhase};
use reflow_core::hyphenate::{presplit_overlong_words, Hyphenator};
use reflow_core::metrics::TextMetrics;
use reflow_core::model::{
    BlockStyle, GlyphRun, PositionedWord, Style, TextBlock, WordList, SOFT_HYPHEN,
};

const LINE_PENALTY: f64 = 50.0;
const INFINITY_GUARD: f64 = 10_000.0;
const OVERSIZED_WORD_DEMERITS: f64 = 100.0 + LINE_PENALTY;

/// Per-call configuration for [`compose`].
#[derive(Clone, Copy, Debug)]
pub struct LineComposerConfig {
    pub font_id: i32,
    pub viewport_width: u16,
    pub use_greedy: bool,
    pub indent_level: u8,
    pub hyphenation_enabled: bool,
    pub rtl: bool,
}

/// Result of a [`compose`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComposeOutcome {
    /// All available words were laid out (subject to `include_last_line`).
    Finished,
    /// `should_abort` fired; `words` retains everything not yet emitted, in
    /// layout-equivalent form, so a later call can resume (spec §4.1.8).
    Suspended,
}

struct WorkWord {
    display_text: String,
    style: Style,
    width: u16,
    trailing_split_marker: bool,
}

/// Lay out as many lines from the front of `words` as fit, sinking each
/// completed [`TextBlock`] into `process_line`.
///
/// `block_style` is the paragraph's declared alignment; `include_last_line`
/// controls whether the final, possibly ragged line after the last
/// discovered break is emitted now or left in `words` for a future call.
pub fn compose<M, H, A>(
    words: &mut WordList,
    block_style: BlockStyle,
    metrics: &M,
    hyphenator: &H,
    cfg: &LineComposerConfig,
    should_abort: &A,
    include_last_line: bool,
    mut process_line: impl FnMut(TextBlock),
) -> Result<ComposeOutcome, CoreError>
where
    M: TextMetrics,
    H: Hyphenator,
    A: ShouldAbort,
{
    let w = cfg.viewport_width;
    if w == 0 {
        return Err(CoreError::new(
            ErrorPhase::Layout,
            ErrorKind::InvalidViewport,
            "viewport width must be greater than zero",
        ));
    }

    words.rejoin_split_markers();
    apply_indent(words, cfg.indent_level, block_style);

    if cfg.hyphenation_enabled
        && !presplit_overlong_words(words, metrics, hyphenator, cfg.font_id, w, should_abort)
    {
        return Ok(ComposeOutcome::Suspended);
    }

    let sp = metrics.space_width(cfg.font_id);
    let mut work: Vec<WorkWord> = Vec::with_capacity(words.len());
    while let Some(run) = words.pop_front() {
        let trailing_split_marker = run.ends_with_soft_hyphen();
        let stripped: String = run.text.chars().filter(|&c| c != SOFT_HYPHEN).collect();
        let width = metrics.width(cfg.font_id, run.style, &stripped);
        work.push(WorkWord {
            display_text: stripped,
            style: run.style,
            width,
            trailing_split_marker,
        });
    }

    let break_result = if cfg.use_greedy {
        greedy_breaks(&mut work, w, sp, hyphenator, metrics, cfg.font_id, should_abort)
    } else {
        optimal_breaks(&work, w, sp, should_abort)
    };

    let mut breaks = match break_result {
        Some(b) => b,
        None => {
            restore_words(words, work);
            return Ok(ComposeOutcome::Suspended);
        }
    };

    if !include_last_line {
        breaks.pop();
    }

    let mut emitted_through = 0usize;
    let mut cadence = PollCadence::new(reflow_core::abort::LINE_SINK_POLL_CADENCE);
    for &end in &breaks {
        if cadence.tick() && should_abort.should_abort() {
            restore_words_from(words, &work, emitted_through);
            return Ok(ComposeOutcome::Suspended);
        }
        let line_words = &work[emitted_through..end];
        let block = extract_line(line_words, block_style, cfg.rtl, w, sp);
        process_line(block);
        emitted_through = end;
    }

    restore_words_from(words, &work, emitted_through);
    Ok(ComposeOutcome::Finished)
}

fn apply_indent(words: &mut WordList, indent_level: u8, block_style: BlockStyle) {
    if indent_level == 0 || block_style == BlockStyle::Center {
        return;
    }
    let prefix = match indent_level {
        2 => "\u{2003}",
        3 => "\u{2003}\u{2002}",
        _ => "\u{2002}",
    };
    if let Some(front) = words.front_mut() {
        if !front.text.starts_with(prefix) {
            front.text = format!("{prefix}{}", front.text);
        }
    }
}

fn restore_words(words: &mut WordList, work: Vec<WorkWord>) {
    restore_words_from(words, &work, 0);
}

/// Push every `work` item from `start` onward back into `words`, restoring
/// the trailing soft-hyphen marker on split prefixes.
fn restore_words_from(words: &mut WordList, work: &[WorkWord], start: usize) {
    for item in work[start..].iter().rev() {
        let mut text = item.display_text.clone();
        if item.trailing_split_marker {
            text.push(SOFT_HYPHEN);
        }
        words.push_front(GlyphRun::new(text, item.style));
    }
}

fn badness(line_width: i64, target_width: i64) -> f64 {
    if target_width <= 0 || line_width > target_width {
        return f64::INFINITY;
    }
    if line_width == target_width {
        return 0.0;
    }
    let slack = (target_width - line_width) as f64 / target_width as f64;
    slack.powi(3) * 100.0
}

fn clamp_infinity(value: f64) -> f64 {
    if value >= INFINITY_GUARD {
        f64::INFINITY
    } else {
        value
    }
}

/// Knuth-Plass-style optimal line breaking (spec §4.1.6).
fn optimal_breaks<A: ShouldAbort>(
    work: &[WorkWord],
    w: u16,
    sp: u16,
    should_abort: &A,
) -> Option<Vec<usize>> {
    let n = work.len();
    if n == 0 {
        return Some(Vec::new());
    }

    let mut cost = vec![f64::INFINITY; n + 1];
    let mut prev = vec![None; n + 1];
    cost[0] = 0.0;

    let mut cadence = PollCadence::new(DP_POLL_CADENCE);
    for i in 0..n {
        if cadence.tick() && should_abort.should_abort() {
            return None;
        }
        if !cost[i].is_finite() {
            continue;
        }
        let mut line_width: i64 = 0;
        for j in i..n {
            if j > i {
                line_width += sp as i64;
            }
            line_width += work[j].width as i64;

            let is_last = j + 1 == n;
            let demerits = if j == i && work[j].width as i64 > w as i64 {
                OVERSIZED_WORD_DEMERITS
            } else {
                let b = clamp_infinity(badness(line_width, w as i64));
                if !b.is_finite() {
                    if line_width > w as i64 && j > i {
                        break;
                    }
                    continue;
                }
                if is_last {
                    0.0
                } else {
                    (1.0 + b).powi(2) + LINE_PENALTY
                }
            };

            let total = cost[i] + demerits;
            if total < cost[j + 1] {
                cost[j + 1] = total;
                prev[j + 1] = Some(i);
            }
        }
    }

    let mut breaks = Vec::new();
    let mut pos = n;
    while pos > 0 {
        match prev[pos] {
            Some(p) => {
                breaks.push(pos);
                pos = p;
            }
            None => {
                // No feasible path to position 0: fall back to one word per line.
                return Some((1..=n).collect());
            }
        }
    }
    breaks.reverse();
    Some(breaks)
}

/// Greedy single-pass line breaking with tail hyphenation (spec §4.1.6).
fn greedy_breaks<H, M, A>(
    work: &mut Vec<WorkWord>,
    w: u16,
    sp: u16,
    hyphenator: &H,
    metrics: &M,
    font_id: i32,
    should_abort: &A,
) -> Option<Vec<usize>>
where
    H: Hyphenator,
    M: TextMetrics,
    A: ShouldAbort,
{
    let mut breaks = Vec::new();
    let mut line_width: i64 = -(sp as i64);
    let mut i = 0usize;
    let mut cadence = PollCadence::new(GREEDY_POLL_CADENCE);

    while i < work.len() {
        if cadence.tick() && should_abort.should_abort() {
            return None;
        }

        let width = work[i].width as i64;
        if line_width + width + sp as i64 > w as i64 && line_width > 0 {
            let remaining = (w as i64 - line_width - sp as i64).max(0) as u16;
            if let Some((prefix, suffix, prefix_width, suffix_width)) =
                try_tail_hyphenate(&work[i], hyphenator, metrics, font_id, remaining)
            {
                work[i].display_text = prefix;
                work[i].width = prefix_width;
                work[i].trailing_split_marker = true;
                work.insert(
                    i + 1,
                    WorkWord {
                        display_text: suffix,
                        style: work[i].style,
                        width: suffix_width,
                        trailing_split_marker: false,
                    },
                );
                breaks.push(i + 1);
                line_width = -(sp as i64);
                i += 1;
                continue;
            }

            breaks.push(i);
            line_width = width;
            i += 1;
            continue;
        }

        line_width += width + sp as i64;
        i += 1;
    }

    breaks.push(work.len());
    Some(breaks)
}

fn try_tail_hyphenate<H: Hyphenator, M: TextMetrics>(
    word: &WorkWord,
    hyphenator: &H,
    metrics: &M,
    font_id: i32,
    remaining: u16,
) -> Option<(String, String, u16, u16)> {
    let breaks = hyphenator.break_offsets(&word.display_text, false);
    let text = &word.display_text;
    breaks
        .iter()
        .filter(|b| b.byte_offset > 0 && b.byte_offset < text.len())
        .filter_map(|b| {
            let prefix_raw = &text[..b.byte_offset];
            let candidate = format!("{prefix_raw}-");
            let prefix_width = metrics.width(font_id, word.style, &candidate);
            if prefix_width <= remaining {
                let suffix = text[b.byte_offset..].to_string();
                let suffix_width = metrics.width(font_id, word.style, &suffix);
                Some((prefix_raw.to_string(), suffix, prefix_width, suffix_width))
            } else {
                None
            }
        })
        .max_by_key(|(prefix, ..)| prefix.len())
}

fn is_attaching_punctuation(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    const MARKS: &[char] = &['.', ',', '!', '?', ';', ':', '"', '\'', '\u{2019}', '\u{201D}'];
    text.chars().all(|c| MARKS.contains(&c))
}

fn extract_line(line: &[WorkWord], block_style: BlockStyle, rtl: bool, w: u16, sp: u16) -> TextBlock {
    let gap_count = line
        .iter()
        .skip(1)
        .filter(|word| !is_attaching_punctuation(&word.display_text))
        .count();
    let sum_widths: u32 = line.iter().map(|word| word.width as u32).sum();
    let spare = (w as i32 - sum_widths as i32).max(0);

    let effective_style = if rtl && block_style == BlockStyle::Left {
        BlockStyle::Right
    } else {
        block_style
    };

    let spacing = if effective_style == BlockStyle::Justified && gap_count > 0 {
        (spare as u32 / gap_count as u32) as u16
    } else {
        sp
    };

    let gaps_total = gap_count as i32 * spacing as i32;

    let mut positioned = Vec::with_capacity(line.len());
    if rtl {
        let mut x: i32 = match effective_style {
            BlockStyle::Right | BlockStyle::Justified => w as i32,
            BlockStyle::Center => w as i32 - (spare - gaps_total) / 2,
            BlockStyle::Left => w as i32,
        };
        for (idx, word) in line.iter().enumerate() {
            x -= word.width as i32;
            positioned.push(render_word(word, x));
            let next_attaches = line
                .get(idx + 1)
                .map(|n| is_attaching_punctuation(&n.display_text))
                .unwrap_or(false);
            if !next_attaches {
                x -= spacing as i32;
            }
        }
    } else {
        let mut x: i32 = match effective_style {
            BlockStyle::Left | BlockStyle::Justified => 0,
            BlockStyle::Right => spare - gaps_total,
            BlockStyle::Center => (spare - gaps_total) / 2,
        };
        for (idx, word) in line.iter().enumerate() {
            positioned.push(render_word(word, x));
            x += word.width as i32;
            let next_attaches = line
                .get(idx + 1)
                .map(|n| is_attaching_punctuation(&n.display_text))
                .unwrap_or(false);
            if !next_attaches {
                x += spacing as i32;
            }
        }
    }

    TextBlock {
        words: positioned,
        block_style: effective_style,
    }
}

fn render_word(word: &WorkWord, x: i32) -> PositionedWord {
    let mut text = word.display_text.clone();
    if word.trailing_split_marker {
        text.push('-');
    }
    PositionedWord {
        text,
        x,
        style: word.style,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflow_core::abort::NeverAbort;
    use reflow_core::hyphenate::NoopHyphenator;
    use reflow_core::metrics::test_support::FixedWidthMetrics;

    struct ScenarioMetrics {
        widths: std::collections::HashMap<&'static str, u16>,
        space: u16,
    }

    impl TextMetrics for ScenarioMetrics {
        fn width(&self, _font_id: i32, _style: Style, text: &str) -> u16 {
            *self.widths.get(text).unwrap_or(&0)
        }
        fn line_height(&self, _font_id: i32) -> u16 {
            20
        }
        fn space_width(&self, _font_id: i32) -> u16 {
            self.space
        }
        fn supports_grayscale(&self, _font_id: i32) -> bool {
            false
        }
    }

    fn cfg(w: u16, greedy: bool) -> LineComposerConfig {
        LineComposerConfig {
            font_id: 0,
            viewport_width: w,
            use_greedy: greedy,
            indent_level: 0,
            hyphenation_enabled: false,
            rtl: false,
        }
    }

    #[test]
    fn scenario_a_greedy_wrap_basic() {
        let metrics = ScenarioMetrics {
            widths: [("foo", 40), ("bar", 40), ("baz", 40)].into_iter().collect(),
            space: 10,
        };
        let mut words = WordList::new();
        for w in ["foo", "bar", "baz"] {
            words.push_back(GlyphRun::new(w, Style::Regular));
        }
        let mut lines = Vec::new();
        let outcome = compose(
            &mut words,
            BlockStyle::Left,
            &metrics,
            &NoopHyphenator,
            &cfg(100, true),
            &NeverAbort,
            true,
            |line| lines.push(line),
        )
        .unwrap();
        assert_eq!(outcome, ComposeOutcome::Finished);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>(), vec!["foo", "bar"]);
        assert_eq!(lines[1].words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>(), vec!["baz"]);
    }

    #[test]
    fn scenario_c_greedy_and_optimal_agree() {
        let metrics = ScenarioMetrics {
            widths: [("aa", 20), ("bbbbb", 80), ("cc", 20), ("dd", 20)].into_iter().collect(),
            space: 10,
        };
        let run_with = |greedy: bool| {
            let mut words = WordList::new();
            for w in ["aa", "bbbbb", "cc", "dd"] {
                words.push_back(GlyphRun::new(w, Style::Regular));
            }
            let mut lines = Vec::new();
            compose(
                &mut words,
                BlockStyle::Left,
                &metrics,
                &NoopHyphenator,
                &cfg(100, greedy),
                &NeverAbort,
                true,
                |line| lines.push(line.words.iter().map(|w| w.text.clone()).collect::<Vec<_>>()),
            )
            .unwrap();
            lines
        };
        let greedy_lines = run_with(true);
        let optimal_lines = run_with(false);
        assert_eq!(greedy_lines, vec![vec!["aa"], vec!["bbbbb"], vec!["cc", "dd"]]);
        assert_eq!(greedy_lines, optimal_lines);
    }

    #[test]
    fn scenario_e_attaching_punctuation_justification() {
        let metrics = ScenarioMetrics {
            widths: [("Hello", 50), (",", 5), ("world", 50)].into_iter().collect(),
            space: 10,
        };
        let mut words = WordList::new();
        for w in ["Hello", ",", "world"] {
            words.push_back(GlyphRun::new(w, Style::Regular));
        }
        let mut lines = Vec::new();
        compose(
            &mut words,
            BlockStyle::Justified,
            &metrics,
            &NoopHyphenator,
            &cfg(120, true),
            &NeverAbort,
            false,
            |line| lines.push(line),
        )
        .unwrap();
        assert_eq!(lines.len(), 1);
        let positions: Vec<(String, i32)> = lines[0]
            .words
            .iter()
            .map(|w| (w.text.clone(), w.x))
            .collect();
        assert_eq!(
            positions,
            vec![("Hello".to_string(), 0), (",".to_string(), 50), ("world".to_string(), 70)]
        );
    }

    #[test]
    fn rtl_left_style_becomes_right() {
        let metrics = FixedWidthMetrics { advance: 10, line_height: 20 };
        let mut words = WordList::new();
        words.push_back(GlyphRun::new("hi", Style::Regular));
        let mut lines = Vec::new();
        let mut c = cfg(100, true);
        c.rtl = true;
        compose(
            &mut words,
            BlockStyle::Left,
            &metrics,
            &NoopHyphenator,
            &c,
            &NeverAbort,
            true,
            |line| lines.push(line),
        )
        .unwrap();
        assert_eq!(lines[0].block_style, BlockStyle::Right);
    }

    #[test]
    fn invalid_viewport_width_is_rejected() {
        let metrics = FixedWidthMetrics { advance: 10, line_height: 20 };
        let mut words = WordList::new();
        words.push_back(GlyphRun::new("hi", Style::Regular));
        let result = compose(
            &mut words,
            BlockStyle::Left,
            &metrics,
            &NoopHyphenator,
            &cfg(0, true),
            &NeverAbort,
            true,
            |_| {},
        );
        assert!(matches!(result, Err(e) if e.kind == ErrorKind::InvalidViewport));
    }

    #[test]
    fn abort_mid_layout_restores_full_word_list() {
        let metrics = FixedWidthMetrics { advance: 10, line_height: 20 };
        let mut words = WordList::new();
        for w in ["a", "b", "c"] {
            words.push_back(GlyphRun::new(w, Style::Regular));
        }
        let outcome = compose(
            &mut words,
            BlockStyle::Left,
            &metrics,
            &NoopHyphenator,
            &cfg(1000, true),
            &reflow_core::abort::AlwaysAbort,
            true,
            |_| {},
        )
        .unwrap();
        assert_eq!(outcome, ComposeOutcome::Suspended);
        assert_eq!(words.len(), 3);
    }

    #[test]
    fn indent_prefix_applied_once_on_resume() {
        let metrics = FixedWidthMetrics { advance: 10, line_height: 20 };
        let mut words = WordList::new();
        words.push_back(GlyphRun::new("Hello", Style::Regular));
        let mut c = cfg(5, true); // force suspension after indent but before line emission is irrelevant here
        c.indent_level = 1;
        apply_indent(&mut words, c.indent_level, BlockStyle::Left);
        apply_indent(&mut words, c.indent_level, BlockStyle::Left);
        assert_eq!(words.front().unwrap().text, "\u{2002}Hello");
    }

    #[test]
    fn center_style_skips_indent() {
        let mut words = WordList::new();
        words.push_back(GlyphRun::new("Hello", Style::Regular));
        apply_indent(&mut words, 1, BlockStyle::Center);
        assert_eq!(words.front().unwrap().text, "Hello");
    }
}
