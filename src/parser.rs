//! Chapter Parser Driver (C3, spec §4.3).
//!
//! Streams a chapter's XHTML content through `quick-xml` in SAX mode,
//! emitting a flat sequence of [`StyledEvent`]s for the layout crate to
//! consume. Style and skip state is tracked as "active until nesting depth
//! N" scalars rather than a tag stack (mirroring the teacher's
//! `style_chapter_reader_with`), which is what makes suspend/resume cheap:
//! a checkpoint is a handful of `u32`s plus a byte offset, not a serialized
//! element stack.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::abort::{PollCadence, ShouldAbort, PARSE_POLL_CADENCE};
use crate::cjk;
use crate::error::{CoreError, ErrorKind, ErrorPhase};
use crate::model::{BlockStyle, GlyphRun, Style};
use crate::style::{parse_dir_attr, parse_inline_style, resolve_entity, CssStyle, Direction, StyleResolver};

/// Maximum element nesting depth the driver will track before it gives up
/// threading fine-grained style state and treats everything below as flat
/// regular-style text (spec §4.3: malformed/pathological documents must not
/// grow unbounded state).
const MAX_TRACKED_DEPTH: u32 = 100;

/// Soft cap on buffered character data between flushes, in bytes (spec §4.3.3).
const CHAR_BUFFER_SOFT_CAP: usize = 200;

/// Forced break threshold: a run of prose with no paragraph boundary this
/// long is split synthetically so a single pathological paragraph can't grow
/// the in-flight word list without bound (spec §4.3.3 "pending" flag).
const EMERGENCY_SPLIT_WORDS: u32 = 750;

/// Tags whose content becomes a single placeholder run rather than being
/// laid out (spec §4.3.2): full table layout is out of scope for the reader.
const TABLE_TAG: &str = "table";

/// Heading tags rendered centered and bold regardless of their own CSS (spec §4.3.2).
fn is_heading_tag(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Strip `data:` URI payloads from `src`/`href` attributes before parsing.
///
/// Inline base64 image data can run to hundreds of kilobytes per `<img>` and
/// is never useful to a SAX driver that only wants the `href`/`alt` pair,
/// so it is rewritten to `#` ahead of time rather than carried through
/// `quick-xml`'s attribute decoding (spec §4.3.1).
pub fn strip_data_uris(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(start) = rest.find("data:") {
        // Only rewrite when inside a quoted attribute value.
        let prefix = &rest[..start];
        out.push_str(prefix);
        let quote = prefix.chars().last();
        if quote == Some('"') || quote == Some('\'') {
            let q = quote.unwrap_or('"');
            if let Some(end) = rest[start..].find(q) {
                out.push('#');
                rest = &rest[start + end..];
                continue;
            }
        }
        out.push_str("data:");
        rest = &rest[start + 5..];
    }
    out.push_str(rest);
    out
}

/// One unit of parsed, styled chapter content.
#[derive(Clone, Debug, PartialEq)]
pub enum StyledEvent {
    Run(GlyphRun),
    ParagraphBreak { block_style: Option<BlockStyle> },
    Image { href: String, alt: String },
    SectionEnd,
}

/// Resumable scalar state: everything needed to continue parsing from a
/// byte offset without replaying the document from the start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParserCheckpoint {
    pub byte_offset: u64,
    pub depth: u32,
    pub skip_until_depth: Option<u32>,
    pub bold_until_depth: Option<u32>,
    pub italic_until_depth: Option<u32>,
    pub rtl_until_depth: Option<u32>,
    pub in_paragraph_until_depth: Option<u32>,
    pub words_since_break: u32,
}

impl ParserCheckpoint {
    pub fn start() -> Self {
        Self {
            byte_offset: 0,
            depth: 0,
            skip_until_depth: None,
            bold_until_depth: None,
            italic_until_depth: None,
            rtl_until_depth: None,
            in_paragraph_until_depth: None,
            words_since_break: 0,
        }
    }
}

/// Outcome of a single `parse_batch` call.
pub enum ParseOutcome {
    /// Reached end of document; no further events remain.
    Finished,
    /// Stopped early because `should_abort` returned true. Call
    /// `checkpoint()` to persist state and resume later.
    Suspended,
}

/// Tags whose content (but not the tag itself) must never be emitted as text.
const SKIPPED_CONTENT_TAGS: &[&str] = &["script", "style", "head", "title"];

pub struct ChapterParserDriver<'a, S: StyleResolver> {
    reader: Reader<&'a [u8]>,
    style_resolver: &'a S,
    font_id: i32,
    state: ParserCheckpoint,
    char_buf: String,
    events: Vec<StyledEvent>,
    /// `id` attribute values mapped to the byte offset of their element's
    /// start tag, for deep-link navigation (spec §4.3.2 anchor map).
    anchors: HashMap<String, u64>,
}

impl<'a, S: StyleResolver> ChapterParserDriver<'a, S> {
    pub fn new(source: &'a [u8], style_resolver: &'a S, font_id: i32) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            style_resolver,
            font_id,
            state: ParserCheckpoint::start(),
            char_buf: String::new(),
            events: Vec::new(),
            anchors: HashMap::new(),
        }
    }

    /// Resume an earlier parse from a checkpoint. `source` must be the same
    /// document bytes; the reader is repositioned to `checkpoint.byte_offset`.
    /// `anchors` carries forward anchor entries collected before suspension.
    pub fn resume(
        source: &'a [u8],
        style_resolver: &'a S,
        font_id: i32,
        checkpoint: ParserCheckpoint,
        anchors: HashMap<String, u64>,
    ) -> Self {
        let reader = Reader::from_reader(source);
        let mut driver = Self {
            reader,
            style_resolver,
            font_id,
            state: checkpoint,
            char_buf: String::new(),
            events: Vec::new(),
            anchors,
        };
        driver.seek_to(checkpoint.byte_offset);
        driver
    }

    /// Anchors discovered so far, mapping an element's `id` to the byte
    /// offset of its start tag within the source document.
    pub fn anchors(&self) -> &HashMap<String, u64> {
        &self.anchors
    }

    fn seek_to(&mut self, offset: u64) {
        let full = self.reader.get_ref();
        let clamped = (offset as usize).min(full.len());
        self.reader = Reader::from_reader(&full[clamped..]);
        self.reader.config_mut().trim_text(false);
    }

    pub fn checkpoint(&self) -> ParserCheckpoint {
        self.state
    }

    /// Drain buffered events produced since the last call.
    pub fn take_events(&mut self) -> Vec<StyledEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drive the parser until `should_abort` fires or the document ends.
    pub fn parse_batch<A: ShouldAbort>(&mut self, should_abort: &A) -> Result<ParseOutcome, CoreError> {
        let mut cadence = PollCadence::new(PARSE_POLL_CADENCE);
        let mut buf = Vec::new();
        loop {
            if cadence.tick() && should_abort.should_abort() {
                self.flush_char_buf();
                return Ok(ParseOutcome::Suspended);
            }

            let pos_before = self.reader.buffer_position();
            let event = self.reader.read_event_into(&mut buf).map_err(|e| {
                CoreError::new(ErrorPhase::Parse, ErrorKind::MalformedDocument, e.to_string())
            })?;
            self.state.byte_offset = pos_before;

            match event {
                Event::Eof => {
                    self.flush_char_buf();
                    self.events.push(StyledEvent::SectionEnd);
                    return Ok(ParseOutcome::Finished);
                }
                Event::Start(tag) => {
                    self.handle_start(&tag)?;
                }
                Event::Empty(tag) => {
                    self.handle_empty(&tag)?;
                }
                Event::End(tag) => {
                    self.handle_end(&tag);
                }
                Event::Text(text) => {
                    if self.state.skip_until_depth.is_none() {
                        let decoded = text.decode().map_err(|e| {
                            CoreError::new(ErrorPhase::Parse, ErrorKind::MalformedDocument, e.to_string())
                        })?;
                        let raw = quick_xml::escape::unescape(&decoded).map_err(|e| {
                            CoreError::new(ErrorPhase::Parse, ErrorKind::MalformedDocument, e.to_string())
                        })?;
                        self.push_char_data(&raw);
                    }
                }
                Event::GeneralRef(bytes_ref) => {
                    if self.state.skip_until_depth.is_none() {
                        let name = bytes_ref.decode().map_err(|e| {
                            CoreError::new(ErrorPhase::Parse, ErrorKind::MalformedDocument, e.to_string())
                        })?;
                        if let Some(resolved) = resolve_entity(&name) {
                            self.push_char_data(&resolved);
                        }
                    }
                }
                _ => {}
            }
            buf.clear();
        }
    }

    fn push_char_data(&mut self, text: &str) {
        self.char_buf.push_str(text);
        if self.char_buf.len() >= CHAR_BUFFER_SOFT_CAP {
            self.flush_char_buf();
        }
    }

    fn flush_char_buf(&mut self) {
        if self.char_buf.is_empty() {
            return;
        }
        if self.char_buf.starts_with('\u{FEFF}') {
            self.char_buf.remove(0);
        }
        if self.char_buf.is_empty() {
            return;
        }
        let decoded = decode_entities(&self.char_buf);
        self.char_buf.clear();
        let style = self.current_style();
        let mut words = crate::model::WordList::new();
        for word in decoded.split_whitespace() {
            cjk::push_segmented(&mut words, word, style);
        }
        while let Some(run) = words.pop_front() {
            self.events.push(StyledEvent::Run(run));
            self.state.words_since_break += 1;
        }
        if self.state.in_paragraph_until_depth.is_some() && self.state.words_since_break >= EMERGENCY_SPLIT_WORDS {
            self.events.push(StyledEvent::ParagraphBreak { block_style: None });
            self.state.words_since_break = 0;
        }
    }

    fn current_style(&self) -> Style {
        let mut style = Style::Regular;
        if self.state.bold_until_depth.is_some() {
            style = style.with_bold(true);
        }
        if self.state.italic_until_depth.is_some() {
            style = style.with_italic(true);
        }
        style
    }

    fn handle_start(&mut self, tag: &quick_xml::events::BytesStart<'_>) -> Result<(), CoreError> {
        // Flush whatever text preceded this tag under the style that was
        // active up to here, before this element's own style takes over —
        // otherwise a later flush would apply this element's style
        // retroactively to text it never contained.
        self.flush_char_buf();

        self.state.depth += 1;
        if self.state.depth > MAX_TRACKED_DEPTH {
            log_nesting_overflow(self.state.depth);
            return Ok(());
        }

        let name = local_name(tag.name().as_ref());
        let class_attr = attr_value(tag, b"class").unwrap_or_default();
        let style_attr = attr_value(tag, b"style").unwrap_or_default();
        let dir_attr = attr_value(tag, b"dir");

        if let Some(id) = attr_value(tag, b"id") {
            self.anchors.entry(id).or_insert(self.state.byte_offset);
        }

        if name == TABLE_TAG {
            self.events
                .push(StyledEvent::Run(GlyphRun::new("[Table omitted]", Style::Italic)));
            if self.state.skip_until_depth.is_none() {
                self.state.skip_until_depth = Some(self.state.depth);
            }
            return Ok(());
        }

        if SKIPPED_CONTENT_TAGS.contains(&name.as_str()) && self.state.skip_until_depth.is_none() {
            self.state.skip_until_depth = Some(self.state.depth);
        }

        let resolved = self
            .style_resolver
            .combined_style(&name, &class_attr)
            .merged_with(&parse_inline_style(&style_attr));

        let depth = self.state.depth;
        apply_resolved_style(&mut self.state, resolved, depth);

        if is_heading_tag(&name) && self.state.bold_until_depth.is_none() {
            self.state.bold_until_depth = Some(self.state.depth);
        }

        if let Some(dir) = dir_attr.and_then(|v| parse_dir_attr(&v)) {
            if dir == Direction::Rtl && self.state.rtl_until_depth.is_none() {
                self.state.rtl_until_depth = Some(self.state.depth);
            }
        }

        if is_paragraph_tag(&name) {
            let block_style = is_heading_tag(&name).then_some(BlockStyle::Center);
            self.events.push(StyledEvent::ParagraphBreak { block_style });
            self.state.in_paragraph_until_depth = Some(self.state.depth);
            self.state.words_since_break = 0;
        }

        Ok(())
    }

    fn handle_empty(&mut self, tag: &quick_xml::events::BytesStart<'_>) -> Result<(), CoreError> {
        let name = local_name(tag.name().as_ref());
        if let Some(id) = attr_value(tag, b"id") {
            self.anchors.entry(id).or_insert(self.state.byte_offset);
        }
        if name == "img" {
            self.flush_char_buf();
            let href = attr_value(tag, b"src").unwrap_or_default();
            let alt = attr_value(tag, b"alt").unwrap_or_default();
            self.events.push(StyledEvent::Image { href, alt });
        } else if name == "br" {
            self.flush_char_buf();
            self.events.push(StyledEvent::ParagraphBreak { block_style: None });
        }
        Ok(())
    }

    fn handle_end(&mut self, _tag: &quick_xml::events::BytesEnd<'_>) {
        let depth = self.state.depth;

        // Flush buffered text under this element's still-active style
        // before popping any of it at this depth.
        self.flush_char_buf();

        if self.state.in_paragraph_until_depth == Some(depth) {
            self.events.push(StyledEvent::ParagraphBreak { block_style: None });
            self.state.in_paragraph_until_depth = None;
            self.state.words_since_break = 0;
        }

        if self.state.skip_until_depth == Some(depth) {
            self.state.skip_until_depth = None;
        }
        if self.state.bold_until_depth == Some(depth) {
            self.state.bold_until_depth = None;
        }
        if self.state.italic_until_depth == Some(depth) {
            self.state.italic_until_depth = None;
        }
        if self.state.rtl_until_depth == Some(depth) {
            self.state.rtl_until_depth = None;
        }

        if self.state.depth > 0 {
            self.state.depth -= 1;
        }
    }
}

fn apply_resolved_style(state: &mut ParserCheckpoint, css: CssStyle, depth: u32) {
    use crate::style::FontStyle;
    use crate::style::FontWeight;
    if css.font_weight == Some(FontWeight::Bold) && state.bold_until_depth.is_none() {
        state.bold_until_depth = Some(depth);
    }
    if css.font_style == Some(FontStyle::Italic) && state.italic_until_depth.is_none() {
        state.italic_until_depth = Some(depth);
    }
}

fn is_paragraph_tag(name: &str) -> bool {
    matches!(name, "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li")
}

fn local_name(qualified: &[u8]) -> String {
    let s = String::from_utf8_lossy(qualified);
    s.rsplit(':').next().unwrap_or(&s).to_ascii_lowercase()
}

fn attr_value(tag: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    tag.attributes().flatten().find_map(|a| {
        if a.key.as_ref() == key {
            Some(String::from_utf8_lossy(a.value.as_ref()).into_owned())
        } else {
            None
        }
    })
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'&' {
            if let Some(end) = text[i..].find(';') {
                let entity = &text[i + 1..i + end];
                if let Some(resolved) = resolve_entity(entity) {
                    out.push_str(&resolved);
                    i += end + 1;
                    continue;
                }
            }
        }
        let Some(ch) = text[i..].chars().next() else {
            break;
        };
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

#[cfg(feature = "std")]
fn log_nesting_overflow(depth: u32) {
    log::warn!("chapter parser nesting depth {depth} exceeds tracked limit {MAX_TRACKED_DEPTH}, flattening style");
}

#[cfg(not(feature = "std"))]
fn log_nesting_overflow(_depth: u32) {}
