//! Page/TextBlock/ImageBlock byte layout (spec §4.4.1, §6.1).
//!
//! Little-endian throughout; string length prefixes are `u16` byte counts
//! (not codepoints), raw UTF-8 bytes, no NUL terminator. Every reader here
//! enforces the deserialization guards from spec §4.4.4: short reads and
//! unknown tags fail the whole page, and oversized counts/dimensions are
//! rejected outright rather than silently truncated.

use reflow_core::error::{CoreError, ErrorKind, ErrorPhase};
use reflow_core::model::{
    BlockStyle, ImageBlock, Page, PageElement, PositionedWord, Style, TextBlock,
    MAX_IMAGE_DIMENSION, MAX_PAGE_ELEMENTS, MAX_TEXTBLOCK_WORDS,
};

fn corrupt(message: impl Into<String>) -> CoreError {
    CoreError::new(ErrorPhase::Cache, ErrorKind::CorruptedCache, message)
}

fn style_tag(style: Style) -> u8 {
    match style {
        Style::Regular => 0,
        Style::Bold => 1,
        Style::Italic => 2,
        Style::BoldItalic => 3,
    }
}

fn style_from_tag(tag: u8) -> Result<Style, CoreError> {
    match tag {
        0 => Ok(Style::Regular),
        1 => Ok(Style::Bold),
        2 => Ok(Style::Italic),
        3 => Ok(Style::BoldItalic),
        _ => Err(corrupt(format!("unknown style tag {tag}"))),
    }
}

fn block_style_tag(style: BlockStyle) -> u8 {
    match style {
        BlockStyle::Justified => 0,
        BlockStyle::Left => 1,
        BlockStyle::Center => 2,
        BlockStyle::Right => 3,
    }
}

fn block_style_from_tag(tag: u8) -> Result<BlockStyle, CoreError> {
    match tag {
        0 => Ok(BlockStyle::Justified),
        1 => Ok(BlockStyle::Left),
        2 => Ok(BlockStyle::Center),
        3 => Ok(BlockStyle::Right),
        _ => Err(corrupt(format!("unknown block style tag {tag}"))),
    }
}

const PAGE_LINE_TAG: u8 = 1;
const PAGE_IMAGE_TAG: u8 = 2;

/// A cursor over an in-memory byte slice with bounds-checked little-endian
/// reads. Any attempt to read past the end is a short read (spec §4.4.4).
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CoreError> {
        let end = self.pos.checked_add(n).ok_or_else(|| corrupt("length overflow"))?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| corrupt("short read"))?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CoreError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CoreError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn i16(&mut self) -> Result<i16, CoreError> {
        Ok(i16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn string(&mut self) -> Result<String, CoreError> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| corrupt("non-UTF-8 string"))
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    let len: u16 = s.len().min(u16::MAX as usize) as u16;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&s.as_bytes()[..len as usize]);
}

pub fn encode_image_block(out: &mut Vec<u8>, img: &ImageBlock) {
    write_string(out, &img.cached_bmp_path);
    out.extend_from_slice(&img.width.to_le_bytes());
    out.extend_from_slice(&img.height.to_le_bytes());
}

fn decode_image_block(r: &mut Reader<'_>) -> Result<ImageBlock, CoreError> {
    let cached_bmp_path = r.string()?;
    let width = r.u16()?;
    let height = r.u16()?;
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(corrupt(format!(
            "image dimension {width}x{height} exceeds {MAX_IMAGE_DIMENSION}"
        )));
    }
    Ok(ImageBlock {
        cached_bmp_path,
        width,
        height,
    })
}

pub fn encode_text_block(out: &mut Vec<u8>, block: &TextBlock) {
    let word_count: u16 = block.words.len().min(u16::MAX as usize) as u16;
    out.extend_from_slice(&word_count.to_le_bytes());
    for word in block.words.iter().take(word_count as usize) {
        write_string(out, &word.text);
    }
    for word in block.words.iter().take(word_count as usize) {
        let x: u16 = word.x.clamp(0, u16::MAX as i32) as u16;
        out.extend_from_slice(&x.to_le_bytes());
    }
    for word in block.words.iter().take(word_count as usize) {
        out.push(style_tag(word.style));
    }
    out.push(block_style_tag(block.block_style));
}

fn decode_text_block(r: &mut Reader<'_>) -> Result<TextBlock, CoreError> {
    let word_count = r.u16()? as usize;
    if word_count > MAX_TEXTBLOCK_WORDS {
        return Err(corrupt(format!(
            "word count {word_count} exceeds {MAX_TEXTBLOCK_WORDS}"
        )));
    }
    let mut texts = Vec::with_capacity(word_count);
    for _ in 0..word_count {
        texts.push(r.string()?);
    }
    let mut xs = Vec::with_capacity(word_count);
    for _ in 0..word_count {
        xs.push(r.u16()? as i32);
    }
    let mut styles = Vec::with_capacity(word_count);
    for _ in 0..word_count {
        styles.push(style_from_tag(r.u8()?)?);
    }
    let block_style = block_style_from_tag(r.u8()?)?;
    let words = texts
        .into_iter()
        .zip(xs)
        .zip(styles)
        .map(|((text, x), style)| PositionedWord { text, x, style })
        .collect();
    Ok(TextBlock { words, block_style })
}

pub fn encode_page(page: &Page) -> Result<Vec<u8>, CoreError> {
    if page.elements.len() > MAX_PAGE_ELEMENTS {
        return Err(corrupt(format!(
            "page has {} elements, exceeds {MAX_PAGE_ELEMENTS}",
            page.elements.len()
        )));
    }
    let mut out = Vec::new();
    let element_count: u16 = page.elements.len() as u16;
    out.extend_from_slice(&element_count.to_le_bytes());
    for el in &page.elements {
        match el {
            PageElement::Line(block, x, y) => {
                out.push(PAGE_LINE_TAG);
                out.extend_from_slice(&(*x as i16).to_le_bytes());
                out.extend_from_slice(&(*y as i16).to_le_bytes());
                encode_text_block(&mut out, block);
            }
            PageElement::Image(img, x, y) => {
                out.push(PAGE_IMAGE_TAG);
                out.extend_from_slice(&(*x as i16).to_le_bytes());
                out.extend_from_slice(&(*y as i16).to_le_bytes());
                encode_image_block(&mut out, img);
            }
        }
    }
    Ok(out)
}

pub fn decode_page(bytes: &[u8]) -> Result<Page, CoreError> {
    let mut r = Reader::new(bytes);
    let element_count = r.u16()? as usize;
    if element_count > MAX_PAGE_ELEMENTS {
        return Err(corrupt(format!(
            "element count {element_count} exceeds {MAX_PAGE_ELEMENTS}"
        )));
    }
    let mut page = Page::new();
    for _ in 0..element_count {
        let tag = r.u8()?;
        let x = r.i16()? as i32;
        let y = r.i16()? as i32;
        match tag {
            PAGE_LINE_TAG => page.push(PageElement::Line(decode_text_block(&mut r)?, x, y)),
            PAGE_IMAGE_TAG => page.push(PageElement::Image(decode_image_block(&mut r)?, x, y)),
            other => return Err(corrupt(format!("unknown page element tag {other}"))),
        }
    }
    Ok(page)
}
