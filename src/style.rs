//! CSS resolution collaborator trait, inline `style="..."` parsing, and the
//! HTML named-entity table (spec §4.3.3, §6.3).

use smallvec::SmallVec;

/// Font weight as resolved from tag nesting and CSS.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

/// Font style as resolved from tag nesting and CSS.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

/// Text direction override (`dir="rtl"` / `dir="ltr"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ltr,
    Rtl,
}

/// A single declared CSS rule, as produced by parsing an inline `style`
/// attribute or a stylesheet selector body.
#[derive(Clone, Debug, PartialEq)]
pub struct CssStyle {
    pub font_weight: Option<FontWeight>,
    pub font_style: Option<FontStyle>,
    pub direction: Option<Direction>,
    /// `text-align` as a raw keyword (`"justify"`, `"left"`, `"center"`, `"right"`).
    pub text_align: Option<String>,
}

impl CssStyle {
    pub fn empty() -> Self {
        Self {
            font_weight: None,
            font_style: None,
            direction: None,
            text_align: None,
        }
    }

    /// Merge `other` over `self`, with `other`'s declared properties winning
    /// (cascade order: caller applies outer-to-inner).
    pub fn merged_with(&self, other: &CssStyle) -> CssStyle {
        CssStyle {
            font_weight: other.font_weight.or(self.font_weight),
            font_style: other.font_style.or(self.font_style),
            direction: other.direction.or(self.direction),
            text_align: other.text_align.clone().or_else(|| self.text_align.clone()),
        }
    }
}

/// The computed style produced by walking the element-nesting stack, keyed
/// by the chain of matched class names (mirrors the teacher's
/// `ComputedTextStyle` + `SmallVec<[String; 2]>` class-family stack).
#[derive(Clone, Debug, PartialEq)]
pub struct ComputedTextStyle {
    pub css: CssStyle,
    pub class_family: SmallVec<[String; 2]>,
}

/// Host-supplied CSS resolution: stylesheet lookups the core does not parse
/// itself (full selector matching, specificity) live behind this trait.
pub trait StyleResolver {
    /// Resolve the combined style for an element given its tag name and raw
    /// `class` attribute value (space-separated class list, or empty).
    fn combined_style(&self, tag: &str, class_attr: &str) -> CssStyle;
}

/// A `StyleResolver` that only understands structural HTML tags
/// (`b`/`strong`, `i`/`em`) and ignores classes entirely. Useful when the
/// host has no external stylesheet to plug in.
pub struct TagOnlyStyleResolver;

impl StyleResolver for TagOnlyStyleResolver {
    fn combined_style(&self, tag: &str, _class_attr: &str) -> CssStyle {
        let mut style = CssStyle::empty();
        match tag {
            "b" | "strong" => style.font_weight = Some(FontWeight::Bold),
            "i" | "em" => style.font_style = Some(FontStyle::Italic),
            _ => {}
        }
        style
    }
}

/// Parse an inline `style="..."` attribute value into a `CssStyle`.
///
/// Only the handful of properties the layout pipeline cares about are
/// recognized; unrecognized declarations are ignored rather than rejected.
pub fn parse_inline_style(style_attr: &str) -> CssStyle {
    let mut out = CssStyle::empty();
    for decl in style_attr.split(';') {
        let Some((prop, value)) = decl.split_once(':') else {
            continue;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let value = value.trim().to_ascii_lowercase();
        match prop.as_str() {
            "font-weight" => {
                if value == "bold" || value.parse::<u32>().map(|n| n >= 600).unwrap_or(false) {
                    out.font_weight = Some(FontWeight::Bold);
                } else if value == "normal" {
                    out.font_weight = Some(FontWeight::Normal);
                }
            }
            "font-style" => {
                if value == "italic" || value == "oblique" {
                    out.font_style = Some(FontStyle::Italic);
                } else if value == "normal" {
                    out.font_style = Some(FontStyle::Normal);
                }
            }
            "direction" => {
                out.direction = match value.as_str() {
                    "rtl" => Some(Direction::Rtl),
                    "ltr" => Some(Direction::Ltr),
                    _ => out.direction,
                };
            }
            "text-align" => {
                out.text_align = Some(value);
            }
            _ => {}
        }
    }
    out
}

/// Resolve a `dir` attribute value into a direction override, if recognized.
pub fn parse_dir_attr(dir_attr: &str) -> Option<Direction> {
    match dir_attr.trim().to_ascii_lowercase().as_str() {
        "rtl" => Some(Direction::Rtl),
        "ltr" => Some(Direction::Ltr),
        _ => None,
    }
}

/// Resolve a named or numeric HTML/XML entity to its replacement text.
///
/// Numeric references (`&#NN;`, `&#xHH;`) are decoded directly; named
/// references are looked up in `NAMED_ENTITIES`. Unknown entities return
/// `None` so the caller can fall back to passing the raw text through.
pub fn resolve_entity(entity: &str) -> Option<String> {
    if let Some(rest) = entity.strip_prefix('#') {
        let cp = if let Some(hex) = rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            rest.parse::<u32>().ok()?
        };
        return char::from_u32(cp).map(|c| c.to_string());
    }
    NAMED_ENTITIES
        .iter()
        .find(|&&(name, _)| name == entity)
        .map(|&(_, value)| value.to_string())
}

/// HTML named-entity table covering the common XHTML/EPUB content-document
/// entity set (spec §4.3.3). Extend as needed; unknown entities degrade
/// gracefully via `resolve_entity`'s `None` return.
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("nbsp", "\u{00A0}"),
    ("copy", "\u{00A9}"),
    ("reg", "\u{00AE}"),
    ("trade", "\u{2122}"),
    ("mdash", "\u{2014}"),
    ("ndash", "\u{2013}"),
    ("hellip", "\u{2026}"),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("ldquo", "\u{201C}"),
    ("rdquo", "\u{201D}"),
    ("sbquo", "\u{201A}"),
    ("bdquo", "\u{201E}"),
    ("laquo", "\u{00AB}"),
    ("raquo", "\u{00BB}"),
    ("deg", "\u{00B0}"),
    ("plusmn", "\u{00B1}"),
    ("times", "\u{00D7}"),
    ("divide", "\u{00F7}"),
    ("sect", "\u{00A7}"),
    ("para", "\u{00B6}"),
    ("middot", "\u{00B7}"),
    ("bull", "\u{2022}"),
    ("dagger", "\u{2020}"),
    ("Dagger", "\u{2021}"),
    ("permil", "\u{2030}"),
    ("euro", "\u{20AC}"),
    ("pound", "\u{00A3}"),
    ("yen", "\u{00A5}"),
    ("cent", "\u{00A2}"),
    ("curren", "\u{00A4}"),
    ("shy", "\u{00AD}"),
    ("agrave", "\u{00E0}"),
    ("aacute", "\u{00E1}"),
    ("acirc", "\u{00E2}"),
    ("atilde", "\u{00E3}"),
    ("auml", "\u{00E4}"),
    ("aring", "\u{00E5}"),
    ("aelig", "\u{00E6}"),
    ("ccedil", "\u{00E7}"),
    ("egrave", "\u{00E8}"),
    ("eacute", "\u{00E9}"),
    ("ecirc", "\u{00EA}"),
    ("euml", "\u{00EB}"),
    ("igrave", "\u{00EC}"),
    ("iacute", "\u{00ED}"),
    ("icirc", "\u{00EE}"),
    ("iuml", "\u{00EF}"),
    ("ntilde", "\u{00F1}"),
    ("ograve", "\u{00F2}"),
    ("oacute", "\u{00F3}"),
    ("ocirc", "\u{00F4}"),
    ("otilde", "\u{00F5}"),
    ("ouml", "\u{00F6}"),
    ("oslash", "\u{00F8}"),
    ("ugrave", "\u{00F9}"),
    ("uacute", "\u{00FA}"),
    ("ucirc", "\u{00FB}"),
    ("uuml", "\u{00FC}"),
    ("yacute", "\u{00FD}"),
    ("yuml", "\u{00FF}"),
    ("szlig", "\u{00DF}"),
    ("Agrave", "\u{00C0}"),
    ("Aacute", "\u{00C1}"),
    ("Acirc", "\u{00C2}"),
    ("Atilde", "\u{00C3}"),
    ("Auml", "\u{00C4}"),
    ("Aring", "\u{00C5}"),
    ("AElig", "\u{00C6}"),
    ("Ccedil", "\u{00C7}"),
    ("Egrave", "\u{00C8}"),
    ("Eacute", "\u{00C9}"),
    ("Ecirc", "\u{00CA}"),
    ("Euml", "\u{00CB}"),
    ("Igrave", "\u{00CC}"),
    ("Iacute", "\u{00CD}"),
    ("Icirc", "\u{00CE}"),
    ("Iuml", "\u{00CF}"),
    ("Ntilde", "\u{00D1}"),
    ("Ograve", "\u{00D2}"),
    ("Oacute", "\u{00D3}"),
    ("Ocirc", "\u{00D4}"),
    ("Otilde", "\u{00D5}"),
    ("Ouml", "\u{00D6}"),
    ("Oslash", "\u{00D8}"),
    ("Ugrave", "\u{00D9}"),
    ("Uacute", "\u{00DA}"),
    ("Ucirc", "\u{00DB}"),
    ("Uuml", "\u{00DC}"),
    ("Yacute", "\u{00DD}"),
    ("alpha", "\u{03B1}"),
    ("beta", "\u{03B2}"),
    ("gamma", "\u{03B3}"),
    ("delta", "\u{03B4}"),
    ("epsilon", "\u{03B5}"),
    ("pi", "\u{03C0}"),
    ("sigma", "\u{03C3}"),
    ("omega", "\u{03C9}"),
    ("infin", "\u{221E}"),
    ("ne", "\u{2260}"),
    ("le", "\u{2264}"),
    ("ge", "\u{2265}"),
    ("larr", "\u{2190}"),
    ("uarr", "\u{2191}"),
    ("rarr", "\u{2192}"),
    ("darr", "\u{2193}"),
    ("harr", "\u{2194}"),
    ("spades", "\u{2660}"),
    ("clubs", "\u{2663}"),
    ("hearts", "\u{2665}"),
    ("diams", "\u{2666}"),
    ("loz", "\u{25CA}"),
    ("star", "\u{2606}"),
    ("check", "\u{2713}"),
    ("cross", "\u{2717}"),
    ("frac12", "\u{00BD}"),
    ("frac14", "\u{00BC}"),
    ("frac34", "\u{00BE}"),
    ("sup1", "\u{00B9}"),
    ("sup2", "\u{00B2}"),
    ("sup3", "\u{00B3}"),
    ("iquest", "\u{00BF}"),
    ("iexcl", "\u{00A1}"),
    ("ordf", "\u{00AA}"),
    ("ordm", "\u{00BA}"),
    ("micro", "\u{00B5}"),
    ("not", "\u{00AC}"),
    ("acute", "\u{00B4}"),
    ("uml", "\u{00A8}"),
    ("cedil", "\u{00B8}"),
    ("macr", "\u{00AF}"),
    ("oline", "\u{203E}"),
    ("circ", "\u{02C6}"),
    ("tilde", "\u{02DC}"),
    ("thinsp", "\u{2009}"),
    ("ensp", "\u{2002}"),
    ("emsp", "\u{2003}"),
    ("zwnj", "\u{200C}"),
    ("zwj", "\u{200D}"),
    ("lrm", "\u{200E}"),
    ("rlm", "\u{200F}"),
    ("OElig", "\u{0152}"),
    ("oelig", "\u{0153}"),
    ("Scaron", "\u{0160}"),
    ("scaron", "\u{0161}"),
    ("Yuml", "\u{0178}"),
    ("fnof", "\u{0192}"),
    ("circledR", "\u{00AE}"),
    ("prime", "\u{2032}"),
    ("Prime", "\u{2033}"),
    ("sum", "\u{2211}"),
    ("prod", "\u{220F}"),
    ("part", "\u{2202}"),
    ("radic", "\u{221A}"),
    ("prop", "\u{221D}"),
    ("asymp", "\u{2248}"),
    ("equiv", "\u{2261}"),
    ("sub", "\u{2282}"),
    ("sup", "\u{2283}"),
    ("nsub", "\u{2284}"),
    ("sube", "\u{2286}"),
    ("supe", "\u{2287}"),
    ("oplus", "\u{2295}"),
    ("otimes", "\u{2297}"),
    ("perp", "\u{22A5}"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_font_weight_bold() {
        let s = parse_inline_style("font-weight: bold; color: red");
        assert_eq!(s.font_weight, Some(FontWeight::Bold));
    }

    #[test]
    fn parses_numeric_font_weight_threshold() {
        assert_eq!(parse_inline_style("font-weight: 700").font_weight, Some(FontWeight::Bold));
        assert_eq!(parse_inline_style("font-weight: 400").font_weight, None);
    }

    #[test]
    fn merged_style_prefers_inner_declaration() {
        let outer = parse_inline_style("font-weight: bold");
        let inner = parse_inline_style("font-style: italic");
        let merged = outer.merged_with(&inner);
        assert_eq!(merged.font_weight, Some(FontWeight::Bold));
        assert_eq!(merged.font_style, Some(FontStyle::Italic));
    }

    #[test]
    fn resolves_named_entities() {
        assert_eq!(resolve_entity("amp"), Some("&".to_string()));
        assert_eq!(resolve_entity("mdash"), Some("\u{2014}".to_string()));
    }

    #[test]
    fn resolves_numeric_entities() {
        assert_eq!(resolve_entity("#65"), Some("A".to_string()));
        assert_eq!(resolve_entity("#x41"), Some("A".to_string()));
    }

    #[test]
    fn unknown_entity_returns_none() {
        assert_eq!(resolve_entity("notarealentity"), None);
    }

    #[test]
    fn parses_dir_attribute() {
        assert_eq!(parse_dir_attr("rtl"), Some(Direction::Rtl));
        assert_eq!(parse_dir_attr("LTR"), Some(Direction::Ltr));
        assert_eq!(parse_dir_attr("auto"), None);
    }
}
