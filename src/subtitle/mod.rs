//! Inline markup parsing, style resolution, and line layout.
//!
//! Text rasterization itself belongs to the `MediaBackend` — this module stops
//! at producing a measured, wrapped layout the backend can draw.

pub mod sidecar;

use crate::script::{PartialStyle, SubtitleStyleConfig};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(\w+)>(.*?)</(\w+)>").unwrap())
}

/// A contiguous run of narration text sharing one style. `style_name` is
/// `None` for text outside any tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub style_name: Option<String>,
}

/// Split `text` on well-formed `<tag>...</tag>` spans (regex has no
/// backreferences, so open/close tag equality is checked after matching).
/// A mismatched open/close pair is left as literal text, matching the
/// invariant that `concat(span.text) == text` always holds regardless of
/// malformed markup.
pub fn parse_markup(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last_end = 0;
    for caps in markup_regex().captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let open_tag = &caps[1];
        let inner = &caps[2];
        let close_tag = &caps[3];

        if whole.start() > last_end {
            spans.push(Span {
                text: text[last_end..whole.start()].to_string(),
                style_name: None,
            });
        }

        if open_tag == close_tag {
            spans.push(Span {
                text: inner.to_string(),
                style_name: Some(open_tag.to_string()),
            });
        } else {
            spans.push(Span {
                text: whole.as_str().to_string(),
                style_name: None,
            });
        }
        last_end = whole.end();
    }
    if last_end < text.len() {
        spans.push(Span {
            text: text[last_end..].to_string(),
            style_name: None,
        });
    }
    if spans.is_empty() {
        spans.push(Span {
            text: String::new(),
            style_name: None,
        });
    }
    spans
}

/// `strip_markup(text) == concat(span.text for span in parse_markup(text))`
/// — this is the string handed to the TTS provider.
pub fn strip_markup(text: &str) -> String {
    parse_markup(text)
        .into_iter()
        .map(|s| s.text)
        .collect::<Vec<_>>()
        .concat()
}

/// Tag names referenced by well-formed markup in `text`, for validation.
pub fn referenced_tags(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    parse_markup(text)
        .into_iter()
        .filter_map(|s| s.style_name)
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// A style fully resolved for one span: base style with span-level
/// overrides applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyle {
    pub font_family: String,
    pub font_size: f64,
    pub font_color: String,
    pub font_weight: String,
}

pub fn resolve_style(
    base: &SubtitleStyleConfig,
    style_name: Option<&str>,
    styles: &HashMap<String, PartialStyle>,
) -> ResolvedStyle {
    let mut resolved = ResolvedStyle {
        font_family: base.font_family.clone(),
        font_size: base.font_size,
        font_color: base.font_color.clone(),
        font_weight: base.font_weight.clone(),
    };
    if let Some(name) = style_name {
        if let Some(partial) = styles.get(name) {
            if let Some(color) = &partial.font_color {
                resolved.font_color = color.clone();
            }
            if let Some(weight) = &partial.font_weight {
                resolved.font_weight = weight.clone();
            }
            if let Some(size) = partial.font_size {
                resolved.font_size = size;
            }
        }
    }
    resolved
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0xAC00..=0xD7A3 | 0x3400..=0x4DBF)
}

/// Crude but deterministic glyph-advance estimate: CJK codepoints are
/// roughly square, Latin glyphs roughly half as wide as tall. Real glyph
/// metrics live behind `MediaBackend`; this is only used to decide wrap
/// points ahead of rasterization.
fn char_width(c: char, font_size: f64) -> f64 {
    if is_cjk(c) {
        font_size
    } else {
        font_size * 0.5
    }
}

/// One word-ish unit to place during wrapping: Latin text wraps on
/// whitespace boundaries, CJK text may wrap between any two codepoints.
#[derive(Debug, Clone)]
struct Token {
    text: String,
    style: ResolvedStyle,
    width: f64,
}

fn tokenize(spans: &[Span], base: &SubtitleStyleConfig, styles: &HashMap<String, PartialStyle>) -> Vec<Token> {
    let mut tokens = Vec::new();
    for span in spans {
        let style = resolve_style(base, span.style_name.as_deref(), styles);
        let mut current = String::new();
        for c in span.text.chars() {
            if is_cjk(c) {
                if !current.is_empty() {
                    let width = current.chars().map(|c| char_width(c, style.font_size)).sum();
                    tokens.push(Token { text: std::mem::take(&mut current), style: style.clone(), width });
                }
                let width = char_width(c, style.font_size);
                tokens.push(Token { text: c.to_string(), style: style.clone(), width });
            } else if c.is_whitespace() {
                if !current.is_empty() {
                    let width = current.chars().map(|c| char_width(c, style.font_size)).sum();
                    tokens.push(Token { text: std::mem::take(&mut current), style: style.clone(), width });
                }
                tokens.push(Token { text: c.to_string(), style: style.clone(), width: char_width(c, style.font_size) });
            } else {
                current.push(c);
            }
        }
        if !current.is_empty() {
            let width = current.chars().map(|c| char_width(c, style.font_size)).sum();
            tokens.push(Token { text: current, style: style.clone(), width });
        }
    }
    tokens
}

/// A measured, style-tagged run of text within a wrapped line.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredRun {
    pub text: String,
    pub style: ResolvedStyle,
}

/// One wrapped line ready for the backend to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub runs: Vec<MeasuredRun>,
    pub width: f64,
}

/// Wrap `spans` into lines no wider than `max_width`.
pub fn layout_lines(
    spans: &[Span],
    base: &SubtitleStyleConfig,
    styles: &HashMap<String, PartialStyle>,
    max_width: f64,
) -> Vec<Line> {
    let tokens = tokenize(spans, base, styles);
    let mut lines = Vec::new();
    let mut current_runs: Vec<MeasuredRun> = Vec::new();
    let mut current_width = 0.0;

    let flush = |runs: &mut Vec<MeasuredRun>, width: &mut f64, lines: &mut Vec<Line>| {
        // Trim a single trailing whitespace-only run so measured width matches what's drawn.
        if let Some(last) = runs.last() {
            if last.text.chars().all(|c| c.is_whitespace()) {
                runs.pop();
            }
        }
        if !runs.is_empty() {
            lines.push(Line { runs: std::mem::take(runs), width: *width });
        }
        *width = 0.0;
    };

    for token in tokens {
        if current_width + token.width > max_width && current_width > 0.0 {
            flush(&mut current_runs, &mut current_width, &mut lines);
        }
        merge_or_push(&mut current_runs, token.text, token.style);
        current_width += token.width;
    }
    flush(&mut current_runs, &mut current_width, &mut lines);
    if lines.is_empty() {
        lines.push(Line { runs: vec![], width: 0.0 });
    }
    lines
}

fn merge_or_push(runs: &mut Vec<MeasuredRun>, text: String, style: ResolvedStyle) {
    if let Some(last) = runs.last_mut() {
        if last.style == style {
            last.text.push_str(&text);
            return;
        }
    }
    runs.push(MeasuredRun { text, style });
}

/// Drop trailing lines that don't fit `max_height`.
pub fn clamp_lines_to_height(lines: Vec<Line>, line_height: f64, max_height: f64) -> Vec<Line> {
    let max_lines = (max_height / line_height).floor().max(1.0) as usize;
    if lines.len() <= max_lines {
        return lines;
    }
    tracing::warn!(
        total = lines.len(),
        kept = max_lines,
        "subtitle block exceeds available vertical space, dropping trailing lines"
    );
    lines.into_iter().take(max_lines).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markup_plain_text() {
        assert_eq!(strip_markup("hello world"), "hello world");
    }

    #[test]
    fn test_strip_markup_removes_tags() {
        assert_eq!(strip_markup("a<em>b</em>c"), "abc");
    }

    #[test]
    fn test_parse_markup_concat_equals_strip() {
        let text = "a<em>b</em>c<strong>d</strong>";
        let spans = parse_markup(text);
        let concat: String = spans.iter().map(|s| s.text.clone()).collect();
        assert_eq!(concat, strip_markup(text));
    }

    #[test]
    fn test_parse_markup_mismatched_tags_kept_literal() {
        let text = "a<em>b</strong>c";
        let spans = parse_markup(text);
        let concat: String = spans.iter().map(|s| s.text.clone()).collect();
        assert_eq!(concat, text);
    }

    #[test]
    fn test_referenced_tags() {
        let tags = referenced_tags("a<em>b</em>c<strong>d</strong><em>e</em>");
        assert_eq!(tags, vec!["em".to_string(), "strong".to_string()]);
    }

    #[test]
    fn test_resolve_style_overrides_color_and_weight() {
        let base = SubtitleStyleConfig::default();
        let mut styles = HashMap::new();
        styles.insert(
            "em".to_string(),
            PartialStyle {
                font_color: Some("#FF0000".into()),
                font_weight: None,
                font_size: None,
            },
        );
        let resolved = resolve_style(&base, Some("em"), &styles);
        assert_eq!(resolved.font_color, "#FF0000");
        assert_eq!(resolved.font_family, base.font_family);
    }

    #[test]
    fn test_layout_lines_wraps_on_width() {
        let base = SubtitleStyleConfig::default();
        let styles = HashMap::new();
        let spans = parse_markup("one two three four five");
        let lines = layout_lines(&spans, &base, &styles, 80.0);
        assert!(lines.len() > 1);
    }

    #[test]
    fn test_clamp_lines_to_height_drops_excess() {
        let lines: Vec<Line> = (0..10).map(|_| Line { runs: vec![], width: 0.0 }).collect();
        let clamped = clamp_lines_to_height(lines, 50.0, 120.0);
        assert_eq!(clamped.len(), 2);
    }
}
