//! SRT/VTT sidecar export.

use crate::project::SubtitleItem;
use crate::subtitle::strip_markup;

fn format_timestamp(seconds: f64, decimal_sep: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;
    format!("{hours:02}:{mins:02}:{secs:02}{decimal_sep}{ms:03}")
}

fn render_blocks(items: &[SubtitleItem], decimal_sep: char) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        out.push_str(&(i + 1).to_string());
        out.push('\n');
        out.push_str(&format!(
            "{} --> {}\n",
            format_timestamp(item.start, decimal_sep),
            format_timestamp(item.end, decimal_sep)
        ));
        out.push_str(&strip_markup(&item.text));
        out.push_str("\n\n");
    }
    out
}

/// Render an SRT file body: `\n`-separated `index\ntime-range\ntext\n\n`
/// blocks, comma decimal separator.
pub fn render_srt(items: &[SubtitleItem]) -> String {
    render_blocks(items, ',')
}

/// Render a VTT file body: `WEBVTT` header, dot decimal separator.
pub fn render_vtt(items: &[SubtitleItem]) -> String {
    format!("WEBVTT\n\n{}", render_blocks(items, '.'))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

fn parse_timestamp(s: &str) -> Option<f64> {
    let s = s.trim();
    let (time_part, ms_part) = if let Some(idx) = s.rfind([',', '.']) {
        (&s[..idx], &s[idx + 1..])
    } else {
        return None;
    };
    let mut fields = time_part.split(':');
    let hours: f64 = fields.next()?.parse().ok()?;
    let mins: f64 = fields.next()?.parse().ok()?;
    let secs: f64 = fields.next()?.parse().ok()?;
    let ms: f64 = ms_part.parse().ok()?;
    Some(hours * 3600.0 + mins * 60.0 + secs + ms / 1000.0)
}

/// Parse an SRT or VTT body back into cues. Tolerant of the `WEBVTT` header and either decimal
/// separator.
pub fn parse_sidecar(body: &str) -> Vec<ParsedCue> {
    let mut cues = Vec::new();
    let normalized = body.replace("\r\n", "\n");
    let blocks = normalized.split("\n\n");
    for block in blocks {
        let mut lines = block.lines().filter(|l| *l != "WEBVTT" && !l.is_empty());
        let Some(first) = lines.next() else { continue };
        let range_line = if first.contains("-->") {
            first
        } else {
            match lines.next() {
                Some(l) if l.contains("-->") => l,
                _ => continue,
            }
        };
        let Some((start_str, end_str)) = range_line.split_once("-->") else {
            continue;
        };
        let (Some(start), Some(end)) = (parse_timestamp(start_str), parse_timestamp(end_str)) else {
            continue;
        };
        let text: Vec<&str> = lines.collect();
        cues.push(ParsedCue {
            start,
            end,
            text: text.join("\n"),
        });
    }
    cues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<SubtitleItem> {
        vec![
            SubtitleItem {
                text: "Hello".into(),
                start: 0.1,
                end: 1.2,
            },
            SubtitleItem {
                text: "a<em>b</em>c".into(),
                start: 1.5,
                end: 2.75,
            },
        ]
    }

    #[test]
    fn test_srt_uses_comma_separator() {
        let srt = render_srt(&items());
        assert!(srt.contains("00:00:00,100 --> 00:00:01,200"));
        assert!(!srt.starts_with("WEBVTT"));
    }

    #[test]
    fn test_vtt_uses_dot_separator_and_header() {
        let vtt = render_vtt(&items());
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:00:00.100 --> 00:00:01.200"));
    }

    #[test]
    fn test_sidecar_strips_markup() {
        let srt = render_srt(&items());
        assert!(srt.contains("abc"));
        assert!(!srt.contains("<em>"));
    }

    #[test]
    fn test_round_trip_srt() {
        let srt = render_srt(&items());
        let cues = parse_sidecar(&srt);
        assert_eq!(cues.len(), 2);
        assert!((cues[0].start - 0.1).abs() < 0.001);
        assert!((cues[0].end - 1.2).abs() < 0.001);
        assert_eq!(cues[0].text, "Hello");
        assert_eq!(cues[1].text, "abc");
    }

    #[test]
    fn test_round_trip_vtt() {
        let vtt = render_vtt(&items());
        let cues = parse_sidecar(&vtt);
        assert_eq!(cues.len(), 2);
        assert!((cues[1].start - 1.5).abs() < 0.001);
    }
}
