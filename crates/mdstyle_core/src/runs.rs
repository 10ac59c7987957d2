//! Inline style runs.
//!
//! Marks collected while flattening a line may nest or overlap. The line is
//! cut at every mark boundary, each piece gets the presentation of the marks
//! active over it, and equal neighbours are merged again. The resulting runs
//! are sorted and never overlap.

use std::ops::Range;

use crate::config::{Element, PreparedConfig};
use crate::styled::{InlineStyle, Presentation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkKind {
    Bold,
    Italic,
    Strikethrough,
    Code,
    Link,
}

/// A rune range of one inline kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Mark {
    pub start: usize,
    pub end: usize,
    pub kind: MarkKind,
}

#[derive(Debug, Default, Clone, Copy)]
struct Active {
    bold: bool,
    italic: bool,
    strikethrough: bool,
    code: bool,
    link: bool,
}

impl Active {
    fn set(&mut self, kind: MarkKind) {
        match kind {
            MarkKind::Bold => self.bold = true,
            MarkKind::Italic => self.italic = true,
            MarkKind::Strikethrough => self.strikethrough = true,
            MarkKind::Code => self.code = true,
            MarkKind::Link => self.link = true,
        }
    }

    fn presentation(self, base: &Presentation, config: &PreparedConfig) -> Presentation {
        let mut out = base.clone();
        let emphasis = match (self.bold, self.italic) {
            (true, true) => Some(Element::BoldItalic),
            (true, false) => Some(Element::Bold),
            (false, true) => Some(Element::Italic),
            (false, false) => None,
        };
        let layers = [
            emphasis,
            self.strikethrough.then_some(Element::Strikethrough),
            self.code.then_some(Element::Code),
            self.link.then_some(Element::Link),
        ];
        for element in layers.into_iter().flatten() {
            out.layer(&config.style(element).presentation);
        }
        out
    }
}

/// Sorted, deduplicated cut points within `0..=len`.
fn boundaries(len: usize, ranges: impl Iterator<Item = (usize, usize)>) -> Vec<usize> {
    let mut cuts = vec![0, len];
    for (start, end) in ranges {
        cuts.push(start.min(len));
        cuts.push(end.min(len));
    }
    cuts.sort_unstable();
    cuts.dedup();
    cuts
}

/// Turn pieces into runs: drop empty presentations, merge equal neighbours.
fn coalesce(pieces: impl Iterator<Item = (usize, usize, Presentation)>) -> Vec<InlineStyle> {
    let mut runs: Vec<InlineStyle> = Vec::new();
    for (start, end, presentation) in pieces {
        if start >= end || presentation.is_empty() {
            continue;
        }
        if let Some(last) = runs.last_mut() {
            if last.end == start && last.presentation() == presentation {
                last.end = end;
                continue;
            }
        }
        runs.push(InlineStyle::new(start, end, presentation));
    }
    runs
}

/// Runs for a line of `len` runes whose whole visible range carries `base`.
pub(crate) fn resolve_marks(
    len: usize,
    base: &Presentation,
    marks: &[Mark],
    config: &PreparedConfig,
) -> Vec<InlineStyle> {
    let cuts = boundaries(len, marks.iter().map(|m| (m.start, m.end)));
    let pieces = cuts.windows(2).map(|w| {
        let (start, end) = (w[0], w[1]);
        let mut active = Active::default();
        for mark in marks.iter().filter(|m| m.start <= start && end <= m.end) {
            active.set(mark.kind);
        }
        (start, end, active.presentation(base, config))
    });
    coalesce(pieces)
}

/// Stack presentations over a line of `len` runes; later layers override
/// the fields they set.
pub(crate) fn overlay(len: usize, layers: &[(Range<usize>, Presentation)]) -> Vec<InlineStyle> {
    let cuts = boundaries(len, layers.iter().map(|(r, _)| (r.start, r.end)));
    let pieces = cuts.windows(2).map(|w| {
        let (start, end) = (w[0], w[1]);
        let mut presentation = Presentation::default();
        for (range, layer) in layers {
            if range.start <= start && end <= range.end {
                presentation.layer(layer);
            }
        }
        (start, end, presentation)
    });
    coalesce(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use crate::styled::Color;
    use pretty_assertions::assert_eq;

    const STYLES: &str = r##"
[styles.bold]
font = "B"

[styles.italic]
font = "I"

[styles.bold_italic]
font = "BI"

[styles.strikethrough]
color = "#888888"

[styles.code]
font = "Mono"
color = "#cc0000"
"##;

    fn mark(start: usize, end: usize, kind: MarkKind) -> Mark {
        Mark { start, end, kind }
    }

    fn font(style: &InlineStyle) -> (usize, usize, Option<&str>) {
        (style.start, style.end, style.font.as_deref())
    }

    #[test]
    fn identical_bold_and_italic_merge_into_one_run() {
        let config = load_config(Some(STYLES)).unwrap();
        let marks = [mark(2, 6, MarkKind::Italic), mark(2, 6, MarkKind::Bold)];
        let runs = resolve_marks(10, &Presentation::default(), &marks, &config);
        assert_eq!(runs.iter().map(font).collect::<Vec<_>>(), vec![(2, 6, Some("BI"))]);
    }

    #[test]
    fn partial_overlap_splits_into_sub_runs() {
        let config = load_config(Some(STYLES)).unwrap();
        let marks = [mark(0, 6, MarkKind::Bold), mark(4, 10, MarkKind::Italic)];
        let runs = resolve_marks(12, &Presentation::default(), &marks, &config);
        assert_eq!(
            runs.iter().map(font).collect::<Vec<_>>(),
            vec![(0, 4, Some("B")), (4, 6, Some("BI")), (6, 10, Some("I"))]
        );
    }

    #[test]
    fn nested_italic_inside_bold() {
        let config = load_config(Some(STYLES)).unwrap();
        let marks = [mark(0, 9, MarkKind::Bold), mark(3, 6, MarkKind::Italic)];
        let runs = resolve_marks(9, &Presentation::default(), &marks, &config);
        assert_eq!(
            runs.iter().map(font).collect::<Vec<_>>(),
            vec![(0, 3, Some("B")), (3, 6, Some("BI")), (6, 9, Some("B"))]
        );
    }

    #[test]
    fn base_color_fills_the_unmarked_gaps() {
        let config = load_config(Some(STYLES)).unwrap();
        let base = Presentation {
            color: Some(Color::rgb(1, 1, 1)),
            ..Presentation::default()
        };
        let runs = resolve_marks(8, &base, &[mark(2, 4, MarkKind::Bold)], &config);
        assert_eq!(runs.len(), 3);
        assert_eq!((runs[0].start, runs[0].end, runs[0].font.as_deref()), (0, 2, None));
        assert_eq!(runs[1].font.as_deref(), Some("B"));
        assert_eq!(runs[1].color, Some(Color::rgb(1, 1, 1)));
        assert_eq!((runs[2].start, runs[2].end), (4, 8));
    }

    #[test]
    fn code_overrides_strikethrough_color() {
        let config = load_config(Some(STYLES)).unwrap();
        let marks = [mark(0, 4, MarkKind::Strikethrough), mark(1, 3, MarkKind::Code)];
        let runs = resolve_marks(4, &Presentation::default(), &marks, &config);
        assert_eq!(runs[1].color, Some(Color::rgb(0xcc, 0, 0)));
        assert_eq!(runs[1].font.as_deref(), Some("Mono"));
        assert_eq!(runs[0].color, Some(Color::rgb(0x88, 0x88, 0x88)));
    }

    #[test]
    fn no_marks_and_no_base_yields_nothing() {
        let config = load_config(Some(STYLES)).unwrap();
        assert!(resolve_marks(5, &Presentation::default(), &[], &config).is_empty());
    }

    #[test]
    fn overlay_later_layers_win() {
        let red = Presentation {
            color: Some(Color::rgb(255, 0, 0)),
            ..Presentation::default()
        };
        let mono = Presentation {
            font: Some("Mono".into()),
            ..Presentation::default()
        };
        let runs = overlay(6, &[(2..6, red.clone()), (0..4, mono)]);
        assert_eq!(runs.len(), 3);
        assert_eq!((runs[0].start, runs[0].end, runs[0].color), (0, 2, None));
        assert_eq!(runs[1].font.as_deref(), Some("Mono"));
        assert_eq!(runs[1].color, red.color);
        assert_eq!((runs[2].start, runs[2].end, runs[2].font.as_deref()), (4, 6, None));
    }
}
