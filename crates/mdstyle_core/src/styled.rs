use std::fmt;

use serde::{Serialize, Serializer};

/// What an emitted block represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    Heading,
    CodeBlock,
    Blockquote,
    ListItem,
    HorizontalRule,
    /// Content-free spacer standing in for a paragraph margin.
    Margin,
}

impl BlockKind {
    pub fn is_margin(&self) -> bool {
        matches!(self, BlockKind::Margin)
    }
}

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` or the `#RGB` shorthand.
    pub fn from_hex(value: &str) -> Option<Self> {
        let digits = value.strip_prefix('#')?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match digits.len() {
            6 => Some(Self::rgb(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            3 => {
                let expand = |i: usize| channel(&digits[i..i + 1]).map(|v| v * 17);
                Some(Self::rgb(expand(0)?, expand(1)?, expand(2)?))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Font, size and color, each optional. `None` leaves the attribute to
/// whatever lies underneath (the block, or the renderer's default).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Presentation {
    pub font: Option<String>,
    pub size: Option<f64>,
    pub color: Option<Color>,
}

impl Presentation {
    pub fn is_empty(&self) -> bool {
        self.font.is_none() && self.size.is_none() && self.color.is_none()
    }

    /// Override the fields `over` sets, keep the rest.
    pub fn layer(&mut self, over: &Presentation) {
        if over.font.is_some() {
            self.font.clone_from(&over.font);
        }
        if over.size.is_some() {
            self.size = over.size;
        }
        if over.color.is_some() {
            self.color = over.color;
        }
    }

    pub fn color_only(&self) -> Presentation {
        Presentation {
            color: self.color,
            ..Presentation::default()
        }
    }
}

/// A character-range override inside a block's text. `start` and `end` are
/// rune offsets, `end` exclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineStyle {
    pub start: usize,
    pub end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl InlineStyle {
    pub fn new(start: usize, end: usize, presentation: Presentation) -> Self {
        Self {
            start,
            end,
            font: presentation.font,
            size: presentation.size,
            color: presentation.color,
        }
    }

    pub fn presentation(&self) -> Presentation {
        Presentation {
            font: self.font.clone(),
            size: self.size,
            color: self.color,
        }
    }

    /// The same style moved `by` runes to the right.
    pub fn shifted(&self, by: usize) -> Self {
        Self {
            start: self.start + by,
            end: self.end + by,
            ..self.clone()
        }
    }
}

/// One renderable unit: a single line of text with uniform paragraph
/// attributes plus character-range overrides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyledBlock {
    #[serde(rename = "type", skip_serializing_if = "BlockKind::is_margin")]
    pub kind: BlockKind,
    /// Always ends with exactly one `\n`, which is the only newline.
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    /// Heading level, or list nesting depth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    pub inline_styles: Vec<InlineStyle>,
}

impl StyledBlock {
    /// A spacer of `size` points.
    pub fn margin(size: f64) -> Self {
        Self {
            kind: BlockKind::Margin,
            text: "\n".to_string(),
            font: None,
            size: Some(size),
            level: None,
            inline_styles: Vec::new(),
        }
    }

    pub fn is_margin(&self) -> bool {
        self.kind.is_margin()
    }

    /// Text without the trailing newline.
    pub fn content(&self) -> &str {
        self.text.strip_suffix('\n').unwrap_or(&self.text)
    }

    /// Rune count of the text, trailing newline excluded.
    pub fn content_len(&self) -> usize {
        self.content().chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(Color::from_hex("#1a4f8b"), Some(Color::rgb(0x1a, 0x4f, 0x8b)));
        assert_eq!(Color::from_hex("#fff"), Some(Color::rgb(255, 255, 255)));
        assert_eq!(Color::from_hex("1a4f8b"), None);
        assert_eq!(Color::from_hex("#12345"), None);
        assert_eq!(Color::from_hex("#gg0000"), None);
    }

    #[test]
    fn color_displays_lowercase_hex() {
        assert_eq!(Color::rgb(0xAB, 0x01, 0xFF).to_string(), "#ab01ff");
    }

    #[test]
    fn layer_overrides_only_set_fields() {
        let mut base = Presentation {
            font: Some("Helvetica".into()),
            size: Some(12.0),
            color: None,
        };
        base.layer(&Presentation {
            font: None,
            size: Some(24.0),
            color: Some(Color::rgb(1, 2, 3)),
        });
        assert_eq!(base.font.as_deref(), Some("Helvetica"));
        assert_eq!(base.size, Some(24.0));
        assert_eq!(base.color, Some(Color::rgb(1, 2, 3)));
    }

    #[test]
    fn margin_block_serializes_without_type() {
        let json = serde_json::to_value(StyledBlock::margin(6.0)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "text": "\n", "size": 6.0, "inline_styles": [] })
        );
    }

    #[test]
    fn content_block_serializes_flat_record() {
        let block = StyledBlock {
            kind: BlockKind::Heading,
            text: "Title\n".into(),
            font: Some("Helvetica-Bold".into()),
            size: None,
            level: Some(1),
            inline_styles: vec![InlineStyle::new(
                0,
                5,
                Presentation {
                    color: Some(Color::rgb(0, 0, 0xff)),
                    ..Presentation::default()
                },
            )],
        };
        assert_eq!(
            serde_json::to_value(block).unwrap(),
            serde_json::json!({
                "type": "heading",
                "text": "Title\n",
                "font": "Helvetica-Bold",
                "level": 1,
                "inline_styles": [{ "start": 0, "end": 5, "color": "#0000ff" }],
            })
        );
    }
}
