//! Style sheet loading and resolution.
//!
//! `default_styles.toml` is embedded into every binary. A user document is
//! layered over it key by key ([`StyleConfig::layered_over`]) and the result
//! is resolved once into a read-only [`PreparedConfig`] that every conversion
//! borrows.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::error::{Error, Result};
use crate::styled::{Color, Presentation};

const DEFAULT_TOML: &str = include_str!("default_styles.toml");

/// A field of the authoring document.
///
/// `Null` is written as the empty string, since TOML has no null.
#[derive(Debug, Clone, PartialEq)]
pub enum Setting<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Setting<T> {
    fn default() -> Self {
        Setting::Absent
    }
}

impl<T> Setting<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Setting::Absent)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Setting::Value(v) => Some(v),
            Setting::Absent | Setting::Null => None,
        }
    }

    /// `self` unless it is absent, in which case `base`.
    pub fn or(self, base: Setting<T>) -> Setting<T> {
        match self {
            Setting::Absent => base,
            explicit => explicit,
        }
    }
}

impl<T: Serialize> Serialize for Setting<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Setting::Value(v) => v.serialize(serializer),
            Setting::Absent | Setting::Null => serializer.serialize_str(""),
        }
    }
}

/// Matches only the empty string.
struct Empty;

impl<'de> Deserialize<'de> for Empty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            Ok(Empty)
        } else {
            Err(de::Error::custom("expected an empty string"))
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Setting<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw<T> {
            Empty(Empty),
            Value(T),
        }

        Ok(match Raw::<T>::deserialize(deserializer)? {
            Raw::Empty(Empty) => Setting::Null,
            Raw::Value(v) => Setting::Value(v),
        })
    }
}

/// Paragraph attributes applied when an element does not set its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Setting::is_absent")]
    pub font: Setting<String>,
    #[serde(skip_serializing_if = "Setting::is_absent")]
    pub size: Setting<f64>,
    #[serde(skip_serializing_if = "Setting::is_absent")]
    pub color: Setting<String>,
}

impl DefaultsConfig {
    fn layered_over(self, base: DefaultsConfig) -> DefaultsConfig {
        DefaultsConfig {
            font: self.font.or(base.font),
            size: self.size.or(base.size),
            color: self.color.or(base.color),
        }
    }
}

/// Literal text prepended to every line of an element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefixConfig {
    #[serde(skip_serializing_if = "Setting::is_absent")]
    pub content: Setting<String>,
}

/// One entry under `[styles]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementConfig {
    #[serde(skip_serializing_if = "Setting::is_absent")]
    pub font: Setting<String>,
    #[serde(skip_serializing_if = "Setting::is_absent")]
    pub size: Setting<f64>,
    #[serde(skip_serializing_if = "Setting::is_absent")]
    pub color: Setting<String>,
    #[serde(skip_serializing_if = "Setting::is_absent")]
    pub margin_top: Setting<f64>,
    #[serde(skip_serializing_if = "Setting::is_absent")]
    pub margin_bottom: Setting<f64>,
    #[serde(skip_serializing_if = "Setting::is_absent")]
    pub prefix: Setting<PrefixConfig>,
}

impl ElementConfig {
    fn layered_over(self, base: ElementConfig) -> ElementConfig {
        let prefix = match (self.prefix, base.prefix) {
            (Setting::Value(over), Setting::Value(under)) => Setting::Value(PrefixConfig {
                content: over.content.or(under.content),
            }),
            (over, under) => over.or(under),
        };
        ElementConfig {
            font: self.font.or(base.font),
            size: self.size.or(base.size),
            color: self.color.or(base.color),
            margin_top: self.margin_top.or(base.margin_top),
            margin_bottom: self.margin_bottom.or(base.margin_bottom),
            prefix,
        }
    }
}

/// The style document as authored, with absent and empty fields kept apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Named colors, referenced as `"$name"`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub colors: BTreeMap<String, String>,
    pub defaults: DefaultsConfig,
    pub styles: BTreeMap<String, ElementConfig>,
}

impl StyleConfig {
    /// Parse a TOML style document on its own, without the defaults.
    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// The built-in style document.
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_TOML)
    }

    /// Serialize back to TOML, keeping explicit empty fields.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Override `base` with every field this document sets.
    pub fn layered_over(self, base: StyleConfig) -> StyleConfig {
        let mut colors = base.colors;
        colors.extend(self.colors);

        let mut styles = base.styles;
        for (name, over) in self.styles {
            let merged = match styles.remove(&name) {
                Some(under) => over.layered_over(under),
                None => over,
            };
            styles.insert(name, merged);
        }

        StyleConfig {
            colors,
            defaults: self.defaults.layered_over(base.defaults),
            styles,
        }
    }
}

/// Every element a style sheet can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Paragraph,
    Bold,
    Italic,
    BoldItalic,
    Strikethrough,
    Code,
    CodeBlock,
    Blockquote,
    List,
    ListItem,
    HorizontalRule,
    Link,
}

impl Element {
    pub const COUNT: usize = 18;

    pub const ALL: [Element; Element::COUNT] = [
        Element::H1,
        Element::H2,
        Element::H3,
        Element::H4,
        Element::H5,
        Element::H6,
        Element::Paragraph,
        Element::Bold,
        Element::Italic,
        Element::BoldItalic,
        Element::Strikethrough,
        Element::Code,
        Element::CodeBlock,
        Element::Blockquote,
        Element::List,
        Element::ListItem,
        Element::HorizontalRule,
        Element::Link,
    ];

    /// Key of the element under `[styles]`.
    pub fn name(self) -> &'static str {
        match self {
            Element::H1 => "h1",
            Element::H2 => "h2",
            Element::H3 => "h3",
            Element::H4 => "h4",
            Element::H5 => "h5",
            Element::H6 => "h6",
            Element::Paragraph => "paragraph",
            Element::Bold => "bold",
            Element::Italic => "italic",
            Element::BoldItalic => "bold_italic",
            Element::Strikethrough => "strikethrough",
            Element::Code => "code",
            Element::CodeBlock => "code_block",
            Element::Blockquote => "blockquote",
            Element::List => "list",
            Element::ListItem => "list_item",
            Element::HorizontalRule => "horizontal_rule",
            Element::Link => "link",
        }
    }

    pub fn from_name(name: &str) -> Option<Element> {
        Element::ALL.into_iter().find(|e| e.name() == name)
    }

    /// Style for a heading level; levels outside 1..=6 clamp.
    pub fn heading(level: u8) -> Element {
        match level {
            0 | 1 => Element::H1,
            2 => Element::H2,
            3 => Element::H3,
            4 => Element::H4,
            5 => Element::H5,
            _ => Element::H6,
        }
    }

    /// Inline elements override the enclosing block rather than `[defaults]`.
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            Element::Bold
                | Element::Italic
                | Element::BoldItalic
                | Element::Strikethrough
                | Element::Code
                | Element::Link
        )
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully resolved element style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedStyle {
    pub presentation: Presentation,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub prefix: String,
}

/// The resolved, immutable style sheet shared by all conversions.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedConfig {
    defaults: Presentation,
    styles: [ResolvedStyle; Element::COUNT],
}

impl PreparedConfig {
    /// Resolve an authoring document. Palette references and inheritance
    /// from `[defaults]` are settled here and nowhere else.
    pub fn from_config(config: &StyleConfig) -> Result<Self> {
        let palette = Palette::new(&config.colors)?;

        for name in config.styles.keys() {
            if Element::from_name(name).is_none() {
                debug!(name = name.as_str(), "ignoring unknown style element");
            }
        }

        let defaults = resolve_defaults(&config.defaults, &palette)?;
        let mut styles: [ResolvedStyle; Element::COUNT] = Default::default();
        for element in Element::ALL {
            let style = match config.styles.get(element.name()) {
                Some(entry) => resolve_element(element, entry, &defaults, &palette)?,
                None => resolve_element(element, &ElementConfig::default(), &defaults, &palette)?,
            };
            styles[element.index()] = style;
        }

        debug!(
            palette = config.colors.len(),
            elements = config.styles.len(),
            "resolved style configuration"
        );
        Ok(Self { defaults, styles })
    }

    /// The embedded style sheet, resolved.
    pub fn compiled_default() -> Result<Self> {
        Self::from_config(&StyleConfig::embedded()?)
    }

    pub fn defaults(&self) -> &Presentation {
        &self.defaults
    }

    pub fn style(&self, element: Element) -> &ResolvedStyle {
        &self.styles[element.index()]
    }
}

/// Load the style sheet: the embedded defaults, overridden by `source` when
/// it holds anything but whitespace.
pub fn load_config(source: Option<&str>) -> Result<PreparedConfig> {
    let base = StyleConfig::embedded()?;
    let config = match source {
        Some(text) if !text.trim().is_empty() => {
            debug!(bytes = text.len(), "layering style overrides");
            StyleConfig::from_toml(text)?.layered_over(base)
        }
        _ => base,
    };
    PreparedConfig::from_config(&config)
}

/// Read a style document from disk and load it over the defaults.
pub fn load_config_file(path: impl AsRef<Path>) -> Result<PreparedConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    load_config(Some(&content))
}

struct Palette {
    colors: BTreeMap<String, Color>,
}

impl Palette {
    fn new(raw: &BTreeMap<String, String>) -> Result<Self> {
        let mut colors = BTreeMap::new();
        for (name, value) in raw {
            let color = Color::from_hex(value).ok_or_else(|| Error::InvalidColor {
                element: format!("colors.{name}"),
                value: value.clone(),
            })?;
            colors.insert(name.clone(), color);
        }
        Ok(Self { colors })
    }

    fn resolve(&self, element: &str, value: &str) -> Result<Color> {
        if let Some(name) = value.strip_prefix('$') {
            return self
                .colors
                .get(name)
                .copied()
                .ok_or_else(|| Error::UnknownPaletteColor {
                    element: element.to_string(),
                    name: name.to_string(),
                });
        }
        Color::from_hex(value).ok_or_else(|| Error::InvalidColor {
            element: element.to_string(),
            value: value.to_string(),
        })
    }
}

fn checked(element: &str, field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(Error::InvalidValue {
            element: element.to_string(),
            field,
            value,
        })
    }
}

fn resolve_defaults(config: &DefaultsConfig, palette: &Palette) -> Result<Presentation> {
    let size = match config.size.value() {
        Some(&size) => Some(checked("defaults", "size", size)?),
        None => None,
    };
    let color = match config.color.value() {
        Some(value) => Some(palette.resolve("defaults", value)?),
        None => None,
    };
    Ok(Presentation {
        font: config.font.value().cloned(),
        size,
        color,
    })
}

fn resolve_element(
    element: Element,
    config: &ElementConfig,
    defaults: &Presentation,
    palette: &Palette,
) -> Result<ResolvedStyle> {
    let name = element.name();
    let inherit = !element.is_inline();

    let font = match config.font.value() {
        Some(font) => Some(font.clone()),
        None if inherit => defaults.font.clone(),
        None => None,
    };
    let size = match config.size.value() {
        Some(&size) => Some(checked(name, "size", size)?),
        None if inherit => defaults.size,
        None => None,
    };
    // An explicit empty color clears it rather than inheriting
    let color = match &config.color {
        Setting::Value(value) => Some(palette.resolve(name, value)?),
        Setting::Absent if inherit => defaults.color,
        Setting::Absent | Setting::Null => None,
    };
    let margin_top = match config.margin_top.value() {
        Some(&v) => checked(name, "margin_top", v)?,
        None => 0.0,
    };
    let margin_bottom = match config.margin_bottom.value() {
        Some(&v) => checked(name, "margin_bottom", v)?,
        None => 0.0,
    };
    let prefix = config
        .prefix
        .value()
        .and_then(|p| p.content.value())
        .cloned()
        .unwrap_or_default();

    Ok(ResolvedStyle {
        presentation: Presentation { font, size, color },
        margin_top,
        margin_bottom,
        prefix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn load(source: &str) -> PreparedConfig {
        load_config(Some(source)).expect("config to load")
    }

    #[test]
    fn loads_embedded_defaults() {
        let config = PreparedConfig::compiled_default().expect("defaults to resolve");
        assert_eq!(config.defaults().font.as_deref(), Some("Helvetica"));
        assert_eq!(config.defaults().size, Some(12.0));
        assert_eq!(config.defaults().color, None);

        let h1 = config.style(Element::H1);
        assert_eq!(h1.presentation.font.as_deref(), Some("Helvetica-Bold"));
        assert_eq!(h1.margin_top, 12.0);
        assert_eq!(config.style(Element::CodeBlock).prefix, "  ");
        assert_eq!(config.style(Element::ListItem).prefix, "•");
    }

    #[test]
    fn empty_source_means_defaults() {
        let defaults = PreparedConfig::compiled_default().unwrap();
        assert_eq!(load_config(None).unwrap(), defaults);
        assert_eq!(load_config(Some("")).unwrap(), defaults);
        assert_eq!(load_config(Some("  \n\t")).unwrap(), defaults);
    }

    #[test]
    fn overrides_key_by_key() {
        let config = load("[styles.h1]\nsize = 30\n");
        let h1 = config.style(Element::H1);
        assert_eq!(h1.presentation.size, Some(30.0));
        // Untouched keys keep the embedded values
        assert_eq!(h1.presentation.font.as_deref(), Some("Helvetica-Bold"));
        assert_eq!(h1.margin_bottom, 6.0);
    }

    #[rstest]
    #[case::value("font = \"Georgia\"", Some("Georgia"))]
    #[case::explicit_empty_inherits_defaults("font = \"\"", Some("Times"))]
    #[case::absent_keeps_embedded("", Some("Helvetica-Bold"))]
    fn block_font_resolution(#[case] entry: &str, #[case] expected: Option<&str>) {
        let config = load(&format!(
            "[defaults]\nfont = \"Times\"\n\n[styles.h2]\n{entry}\n"
        ));
        assert_eq!(
            config.style(Element::H2).presentation.font.as_deref(),
            expected
        );
    }

    #[rstest]
    #[case::value("color = \"#ff0000\"", Some(Color::rgb(255, 0, 0)))]
    #[case::absent_inherits_default_color("", Some(Color::rgb(0x11, 0x22, 0x33)))]
    #[case::explicit_empty_clears("color = \"\"", None)]
    fn block_color_resolution(#[case] entry: &str, #[case] expected: Option<Color>) {
        let config = load(&format!(
            "[defaults]\ncolor = \"#112233\"\n\n[styles.paragraph]\n{entry}\n"
        ));
        assert_eq!(config.style(Element::Paragraph).presentation.color, expected);
    }

    #[test]
    fn inline_elements_do_not_inherit_defaults() {
        let config = load("[defaults]\ncolor = \"#112233\"\n");
        let bold = &config.style(Element::Bold).presentation;
        assert_eq!(bold.font.as_deref(), Some("Helvetica-Bold"));
        assert_eq!(bold.size, None);
        assert_eq!(bold.color, None);
    }

    #[test]
    fn palette_references_resolve() {
        let config = load("[colors]\nbrand = \"#abc\"\n\n[styles.link]\ncolor = \"$brand\"\n");
        assert_eq!(
            config.style(Element::Link).presentation.color,
            Some(Color::rgb(0xaa, 0xbb, 0xcc))
        );
    }

    #[test]
    fn unknown_palette_name_fails() {
        let err = load_config(Some("[styles.link]\ncolor = \"$nope\"\n")).unwrap_err();
        assert!(matches!(err, Error::UnknownPaletteColor { ref name, .. } if name == "nope"));
        assert!(err.is_config_error());
    }

    #[test]
    fn invalid_color_fails() {
        let err = load_config(Some("[styles.h1]\ncolor = \"red\"\n")).unwrap_err();
        assert!(matches!(err, Error::InvalidColor { ref element, .. } if element == "h1"));
    }

    #[test]
    fn negative_margin_fails() {
        let err = load_config(Some("[styles.h1]\nmargin_top = -1\n")).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { field: "margin_top", .. }));
    }

    #[test]
    fn malformed_document_fails() {
        let err = load_config(Some("[styles.h1\nsize = 3")).unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
        let err = load_config(Some("defaults = 5\n")).unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = load("version = 3\n\n[page]\nwidth = 10\n\n[styles.table]\nfont = \"X\"\n");
        assert_eq!(config, PreparedConfig::compiled_default().unwrap());
    }

    #[test]
    fn explicit_empty_prefix_removes_it() {
        let config = load("[styles.code_block]\nprefix = \"\"\n");
        assert_eq!(config.style(Element::CodeBlock).prefix, "");
        let config = load("[styles.blockquote]\nprefix = { content = \"\" }\n");
        assert_eq!(config.style(Element::Blockquote).prefix, "");
    }

    #[test]
    fn empty_margin_means_zero() {
        let config = load("[styles.h1]\nmargin_top = \"\"\n");
        assert_eq!(config.style(Element::H1).margin_top, 0.0);
        assert_eq!(config.style(Element::H1).margin_bottom, 6.0);
    }

    #[test]
    fn authoring_form_keeps_absent_and_empty_apart() {
        let doc = StyleConfig::from_toml("[styles.h1]\nfont = \"\"\n").unwrap();
        let h1 = &doc.styles["h1"];
        assert_eq!(h1.font, Setting::Null);
        assert_eq!(h1.size, Setting::Absent);
    }

    #[test]
    fn authoring_form_round_trips() {
        let source = "[colors]\naccent = \"#102030\"\n\n[defaults]\nsize = 11\ncolor = \"\"\n\n\
                      [styles.h1]\nfont = \"\"\ncolor = \"$accent\"\nmargin_top = 4\n\n\
                      [styles.code_block]\nprefix = { content = \"    \" }\n";
        let doc = StyleConfig::from_toml(source).unwrap();
        let reparsed = StyleConfig::from_toml(&doc.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed, doc);
        assert_eq!(reparsed.defaults.color, Setting::Null);
        assert_eq!(reparsed.styles["h1"].size, Setting::Absent);
    }

    #[test]
    fn embedded_document_round_trips() {
        let doc = StyleConfig::embedded().unwrap();
        let reparsed = StyleConfig::from_toml(&doc.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn element_names_round_trip() {
        for element in Element::ALL {
            assert_eq!(Element::from_name(element.name()), Some(element));
        }
        assert_eq!(Element::heading(3), Element::H3);
        assert_eq!(Element::heading(9), Element::H6);
    }
}
