//! Error types for parsing, style loading and conversion.

use std::path::PathBuf;

/// Result type alias for mdstyle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by mdstyle. Every operation fails as a whole; no partial
/// output accompanies an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The style document is not valid TOML or does not match the schema.
    #[error("Invalid style document: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The style document could not be written back out.
    #[error("Failed to serialize style document: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// The style document could not be read.
    #[error("Failed to read style document at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A color value is not a `#RRGGBB` or `#RGB` hex string.
    #[error("Invalid color {value:?} for {element}")]
    InvalidColor { element: String, value: String },

    /// A `$name` color reference has no entry in `[colors]`.
    #[error("Unknown palette color {name:?} referenced by {element}")]
    UnknownPaletteColor { element: String, name: String },

    /// A size or margin is negative or not finite.
    #[error("Invalid {field} {value} for {element}")]
    InvalidValue {
        element: String,
        field: &'static str,
        value: f64,
    },

    /// The markdown source is not valid UTF-8.
    #[error("Markdown source is not valid UTF-8 (first invalid byte at offset {offset})")]
    MarkdownParse { offset: usize },

    /// The document could not be converted into blocks.
    #[error("Conversion failed at line {line}: {message}")]
    Conversion { line: usize, message: String },
}

impl Error {
    /// True for every error caused by a malformed style document.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::ConfigParse(_)
                | Error::InvalidColor { .. }
                | Error::UnknownPaletteColor { .. }
                | Error::InvalidValue { .. }
        )
    }
}
