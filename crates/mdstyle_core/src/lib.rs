//! Markdown to attributed text blocks.
//!
//! The output targets renderers that know paragraphs and character-range
//! style runs but nothing else: every block is one line, every style is a
//! rune range, and vertical spacing is spelled out as margin blocks.
//!
//! ```
//! # fn main() -> mdstyle_core::Result<()> {
//! let config = mdstyle_core::load_config(None)?;
//! let blocks = mdstyle_core::markdown_to_blocks("This is **bold** text", &config)?;
//! assert_eq!(blocks[0].text, "This is bold text\n");
//! assert_eq!((blocks[0].inline_styles[0].start, blocks[0].inline_styles[0].end), (8, 12));
//! # Ok(())
//! # }
//! ```

mod block;
mod config;
mod convert;
mod error;
mod parser;
mod runs;
mod styled;

pub use block::{Block, Document, List, ListItem, Node, Span};
pub use config::{
    DefaultsConfig, Element, ElementConfig, PrefixConfig, PreparedConfig, ResolvedStyle, Setting,
    StyleConfig, load_config, load_config_file,
};
pub use convert::{convert, validate};
pub use error::{Error, Result};
pub use parser::{decode, parse, parse_bytes};
pub use styled::{BlockKind, Color, InlineStyle, Presentation, StyledBlock};

/// Parse and convert markdown text with the given style sheet.
pub fn markdown_to_blocks(markdown: &str, config: &PreparedConfig) -> Result<Vec<StyledBlock>> {
    let document = parse(markdown);
    convert(&document, markdown, config)
}

/// Parse and convert raw bytes, rejecting invalid UTF-8.
pub fn bytes_to_blocks(source: &[u8], config: &PreparedConfig) -> Result<Vec<StyledBlock>> {
    markdown_to_blocks(parser::decode(source)?, config)
}

/// Convert markdown using the embedded style sheet.
pub fn markdown_to_blocks_default(markdown: &str) -> Result<Vec<StyledBlock>> {
    markdown_to_blocks(markdown, &PreparedConfig::compiled_default()?)
}
