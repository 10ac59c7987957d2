use std::ops::Range;

/// Inline text spans with formatting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Text(String),
    Bold(Vec<Span>),
    Italic(Vec<Span>),
    Strikethrough(Vec<Span>),
    Code(String),
    Link { url: String, content: Vec<Span> },
    /// A plain newline inside a paragraph; joins the adjacent text with a space.
    SoftBreak,
    /// A trailing double-space or backslash break; ends the emitted line.
    LineBreak,
}

/// A single list item, which can contain any block content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub blocks: Vec<Node>,
    /// For task lists: None = not a task, Some(false) = unchecked, Some(true) = checked
    pub checked: Option<bool>,
}

/// A list (ordered or unordered)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    pub ordered: bool,
    /// First number of an ordered list.
    pub start: u64,
    pub items: Vec<ListItem>,
}

/// Block-level elements parsed from Markdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading {
        level: u8,
        content: Vec<Span>,
    },
    Paragraph {
        content: Vec<Span>,
    },
    CodeBlock {
        /// Fence info string, if any.
        language: Option<String>,
        content: String,
    },
    BlockQuote {
        blocks: Vec<Node>,
    },
    List(List),
    /// Raw HTML block, passed through as text.
    Html {
        content: String,
    },
    Rule,
}

/// A block together with the byte range of the source it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub block: Block,
    pub span: Range<usize>,
}

impl Node {
    pub fn new(block: Block, span: Range<usize>) -> Self {
        Self { block, span }
    }
}

/// A parsed Markdown document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<Node>,
}

impl Document {
    /// Iterate over the top-level blocks without their spans.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().map(|node| &node.block)
    }
}
