use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::block::{Block, Document, List, ListItem, Node, Span};
use crate::error::{Error, Result};

/// Check raw input is UTF-8 before it reaches the parser.
pub fn decode(source: &[u8]) -> Result<&str> {
    std::str::from_utf8(source).map_err(|e| Error::MarkdownParse {
        offset: e.valid_up_to(),
    })
}

/// Parse raw bytes, rejecting input that is not valid UTF-8.
pub fn parse_bytes(source: &[u8]) -> Result<Document> {
    Ok(parse(decode(source)?))
}

/// Parse markdown text into a document of blocks. A leading YAML front
/// matter block is skipped.
pub fn parse(markdown: &str) -> Document {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    let parser = Parser::new_ext(markdown, options).into_offset_iter();

    let mut state = ParseState::default();
    for (event, range) in parser {
        process_event(event, range, &mut state);
    }

    Document {
        blocks: state.blocks,
    }
}

#[derive(Default)]
struct ParseState {
    // Finished top-level blocks
    blocks: Vec<Node>,
    // Open block containers (quotes, lists, items), innermost last
    frames: Vec<Frame>,

    // Current inline content being built
    spans: Vec<Span>,
    // Nested span buffers for formatting
    span_stack: Vec<Vec<Span>>,
    // Where the inline content of a tight list item began
    inline_start: Option<usize>,

    // Code block state
    in_code_block: bool,
    code_language: Option<String>,
    code_content: String,

    // Raw HTML block state
    in_html_block: bool,
    html_content: String,

    // Front matter is dropped
    in_metadata: bool,

    // Link destinations, innermost last
    link_urls: Vec<String>,
}

enum Frame {
    Quote {
        blocks: Vec<Node>,
    },
    List {
        ordered: bool,
        start: u64,
        items: Vec<ListItem>,
    },
    Item {
        blocks: Vec<Node>,
        checked: Option<bool>,
    },
}

impl ParseState {
    /// Attach a finished block to the innermost open container.
    fn push_block(&mut self, node: Node) {
        match self.frames.last_mut() {
            Some(Frame::Quote { blocks }) | Some(Frame::Item { blocks, .. }) => blocks.push(node),
            // Lists only ever receive items; a stray block lands at the top level
            Some(Frame::List { .. }) | None => self.blocks.push(node),
        }
    }

    /// Record the start of inline content that has no enclosing paragraph.
    fn note_inline(&mut self, range: &Range<usize>) {
        if self.inline_start.is_none() {
            self.inline_start = Some(range.start);
        }
    }

    /// Tight list items carry their text without a paragraph tag. Wrap any
    /// pending inline content into one before a block boundary.
    fn flush_loose_spans(&mut self, end: usize) {
        if self.spans.is_empty() || !self.span_stack.is_empty() {
            return;
        }
        if !matches!(self.frames.last(), Some(Frame::Item { .. })) {
            return;
        }
        let content = std::mem::take(&mut self.spans);
        let start = self.inline_start.take().unwrap_or(end).min(end);
        self.push_block(Node::new(Block::Paragraph { content }, start..end));
    }

    fn take_inline(&mut self) -> Vec<Span> {
        self.inline_start = None;
        std::mem::take(&mut self.spans)
    }

    fn open_span(&mut self) {
        self.span_stack.push(std::mem::take(&mut self.spans));
    }

    fn close_span(&mut self, wrap: impl FnOnce(Vec<Span>) -> Span) {
        let inner = std::mem::take(&mut self.spans);
        if let Some(mut parent) = self.span_stack.pop() {
            parent.push(wrap(inner));
            self.spans = parent;
        }
    }
}

fn process_event(event: Event, range: Range<usize>, state: &mut ParseState) {
    match event {
        // Headings
        Event::Start(Tag::Heading { .. }) => {
            state.flush_loose_spans(range.start);
            state.take_inline();
        }
        Event::End(TagEnd::Heading(level)) => {
            let content = state.take_inline();
            let level = heading_level_to_u8(level);
            state.push_block(Node::new(Block::Heading { level, content }, range));
        }

        // Paragraphs
        Event::Start(Tag::Paragraph) => {
            state.flush_loose_spans(range.start);
        }
        Event::End(TagEnd::Paragraph) => {
            let content = state.take_inline();
            if !content.is_empty() {
                state.push_block(Node::new(Block::Paragraph { content }, range));
            }
        }

        // Front matter
        Event::Start(Tag::MetadataBlock(_)) => state.in_metadata = true,
        Event::End(TagEnd::MetadataBlock(_)) => state.in_metadata = false,

        // Text content
        Event::Text(text) => {
            if state.in_metadata {
                return;
            }
            if state.in_code_block {
                state.code_content.push_str(&text);
            } else if state.in_html_block {
                state.html_content.push_str(&text);
            } else {
                state.note_inline(&range);
                state.spans.push(Span::Text(text.into_string()));
            }
        }

        // Inline code
        Event::Code(code) => {
            state.note_inline(&range);
            state.spans.push(Span::Code(code.into_string()));
        }

        // Bold
        Event::Start(Tag::Strong) => {
            state.note_inline(&range);
            state.open_span();
        }
        Event::End(TagEnd::Strong) => state.close_span(Span::Bold),

        // Italic
        Event::Start(Tag::Emphasis) => {
            state.note_inline(&range);
            state.open_span();
        }
        Event::End(TagEnd::Emphasis) => state.close_span(Span::Italic),

        // Strikethrough
        Event::Start(Tag::Strikethrough) => {
            state.note_inline(&range);
            state.open_span();
        }
        Event::End(TagEnd::Strikethrough) => state.close_span(Span::Strikethrough),

        // Links
        Event::Start(Tag::Link { dest_url, .. }) => {
            state.note_inline(&range);
            state.link_urls.push(dest_url.into_string());
            state.open_span();
        }
        Event::End(TagEnd::Link) => {
            let url = state.link_urls.pop().unwrap_or_default();
            state.close_span(|content| Span::Link { url, content });
        }

        // Images degrade to their alt text
        Event::Start(Tag::Image { .. }) => {
            state.note_inline(&range);
            state.open_span();
        }
        Event::End(TagEnd::Image) => {
            let alt = std::mem::take(&mut state.spans);
            if let Some(mut parent) = state.span_stack.pop() {
                parent.extend(alt);
                state.spans = parent;
            }
        }

        // Code blocks
        Event::Start(Tag::CodeBlock(kind)) => {
            state.flush_loose_spans(range.start);
            state.in_code_block = true;
            state.code_language = match kind {
                CodeBlockKind::Fenced(lang) => {
                    let lang = lang.into_string();
                    if lang.is_empty() { None } else { Some(lang) }
                }
                CodeBlockKind::Indented => None,
            };
            state.code_content.clear();
        }
        Event::End(TagEnd::CodeBlock) => {
            state.in_code_block = false;
            let content = std::mem::take(&mut state.code_content);
            let language = state.code_language.take();
            state.push_block(Node::new(Block::CodeBlock { language, content }, range));
        }

        // Raw HTML
        Event::Start(Tag::HtmlBlock) => {
            state.flush_loose_spans(range.start);
            state.in_html_block = true;
            state.html_content.clear();
        }
        Event::End(TagEnd::HtmlBlock) => {
            state.in_html_block = false;
            let content = std::mem::take(&mut state.html_content);
            state.push_block(Node::new(Block::Html { content }, range));
        }
        Event::Html(html) | Event::InlineHtml(html) => {
            if state.in_html_block {
                state.html_content.push_str(&html);
            } else {
                state.note_inline(&range);
                state.spans.push(Span::Text(html.into_string()));
            }
        }

        // Block quotes
        Event::Start(Tag::BlockQuote(_)) => {
            state.flush_loose_spans(range.start);
            state.frames.push(Frame::Quote { blocks: Vec::new() });
        }
        Event::End(TagEnd::BlockQuote(_)) => {
            if let Some(Frame::Quote { blocks }) = state.frames.pop() {
                state.push_block(Node::new(Block::BlockQuote { blocks }, range));
            }
        }

        // Lists
        Event::Start(Tag::List(first_number)) => {
            state.flush_loose_spans(range.start);
            state.frames.push(Frame::List {
                ordered: first_number.is_some(),
                start: first_number.unwrap_or(1),
                items: Vec::new(),
            });
        }
        Event::End(TagEnd::List(_)) => {
            if let Some(Frame::List {
                ordered,
                start,
                items,
            }) = state.frames.pop()
            {
                let list = List {
                    ordered,
                    start,
                    items,
                };
                state.push_block(Node::new(Block::List(list), range));
            }
        }

        Event::Start(Tag::Item) => {
            state.frames.push(Frame::Item {
                blocks: Vec::new(),
                checked: None,
            });
        }
        Event::End(TagEnd::Item) => {
            // Collect any remaining tight-item text
            state.flush_loose_spans(range.end);
            if let Some(Frame::Item { blocks, checked }) = state.frames.pop() {
                if let Some(Frame::List { items, .. }) = state.frames.last_mut() {
                    items.push(ListItem { blocks, checked });
                }
            }
        }

        // Task list checkboxes
        Event::TaskListMarker(checked) => {
            if let Some(Frame::Item { checked: slot, .. }) = state.frames.last_mut() {
                *slot = Some(checked);
            }
        }

        // Horizontal rule
        Event::Rule => {
            state.flush_loose_spans(range.start);
            state.push_block(Node::new(Block::Rule, range));
        }

        // Soft/hard breaks
        Event::SoftBreak => {
            state.note_inline(&range);
            state.spans.push(Span::SoftBreak);
        }
        Event::HardBreak => {
            state.note_inline(&range);
            state.spans.push(Span::LineBreak);
        }

        // Extensions that are never enabled still keep their text
        Event::FootnoteReference(text) | Event::InlineMath(text) | Event::DisplayMath(text) => {
            state.note_inline(&range);
            state.spans.push(Span::Text(text.into_string()));
        }

        // Containers for extensions we do not enable are transparent
        Event::Start(_) | Event::End(_) => {}
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
