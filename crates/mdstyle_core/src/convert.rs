use tracing::{debug, trace};

use crate::block::{Block, Document, List, ListItem, Node, Span};
use crate::config::{Element, PreparedConfig, ResolvedStyle};
use crate::error::{Error, Result};
use crate::runs::{self, Mark, MarkKind};
use crate::styled::{BlockKind, Color, InlineStyle, Presentation, StyledBlock};

/// Payload of a thematic break when `horizontal_rule.prefix` is unset.
const RULE_TEXT: &str = "———";

/// Convert a parsed document into styled blocks.
///
/// `source` must be the text `document` was parsed from. The result either
/// satisfies every output invariant or the call fails; nothing partial is
/// returned.
pub fn convert(
    document: &Document,
    source: &str,
    config: &PreparedConfig,
) -> Result<Vec<StyledBlock>> {
    let mut converter = Converter::new(config, source);
    for node in &document.blocks {
        let first = converter.out.len();
        converter.node(node)?;
        if let Err(message) = validate(&converter.out[first..]) {
            return Err(Error::Conversion {
                line: line_of(source, node.span.start),
                message,
            });
        }
    }
    debug!(blocks = converter.out.len(), "converted document");
    Ok(converter.out)
}

/// Check the output contract: one trailing newline per block, runs inside
/// the visible text, sorted and disjoint.
pub fn validate(blocks: &[StyledBlock]) -> std::result::Result<(), String> {
    for (index, block) in blocks.iter().enumerate() {
        let Some(content) = block.text.strip_suffix('\n') else {
            return Err(format!("block {index} does not end with a newline"));
        };
        if content.contains('\n') {
            return Err(format!("block {index} contains an embedded newline"));
        }
        if block.is_margin() && !(content.is_empty() && block.inline_styles.is_empty()) {
            return Err(format!("margin block {index} carries content"));
        }
        let len = content.chars().count();
        let mut previous_end = 0;
        for style in &block.inline_styles {
            if style.start > style.end || style.end > len {
                return Err(format!(
                    "inline style {}..{} of block {index} exceeds its {len} runes",
                    style.start, style.end
                ));
            }
            if style.start < previous_end {
                return Err(format!(
                    "inline style {}..{} of block {index} overlaps its predecessor",
                    style.start, style.end
                ));
            }
            previous_end = style.end;
        }
    }
    Ok(())
}

/// 1-based line of a byte offset.
fn line_of(source: &str, offset: usize) -> usize {
    let end = offset.min(source.len());
    source.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

/// One output line under construction, positions in runes.
#[derive(Debug, Default)]
struct Line {
    text: String,
    len: usize,
    marks: Vec<Mark>,
}

impl Line {
    fn plain(text: &str) -> Self {
        let mut line = Line::default();
        line.push(text);
        line
    }

    fn push(&mut self, text: &str) {
        for c in text.chars() {
            // Newlines never survive inside a line
            self.text.push(if c == '\n' { ' ' } else { c });
            self.len += 1;
        }
    }
}

/// Flattens inline spans into lines, cutting at hard breaks when asked to.
struct Flattener {
    lines: Vec<Line>,
    current: Line,
    open: Vec<(MarkKind, usize)>,
    split_lines: bool,
}

impl Flattener {
    fn flatten(spans: &[Span], split_lines: bool) -> Vec<Line> {
        let mut flattener = Flattener {
            lines: Vec::new(),
            current: Line::default(),
            open: Vec::new(),
            split_lines,
        };
        flattener.spans(spans);
        flattener.finish()
    }

    fn spans(&mut self, spans: &[Span]) {
        for span in spans {
            match span {
                Span::Text(text) => self.current.push(text),
                Span::Bold(inner) => self.marked(MarkKind::Bold, inner),
                Span::Italic(inner) => self.marked(MarkKind::Italic, inner),
                Span::Strikethrough(inner) => self.marked(MarkKind::Strikethrough, inner),
                Span::Code(code) => {
                    let start = self.current.len;
                    self.current.push(code);
                    self.close(MarkKind::Code, start);
                }
                Span::Link { url, content } => {
                    self.marked(MarkKind::Link, content);
                    if !url.is_empty() {
                        self.current.push(" (");
                        self.current.push(url);
                        self.current.push(")");
                    }
                }
                Span::SoftBreak => self.current.push(" "),
                Span::LineBreak if self.split_lines => self.break_line(),
                Span::LineBreak => self.current.push(" "),
            }
        }
    }

    fn marked(&mut self, kind: MarkKind, inner: &[Span]) {
        self.open.push((kind, self.current.len));
        self.spans(inner);
        if let Some((kind, start)) = self.open.pop() {
            self.close(kind, start);
        }
    }

    fn close(&mut self, kind: MarkKind, start: usize) {
        let end = self.current.len;
        if start < end {
            self.current.marks.push(Mark { start, end, kind });
        }
    }

    /// End the current line. Marks still open continue on the next one.
    fn break_line(&mut self) {
        let open = std::mem::take(&mut self.open);
        for &(kind, start) in &open {
            self.close(kind, start);
        }
        self.open = open.into_iter().map(|(kind, _)| (kind, 0)).collect();
        self.lines.push(std::mem::take(&mut self.current));
    }

    fn finish(mut self) -> Vec<Line> {
        // A break right before the end leaves nothing worth a block
        if self.lines.is_empty() || self.current.len > 0 {
            self.lines.push(self.current);
        }
        self.lines
    }
}

fn code_lines(content: &str) -> Vec<Line> {
    let body = content.strip_suffix('\n').unwrap_or(content);
    body.split('\n')
        .map(|line| Line::plain(line.strip_suffix('\r').unwrap_or(line)))
        .collect()
}

fn level_u8(level: usize) -> u8 {
    u8::try_from(level).unwrap_or(u8::MAX)
}

struct Converter<'a> {
    config: &'a PreparedConfig,
    source: &'a str,
    out: Vec<StyledBlock>,
    /// Color of the enclosing quote, which tints prose inside it.
    quote_color: Option<Color>,
}

impl<'a> Converter<'a> {
    fn new(config: &'a PreparedConfig, source: &'a str) -> Self {
        Self {
            config,
            source,
            out: Vec::new(),
            quote_color: None,
        }
    }

    /// A converter for content that will be re-prefixed by the caller.
    fn nested(&self) -> Converter<'a> {
        Converter {
            config: self.config,
            source: self.source,
            out: Vec::new(),
            quote_color: self.quote_color,
        }
    }

    fn style(&self, element: Element) -> &'a ResolvedStyle {
        self.config.style(element)
    }

    fn check_span(&self, node: &Node) -> Result<()> {
        let span = &node.span;
        let valid = span.start <= span.end
            && self.source.is_char_boundary(span.start)
            && self.source.is_char_boundary(span.end);
        if valid {
            Ok(())
        } else {
            Err(Error::Conversion {
                line: line_of(self.source, span.start),
                message: format!(
                    "block spans bytes {}..{} but the source has {}",
                    span.start,
                    span.end,
                    self.source.len()
                ),
            })
        }
    }

    fn push(&mut self, block: StyledBlock) {
        trace!(kind = ?block.kind, text = block.content(), "emitted block");
        self.out.push(block);
    }

    /// Top margins never precede the first block.
    fn margin_top(&mut self, size: f64) {
        if size > 0.0 && !self.out.is_empty() {
            self.push(StyledBlock::margin(size));
        }
    }

    fn margin_bottom(&mut self, size: f64) {
        if size > 0.0 {
            self.push(StyledBlock::margin(size));
        }
    }

    /// Base color for prose, which a surrounding quote replaces.
    fn prose_base(&self, style: &ResolvedStyle) -> Presentation {
        Presentation {
            color: self.quote_color.or(style.presentation.color),
            ..Presentation::default()
        }
    }

    fn line_block(
        &self,
        kind: BlockKind,
        style: &ResolvedStyle,
        base: &Presentation,
        level: Option<u8>,
        prefix: &str,
        line: Line,
    ) -> StyledBlock {
        let offset = prefix.chars().count();
        let inline_styles = runs::resolve_marks(line.len, base, &line.marks, self.config)
            .into_iter()
            .map(|style| style.shifted(offset))
            .collect();
        StyledBlock {
            kind,
            text: format!("{prefix}{}\n", line.text),
            font: style.presentation.font.clone(),
            size: style.presentation.size,
            level,
            inline_styles,
        }
    }

    fn node(&mut self, node: &Node) -> Result<()> {
        self.check_span(node)?;
        match &node.block {
            Block::Heading { level, content } => self.heading(*level, content),
            Block::Paragraph { content } => self.paragraph(content),
            Block::CodeBlock { content, .. } => self.code_block(content),
            Block::BlockQuote { blocks } => self.block_quote(blocks)?,
            Block::List(list) => self.list(list, 0)?,
            Block::Html { content } => self.html(content),
            Block::Rule => self.rule(),
        }
        Ok(())
    }

    fn heading(&mut self, level: u8, content: &[Span]) {
        let style = self.style(Element::heading(level));
        let base = self.prose_base(style);
        self.margin_top(style.margin_top);
        // Headings stay on one line; hard breaks flatten to spaces
        for line in Flattener::flatten(content, false) {
            let block = self.line_block(
                BlockKind::Heading,
                style,
                &base,
                Some(level.clamp(1, 6)),
                "",
                line,
            );
            self.push(block);
        }
        self.margin_bottom(style.margin_bottom);
    }

    fn paragraph(&mut self, content: &[Span]) {
        let style = self.style(Element::Paragraph);
        let base = self.prose_base(style);
        self.margin_top(style.margin_top);
        for line in Flattener::flatten(content, true) {
            let block = self.line_block(BlockKind::Paragraph, style, &base, None, "", line);
            self.push(block);
        }
        self.margin_bottom(style.margin_bottom);
    }

    fn html(&mut self, content: &str) {
        let lines: Vec<&str> = content
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !line.trim().is_empty())
            .collect();
        if lines.is_empty() {
            return;
        }
        let style = self.style(Element::Paragraph);
        let base = self.prose_base(style);
        self.margin_top(style.margin_top);
        for text in lines {
            let block =
                self.line_block(BlockKind::Paragraph, style, &base, None, "", Line::plain(text));
            self.push(block);
        }
        self.margin_bottom(style.margin_bottom);
    }

    fn code_block(&mut self, content: &str) {
        let style = self.style(Element::CodeBlock);
        let base = style.presentation.color_only();
        self.margin_top(style.margin_top);
        for line in code_lines(content) {
            let block =
                self.line_block(BlockKind::CodeBlock, style, &base, None, &style.prefix, line);
            self.push(block);
        }
        self.margin_bottom(style.margin_bottom);
    }

    fn rule(&mut self) {
        let style = self.style(Element::HorizontalRule);
        let base = style.presentation.color_only();
        let payload = if style.prefix.is_empty() {
            RULE_TEXT
        } else {
            style.prefix.as_str()
        };
        self.margin_top(style.margin_top);
        let block = self.line_block(
            BlockKind::HorizontalRule,
            style,
            &base,
            None,
            "",
            Line::plain(payload),
        );
        self.push(block);
        self.margin_bottom(style.margin_bottom);
    }

    fn block_quote(&mut self, blocks: &[Node]) -> Result<()> {
        let style = self.style(Element::Blockquote);

        let mut inner = self.nested();
        inner.quote_color = style.presentation.color.or(self.quote_color);
        for node in blocks {
            inner.node(node)?;
        }

        self.margin_top(style.margin_top);
        let mut emitted = false;
        let mut separate = false;
        for block in inner.out {
            if block.is_margin() {
                separate = emitted;
                continue;
            }
            if separate {
                let spacer = self.requote(style, &StyledBlock::margin(0.0));
                self.push(spacer);
                separate = false;
            }
            let quoted = self.requote(style, &block);
            self.push(quoted);
            emitted = true;
        }
        if !emitted {
            let empty = self.requote(style, &StyledBlock::margin(0.0));
            self.push(empty);
        }
        self.margin_bottom(style.margin_bottom);
        Ok(())
    }

    /// Re-emit an inner block as a quote line.
    fn requote(&self, style: &ResolvedStyle, block: &StyledBlock) -> StyledBlock {
        let quote = &style.presentation;
        let len = block.content_len();
        let offset = style.prefix.chars().count();

        // What the inner block set at paragraph level now has to be a run
        let carried = Presentation {
            font: block.font.clone().filter(|f| quote.font.as_ref() != Some(f)),
            size: block.size.filter(|s| quote.size != Some(*s)),
            color: None,
        };
        let mut layers = vec![(0..len, quote.color_only()), (0..len, carried)];
        if block.is_margin() {
            layers.clear();
        }
        layers.extend(
            block
                .inline_styles
                .iter()
                .map(|style| (style.start..style.end, style.presentation())),
        );

        StyledBlock {
            kind: BlockKind::Blockquote,
            text: format!("{}{}", style.prefix, block.text),
            font: quote.font.clone(),
            size: quote.size,
            level: None,
            inline_styles: runs::overlay(len, &layers)
                .into_iter()
                .map(|style| style.shifted(offset))
                .collect(),
        }
    }

    fn list(&mut self, list: &List, level: usize) -> Result<()> {
        let outermost = level == 0;
        let list_style = self.style(Element::List);
        if outermost {
            self.margin_top(list_style.margin_top);
        }

        let bullet = &self.style(Element::ListItem).prefix;
        let mut number = list.start;
        for item in &list.items {
            let marker = match (list.ordered, item.checked) {
                (true, Some(true)) => format!("{number}. ☑"),
                (true, Some(false)) => format!("{number}. ☐"),
                (true, None) => format!("{number}."),
                (false, Some(true)) => "☑".to_string(),
                (false, Some(false)) => "☐".to_string(),
                (false, None) => bullet.clone(),
            };
            self.list_item(item, level, &marker)?;
            number = number.saturating_add(1);
        }

        if outermost {
            self.margin_bottom(list_style.margin_bottom);
        }
        Ok(())
    }

    fn list_item(&mut self, item: &ListItem, level: usize, marker: &str) -> Result<()> {
        let style = self.style(Element::ListItem);
        let base = self.prose_base(style);
        let indent = self.style(Element::List).prefix.repeat(level);
        let (lead, continuation) = if marker.is_empty() {
            (indent.clone(), indent)
        } else {
            let pad = " ".repeat(marker.chars().count() + 1);
            (format!("{indent}{marker} "), format!("{indent}{pad}"))
        };
        let depth = Some(level_u8(level));

        let mut first = true;
        for child in &item.blocks {
            self.check_span(child)?;
            match &child.block {
                Block::Paragraph { content } => {
                    for line in Flattener::flatten(content, true) {
                        let prefix = if first { &lead } else { &continuation };
                        let block =
                            self.line_block(BlockKind::ListItem, style, &base, depth, prefix, line);
                        self.push(block);
                        first = false;
                    }
                }
                Block::List(nested) => {
                    if first {
                        let block = self.line_block(
                            BlockKind::ListItem,
                            style,
                            &base,
                            depth,
                            &lead,
                            Line::default(),
                        );
                        self.push(block);
                        first = false;
                    }
                    self.list(nested, level + 1)?;
                }
                _ => {
                    let mut inner = self.nested();
                    inner.node(child)?;
                    for block in inner.out.into_iter().filter(|b| !b.is_margin()) {
                        let prefix = if first { &lead } else { &continuation };
                        self.push(indented(prefix, block));
                        first = false;
                    }
                }
            }
        }

        if first {
            let block =
                self.line_block(BlockKind::ListItem, style, &base, depth, &lead, Line::default());
            self.push(block);
        }
        Ok(())
    }
}

/// Prepend `prefix` to a finished block, moving its runs along.
fn indented(prefix: &str, block: StyledBlock) -> StyledBlock {
    let offset = prefix.chars().count();
    StyledBlock {
        text: format!("{prefix}{}", block.text),
        inline_styles: block
            .inline_styles
            .iter()
            .map(|style: &InlineStyle| style.shifted(offset))
            .collect(),
        ..block
    }
}
