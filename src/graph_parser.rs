use tracing::debug;

use crate::error::{ParseError, SyntaxErrorKind};
use crate::graph_ast::*;
use crate::graph_lexer::{Token, TokenKind, tokenize};

type LineResult<T> = Result<T, SyntaxErrorKind>;

/// Parse a whole document. Any syntax error rejects the document.
pub fn parse_graph(input: &str) -> Result<Diagram, ParseError> {
    let mut parser = Parser::default();
    parser.parse(input)?;
    Ok(parser.finish())
}

/// Line-oriented parser. `graph_stack` holds the current nesting, root first;
/// nodes and edges always go to its top.
#[derive(Debug, Default)]
pub struct Parser {
    diagram: Diagram,
    graph_stack: Vec<GraphId>,
}

impl Parser {
    pub fn parse(&mut self, input: &str) -> Result<(), ParseError> {
        for (i, raw) in input.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with("%%") {
                continue;
            }

            let tokens = tokenize(line);
            if tokens.is_empty() {
                continue;
            }

            let mut cursor = TokenCursor::new(line, &tokens);
            self.parse_line(&mut cursor).map_err(|kind| ParseError {
                line_no: i + 1,
                line: line.to_string(),
                context: cursor.context(),
                kind,
            })?;
        }

        if self.graph_stack.len() > 1 {
            debug!(open = self.graph_stack.len() - 1, "input ended inside a subgraph");
        }
        Ok(())
    }

    pub fn finish(self) -> Diagram {
        self.diagram
    }

    /// Current nesting depth; 1 while inside a root graph only.
    pub fn depth(&self) -> usize {
        self.graph_stack.len()
    }

    pub fn graph_roots(&self) -> &[GraphId] {
        self.diagram.roots()
    }

    fn parse_line(&mut self, cur: &mut TokenCursor<'_>) -> LineResult<()> {
        match cur.peek_kind() {
            Some(TokenKind::Graph) => {
                cur.advance();
                self.start_root(cur)
            }
            Some(TokenKind::Subgraph) => {
                cur.advance();
                self.push_subgraph(cur)
            }
            Some(TokenKind::End) => {
                cur.advance();
                self.pop_subgraph()
            }
            _ => self.parse_statement(cur),
        }
    }

    fn start_root(&mut self, cur: &mut TokenCursor<'_>) -> LineResult<()> {
        let direction = match cur.peek() {
            None => Direction::default(),
            Some(tok) => match Direction::from_keyword(&tok.content) {
                Some(dir) if tok.kind == TokenKind::Text => {
                    cur.advance();
                    dir
                }
                _ => return Err(SyntaxErrorKind::UnknownDirection(tok.content.clone())),
            },
        };

        let root = self.diagram.add_root(direction);
        self.graph_stack.clear();
        self.graph_stack.push(root);
        debug!(?direction, roots = self.diagram.roots().len(), "graph");
        Ok(())
    }

    fn push_subgraph(&mut self, cur: &mut TokenCursor<'_>) -> LineResult<()> {
        let parent = self.top()?;

        let start = cur.position();
        let id = cur
            .eat(TokenKind::Text)
            .map(|t| t.content.clone())
            .unwrap_or_default();
        let label = if cur.eat(TokenKind::LBracket).is_some() {
            let label = cur.label_until(|k| k == TokenKind::RBracket);
            cur.eat(TokenKind::RBracket);
            label.unwrap_or_else(|| id.clone())
        } else {
            cur.slice_from(start).unwrap_or_default()
        };

        let child = self.diagram.add_subgraph(parent, id, label);
        self.graph_stack.push(child);
        debug!(depth = self.graph_stack.len(), "subgraph");
        Ok(())
    }

    fn pop_subgraph(&mut self) -> LineResult<()> {
        if self.graph_stack.len() <= 1 {
            return Err(SyntaxErrorKind::UnmatchedEnd);
        }
        self.graph_stack.pop();
        Ok(())
    }

    fn top(&self) -> LineResult<GraphId> {
        self.graph_stack
            .last()
            .copied()
            .ok_or(SyntaxErrorKind::MissingGraph)
    }

    fn add_nodes(&mut self, nodes: &[Node]) -> LineResult<()> {
        let top = self.top()?;
        let graph = self.diagram.graph_mut(top);
        for node in nodes {
            graph.add_node(node.clone());
        }
        Ok(())
    }

    /// `NodeList (Edge NodeList)*`
    fn parse_statement(&mut self, cur: &mut TokenCursor<'_>) -> LineResult<()> {
        let mut sources = parse_node_list(cur)?;
        if sources.is_empty() {
            debug!(context = %cur.context(), "line does not start with a node, skipped");
            return Ok(());
        }
        self.add_nodes(&sources)?;

        while let Some(line) = parse_edge(cur)? {
            let targets = parse_node_list(cur)?;
            if targets.is_empty() {
                break;
            }
            self.add_nodes(&targets)?;

            let top = self.top()?;
            let graph = self.diagram.graph_mut(top);
            for src in &sources {
                for dst in &targets {
                    graph.add_edge(Edge {
                        from: src.id.clone(),
                        to: dst.id.clone(),
                        line: line.clone(),
                    });
                }
            }
            sources = targets;
        }

        if !cur.is_at_end() {
            debug!(context = %cur.context(), "trailing tokens ignored");
        }
        Ok(())
    }
}

/// Bounds-checked access to one line's tokens.
pub struct TokenCursor<'a> {
    line: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(line: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            line,
            tokens,
            pos: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_kind(&self) -> Option<TokenKind> {
        self.peek_kind_at(0)
    }

    pub fn peek_kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    pub fn advance(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    /// Consume the next token if it has the given kind.
    pub fn eat(&mut self, kind: TokenKind) -> Option<&'a Token> {
        if self.peek_kind() == Some(kind) {
            self.advance()
        } else {
            None
        }
    }

    pub fn expect(
        &mut self,
        kind: TokenKind,
        err: impl FnOnce() -> SyntaxErrorKind,
    ) -> LineResult<&'a Token> {
        self.eat(kind).ok_or_else(err)
    }

    /// Consume tokens up to (not including) the first one `stop` accepts and
    /// return the source text they cover. `None` if nothing was consumed.
    pub fn label_until(&mut self, stop: impl Fn(TokenKind) -> bool) -> Option<String> {
        let start = self.pos;
        while let Some(kind) = self.peek_kind() {
            if stop(kind) {
                break;
            }
            self.pos += 1;
        }
        self.text_between(start, self.pos)
    }

    /// Source text from token `start` to the end of the line.
    fn slice_from(&self, start: usize) -> Option<String> {
        self.text_between(start, self.tokens.len())
    }

    fn text_between(&self, start: usize, end: usize) -> Option<String> {
        if start >= end {
            return None;
        }
        let from = self.tokens[start].span.start;
        let to = self.tokens[end - 1].span.end;
        Some(unquote(self.line[from..to].trim()).to_string())
    }

    /// A few tokens around the current position, for error messages.
    pub fn context(&self) -> String {
        let from = self.pos.saturating_sub(1);
        let to = (self.pos + 3).min(self.tokens.len());
        if from >= to {
            return "end of line".to_string();
        }
        self.tokens[from..to]
            .iter()
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

/// `Node ('&' Node)*`
fn parse_node_list(cur: &mut TokenCursor<'_>) -> LineResult<Vec<Node>> {
    let mut nodes = Vec::new();
    while let Some(node) = parse_node(cur)? {
        nodes.push(node);
        if cur.eat(TokenKind::And).is_none() {
            break;
        }
    }
    Ok(nodes)
}

fn parse_node(cur: &mut TokenCursor<'_>) -> LineResult<Option<Node>> {
    let Some(id_tok) = cur.eat(TokenKind::Text) else {
        return Ok(None);
    };
    let id = id_tok.content.as_str();

    let node = match cur.peek_kind() {
        Some(TokenKind::LParen) => parse_paren_shape(cur, id)?,
        Some(TokenKind::LBracket) => parse_bracket_shape(cur, id)?,
        Some(TokenKind::LCurly) => parse_curly_shape(cur, id)?,
        Some(TokenKind::Left) => {
            cur.advance();
            parse_delimited(cur, id, TokenKind::Right, NodeShape::AsymmetricLeft, "`>`")?
        }
        Some(TokenKind::Right) => {
            cur.advance();
            parse_delimited(cur, id, TokenKind::RBracket, NodeShape::AsymmetricRight, "`]`")?
        }
        _ => Node::new(id, "", NodeShape::Rect),
    };
    Ok(Some(node))
}

fn invalid(id: &str, expected: &'static str) -> SyntaxErrorKind {
    SyntaxErrorKind::InvalidShape {
        node: id.to_string(),
        expected,
    }
}

fn required_label(
    cur: &mut TokenCursor<'_>,
    id: &str,
    stop: impl Fn(TokenKind) -> bool,
) -> LineResult<String> {
    cur.label_until(stop).ok_or_else(|| invalid(id, "a label"))
}

/// Label up to the `close` that is not matched by an `open` inside it, so
/// `A(f(x))` keeps `f(x)` whole.
fn nested_label(
    cur: &mut TokenCursor<'_>,
    id: &str,
    open: TokenKind,
    close: TokenKind,
) -> LineResult<String> {
    let start = cur.position();
    let mut nesting = 0usize;
    while let Some(kind) = cur.peek_kind() {
        if kind == close {
            if nesting == 0 {
                break;
            }
            nesting -= 1;
        } else if kind == open {
            nesting += 1;
        }
        cur.advance();
    }
    cur.text_between(start, cur.position())
        .ok_or_else(|| invalid(id, "a label"))
}

/// `(label)`, `((label))`, `(((label)))`
fn parse_paren_shape(cur: &mut TokenCursor<'_>, id: &str) -> LineResult<Node> {
    let mut depth = 0;
    while cur.eat(TokenKind::LParen).is_some() {
        depth += 1;
    }
    let shape = match depth {
        1 => NodeShape::Round,
        2 => NodeShape::Circle,
        3 => NodeShape::DoubleCircle,
        _ => return Err(invalid(id, "one to three `(`")),
    };

    let label = nested_label(cur, id, TokenKind::LParen, TokenKind::RParen)?;
    for _ in 0..depth {
        cur.expect(TokenKind::RParen, || invalid(id, "matching `)`"))?;
    }
    Ok(Node::new(id, label, shape))
}

/// `{label}`, `{{label}}`
fn parse_curly_shape(cur: &mut TokenCursor<'_>, id: &str) -> LineResult<Node> {
    let mut depth = 0;
    while cur.eat(TokenKind::LCurly).is_some() {
        depth += 1;
    }
    let shape = match depth {
        1 => NodeShape::Diamond,
        2 => NodeShape::Hexagon,
        _ => return Err(invalid(id, "one or two `{`")),
    };

    let label = nested_label(cur, id, TokenKind::LCurly, TokenKind::RCurly)?;
    for _ in 0..depth {
        cur.expect(TokenKind::RCurly, || invalid(id, "matching `}`"))?;
    }
    Ok(Node::new(id, label, shape))
}

/// `[label]`, `[/label/]`, `[\label\]`, `[/label\]`, `[\label/]`, `[label>`, `[label<`
fn parse_bracket_shape(cur: &mut TokenCursor<'_>, id: &str) -> LineResult<Node> {
    cur.advance();
    let lead = slant(cur.peek_kind());
    if lead.is_some() {
        cur.advance();
    }

    let start = cur.position();
    while let Some(kind) = cur.peek_kind() {
        if matches!(kind, TokenKind::RBracket | TokenKind::Right | TokenKind::Left) {
            break;
        }
        cur.advance();
    }
    let end = cur.position();
    let closer = cur.advance().map(|t| t.kind);

    let trail = if closer == Some(TokenKind::RBracket) && end > start {
        slant(cur.tokens.get(end - 1).map(|t| t.kind))
    } else {
        None
    };
    let label_end = if trail.is_some() { end - 1 } else { end };
    let label = cur
        .text_between(start, label_end)
        .ok_or_else(|| invalid(id, "a label"))?;

    let shape = match (closer, lead, trail) {
        (Some(TokenKind::RBracket), None, None) => NodeShape::Rect,
        (Some(TokenKind::RBracket), Some(Slant::Forward), Some(Slant::Forward)) => {
            NodeShape::LeftParallelogram
        }
        (Some(TokenKind::RBracket), Some(Slant::Back), Some(Slant::Back)) => {
            NodeShape::RightParallelogram
        }
        (Some(TokenKind::RBracket), Some(Slant::Forward), Some(Slant::Back)) => {
            NodeShape::TrapezoidA
        }
        (Some(TokenKind::RBracket), Some(Slant::Back), Some(Slant::Forward)) => {
            NodeShape::TrapezoidB
        }
        (Some(TokenKind::RBracket), _, _) => {
            return Err(invalid(id, "matching `/` or `\\` on both sides"));
        }
        (Some(TokenKind::Right), None, _) => NodeShape::AsymmetricRight,
        (Some(TokenKind::Left), None, _) => NodeShape::AsymmetricLeft,
        (Some(_), Some(_), _) => return Err(invalid(id, "`]` after a slanted side")),
        _ => return Err(invalid(id, "`]`, `>` or `<`")),
    };
    Ok(Node::new(id, label, shape))
}

/// Body of `<label>` and `>label]`; the opening token is already consumed.
fn parse_delimited(
    cur: &mut TokenCursor<'_>,
    id: &str,
    closer: TokenKind,
    shape: NodeShape,
    expected: &'static str,
) -> LineResult<Node> {
    let label = required_label(cur, id, |k| k == closer)?;
    cur.expect(closer, || invalid(id, expected))?;
    Ok(Node::new(id, label, shape))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slant {
    Forward,
    Back,
}

fn slant(kind: Option<TokenKind>) -> Option<Slant> {
    match kind {
        Some(TokenKind::Slash) => Some(Slant::Forward),
        Some(TokenKind::Backslash) => Some(Slant::Back),
        _ => None,
    }
}

/// `STYLE (TEXT+ STYLE)? ('|' TEXT* '|')?`
fn parse_edge(cur: &mut TokenCursor<'_>) -> LineResult<Option<Line>> {
    let Some(style) = cur.eat(TokenKind::LineStyle) else {
        return Ok(None);
    };

    let mut inline_label = String::new();
    if is_open_link(&style.content) {
        let start = cur.position();
        let mut n = 0;
        while cur.peek_kind_at(n) == Some(TokenKind::Text) {
            n += 1;
        }
        if n > 0 && cur.peek_kind_at(n) == Some(TokenKind::LineStyle) {
            inline_label = cur.text_between(start, start + n).unwrap_or_default();
            for _ in 0..=n {
                cur.advance();
            }
        }
    }

    let mut hangoff_label = String::new();
    if cur.eat(TokenKind::Label).is_some() {
        hangoff_label = cur
            .label_until(|k| k == TokenKind::Label)
            .unwrap_or_default();
        cur.expect(TokenKind::Label, || SyntaxErrorKind::UnclosedEdgeLabel)?;
    }

    Ok(Some(Line::from_style(
        &style.content,
        &inline_label,
        &hangoff_label,
    )))
}

/// Opening half of `A -- text --> B`: two line characters, optionally led by
/// a marker, with nothing trailing.
fn is_open_link(style: &str) -> bool {
    let body = style.trim_start_matches(['<', 'o', 'x']);
    body.chars().count() == 2 && body.chars().all(|c| matches!(c, '-' | '.' | '='))
}
