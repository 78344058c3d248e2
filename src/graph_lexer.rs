use std::ops::Range;

use winnow::combinator::{alt, opt};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    LineStyle,
    Graph,
    Subgraph,
    End,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LCurly,
    RCurly,
    /// `|`
    Label,
    /// `&`
    And,
    /// `<`
    Left,
    /// `>`
    Right,
    Slash,
    Backslash,
}

impl TokenKind {
    fn punctuator(s: &str) -> Option<TokenKind> {
        let kind = match s {
            "(" => TokenKind::LParen,
            ")" => TokenKind::RParen,
            "[" => TokenKind::LBracket,
            "]" => TokenKind::RBracket,
            "{" => TokenKind::LCurly,
            "}" => TokenKind::RCurly,
            "|" => TokenKind::Label,
            "&" => TokenKind::And,
            "<" => TokenKind::Left,
            ">" => TokenKind::Right,
            "/" => TokenKind::Slash,
            "\\" => TokenKind::Backslash,
            _ => return None,
        };
        Some(kind)
    }

    fn keyword(s: &str) -> Option<TokenKind> {
        match s {
            "graph" | "flowchart" => Some(TokenKind::Graph),
            "subgraph" => Some(TokenKind::Subgraph),
            "end" => Some(TokenKind::End),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub content: String,
    pub kind: TokenKind,
    /// Byte range of the token inside the line it was lexed from.
    pub span: Range<usize>,
}

const PUNCTUATORS: [char; 12] = ['[', ']', '(', ')', '{', '}', '|', '&', '<', '>', '/', '\\'];
const LINE_CHARS: [char; 3] = ['-', '.', '='];
const END_MARKERS: [char; 4] = ['o', 'x', '<', '>'];

/// Split one source line into tokens. Never fails: input that matches no
/// rule is skipped one character at a time.
pub fn tokenize(line: &str) -> Vec<Token> {
    let mut input = line;
    let mut tokens = Vec::new();

    loop {
        input = input.trim_start();
        if input.is_empty() {
            break;
        }
        let start = line.len() - input.len();
        match token.parse_next(&mut input) {
            Ok((kind, content)) => tokens.push(Token {
                content: content.to_string(),
                kind,
                span: start..start + content.len(),
            }),
            Err(_) => {
                let mut chars = input.chars();
                chars.next();
                input = chars.as_str();
            }
        }
    }

    tokens
}

fn token<'s>(input: &mut &'s str) -> winnow::Result<(TokenKind, &'s str)> {
    alt((
        style_run.map(|run| (TokenKind::LineStyle, run)),
        punctuator,
        word.map(|w| (TokenKind::keyword(w).unwrap_or(TokenKind::Text), w)),
    ))
    .parse_next(input)
}

/// `[o x < >]? [- . =]+ [o x < >]?`, e.g. `-->`, `<-.->`, `==o`.
fn style_run<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    (
        opt(one_of(END_MARKERS)),
        take_while(1.., LINE_CHARS),
        opt(one_of(END_MARKERS)),
    )
        .take()
        .parse_next(input)
}

fn punctuator<'s>(input: &mut &'s str) -> winnow::Result<(TokenKind, &'s str)> {
    one_of(PUNCTUATORS)
        .take()
        .verify_map(|s: &'s str| TokenKind::punctuator(s).map(|kind| (kind, s)))
        .parse_next(input)
}

fn word<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| {
        !c.is_whitespace() && !PUNCTUATORS.contains(&c) && !LINE_CHARS.contains(&c)
    })
    .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(line: &str) -> Vec<TokenKind> {
        tokenize(line).into_iter().map(|t| t.kind).collect()
    }

    fn contents(line: &str) -> Vec<String> {
        tokenize(line).into_iter().map(|t| t.content).collect()
    }

    #[test]
    fn lex_simple_edge() {
        assert_eq!(
            kinds("A --> B"),
            vec![TokenKind::Text, TokenKind::LineStyle, TokenKind::Text]
        );
        assert_eq!(contents("A --> B"), vec!["A", "-->", "B"]);
    }

    #[test]
    fn lex_edge_without_spaces() {
        assert_eq!(contents("A-->B"), vec!["A", "-->", "B"]);
    }

    #[test]
    fn lex_style_runs_keep_exact_text() {
        assert_eq!(contents("<-.->"), vec!["<-.->"]);
        assert_eq!(contents("==o"), vec!["==o"]);
        assert_eq!(contents("x--x"), vec!["x--x"]);
        assert_eq!(kinds("<-.->"), vec![TokenKind::LineStyle]);
    }

    #[test]
    fn lex_punctuators() {
        assert_eq!(
            kinds("[ ] ( ) { } | & < > / \\"),
            vec![
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LCurly,
                TokenKind::RCurly,
                TokenKind::Label,
                TokenKind::And,
                TokenKind::Left,
                TokenKind::Right,
                TokenKind::Slash,
                TokenKind::Backslash,
            ]
        );
    }

    #[test]
    fn lex_lone_marker_is_not_a_style_run() {
        assert_eq!(kinds("<"), vec![TokenKind::Left]);
        assert_eq!(kinds("one"), vec![TokenKind::Text]);
        assert_eq!(contents("box"), vec!["box"]);
    }

    #[test]
    fn lex_keywords() {
        assert_eq!(
            kinds("graph flowchart subgraph end"),
            vec![
                TokenKind::Graph,
                TokenKind::Graph,
                TokenKind::Subgraph,
                TokenKind::End
            ]
        );
    }

    #[test]
    fn lex_keyword_inside_statement_is_still_keyword() {
        assert_eq!(
            kinds("A --> end"),
            vec![TokenKind::Text, TokenKind::LineStyle, TokenKind::End]
        );
    }

    #[test]
    fn lex_keyword_prefix_is_text() {
        assert_eq!(kinds("ending"), vec![TokenKind::Text]);
    }

    #[test]
    fn lex_node_shapes() {
        assert_eq!(contents("A((Circle))"), vec!["A", "(", "(", "Circle", ")", ")"]);
        assert_eq!(contents("B[/lean/]"), vec!["B", "[", "/", "lean", "/", "]"]);
        assert_eq!(contents("C>flag]"), vec!["C", ">", "flag", "]"]);
    }

    #[test]
    fn lex_hang_off_label() {
        assert_eq!(
            kinds("A -->|yes| B"),
            vec![
                TokenKind::Text,
                TokenKind::LineStyle,
                TokenKind::Label,
                TokenKind::Text,
                TokenKind::Label,
                TokenKind::Text,
            ]
        );
    }

    #[test]
    fn lex_spans_index_into_line() {
        let line = "Start[开始] --> B";
        let tokens = tokenize(line);
        for t in &tokens {
            assert_eq!(&line[t.span.clone()], t.content);
        }
        assert_eq!(tokens[2].content, "开始");
    }

    #[test]
    fn lex_dot_inside_text_splits() {
        assert_eq!(contents("v1.2"), vec!["v1", ".", "2"]);
    }

    #[test]
    fn lex_empty_line() {
        assert!(tokenize("   ").is_empty());
    }
}
