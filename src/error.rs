//! Error types for parsing and rendering.
//!
//! Only parsing can fail. Layout, collision resolution and drawing degrade
//! gracefully instead of returning errors.

/// What went wrong on a single source line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxErrorKind {
    #[error("invalid shape for node `{node}`: expected {expected}")]
    InvalidShape { node: String, expected: &'static str },
    #[error("`end` without a matching `subgraph`")]
    UnmatchedEnd,
    #[error("edge label is missing its closing `|`")]
    UnclosedEdgeLabel,
    #[error("unknown graph direction `{0}`")]
    UnknownDirection(String),
    #[error("statement appears before any `graph` declaration")]
    MissingGraph,
}

/// A fatal parse failure. The whole document is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("syntax error on line {line_no}: {kind} (in `{line}`, near `{context}`)")]
pub struct ParseError {
    /// 1-based line number in the source document.
    pub line_no: usize,
    /// The trimmed source line.
    pub line: String,
    /// Tokens around the failure point.
    pub context: String,
    pub kind: SyntaxErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("unknown diagram type: {0}")]
    UnknownDiagram(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_mentions_line_and_context() {
        let err = ParseError {
            line_no: 3,
            line: "A(((( x ))))".to_string(),
            context: "( ( ( (".to_string(),
            kind: SyntaxErrorKind::InvalidShape {
                node: "A".to_string(),
                expected: "one to three `(`",
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("line 3"), "got: {msg}");
        assert!(msg.contains("`A`"), "got: {msg}");
        assert!(msg.contains("A(((( x ))))"), "got: {msg}");
    }

    #[test]
    fn error_is_transparent_over_parse_error() {
        let err: Error = ParseError {
            line_no: 1,
            line: "end".to_string(),
            context: "end".to_string(),
            kind: SyntaxErrorKind::UnmatchedEnd,
        }
        .into();
        assert!(err.to_string().starts_with("syntax error on line 1"));
    }
}
