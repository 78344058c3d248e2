pub mod canvas;
pub mod collision;
pub mod display_width;
pub mod error;
pub mod graph_ast;
pub mod graph_layout;
pub mod graph_lexer;
pub mod graph_parser;
pub mod graph_renderer;

pub use error::{Error, ParseError, SyntaxErrorKind};
pub use graph_layout::LayoutConfig;
pub use graph_renderer::{Placement, RenderOptions};

pub fn render(input: &str) -> Result<String, Error> {
    render_with_options(input, &RenderOptions::default())
}

pub fn render_with_options(input: &str, options: &RenderOptions) -> Result<String, Error> {
    let first_word = input
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("%%"))
        .and_then(|l| l.split_whitespace().next());

    match first_word {
        Some("graph" | "flowchart") => {
            let diagram = graph_parser::parse_graph(input)?;
            Ok(graph_renderer::render(&diagram, options))
        }
        other => Err(Error::UnknownDiagram(
            other.unwrap_or("(empty)").to_string(),
        )),
    }
}
