use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::canvas::AsciiCanvas;
use crate::collision::{CollisionResolver, Rectangle};
use crate::display_width::{center_offset, display_width};
use crate::graph_ast::*;
use crate::graph_layout::{self, GraphLayout, LayoutConfig};

/// How layout positions are turned into final rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Keep the layout and push apart anything too close.
    #[default]
    Relax,
    /// Ignore the layout and fill a square grid in declaration order.
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub layout: LayoutConfig,
    pub placement: Placement,
    /// Minimum empty cells between two nodes after placement.
    pub min_spacing: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            placement: Placement::default(),
            min_spacing: 1,
        }
    }
}

const FRAME_PAD_X: i32 = graph_layout::FRAME_PAD_X as i32;
const FRAME_PAD_Y: i32 = graph_layout::FRAME_PAD_Y as i32;

/// A subgraph border: `bounds.owner_id` is the subgraph id.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame {
    bounds: Rectangle,
    title: String,
}

/// Render every root graph, separated by a blank line.
pub fn render(diagram: &Diagram, options: &RenderOptions) -> String {
    diagram
        .roots()
        .iter()
        .map(|&root| render_graph(diagram, root, options))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render one root graph together with its subgraphs.
pub fn render_graph(diagram: &Diagram, root: GraphId, options: &RenderOptions) -> String {
    let view = diagram.view(root);
    let layout = graph_layout::compute(&view, &options.layout);

    let mut rects: HashMap<String, Rectangle> = place(&layout, options)
        .into_iter()
        .map(|r| (r.owner_id.clone(), r))
        .collect();
    let mut frames = Vec::new();
    collect_frames(diagram, root, &rects, &mut frames);

    // Frames may reach above or left of the origin.
    let min_x = rects.values().chain(frames.iter().map(|f| &f.bounds)).map(|r| r.x).min().unwrap_or(0);
    let min_y = rects.values().chain(frames.iter().map(|f| &f.bounds)).map(|r| r.y).min().unwrap_or(0);
    for r in rects.values_mut().chain(frames.iter_mut().map(|f| &mut f.bounds)) {
        r.x -= min_x;
        r.y -= min_y;
    }

    let right = rects.values().chain(frames.iter().map(|f| &f.bounds)).map(Rectangle::right).max().unwrap_or(0);
    let bottom = rects.values().chain(frames.iter().map(|f| &f.bounds)).map(Rectangle::bottom).max().unwrap_or(0);
    let label_room = view
        .edges
        .iter()
        .filter_map(|e| e.line.label())
        .map(|l| display_width(l) as i32)
        .max()
        .unwrap_or(0);

    let mut canvas = AsciiCanvas::new((right + label_room + 3) as usize, (bottom + 1) as usize);

    for frame in frames.iter().rev() {
        draw_frame(&mut canvas, frame);
    }
    let routes = route_edges(&view.edges, &rects);
    for (edge, route) in &routes {
        draw_edge(&mut canvas, route, &edge.line);
    }
    // Heads go on last so a later line never hides an earlier arrow.
    for (edge, route) in &routes {
        draw_end(&mut canvas, route.end, edge.line.dst_end, route.end_head);
        draw_end(&mut canvas, route.start, edge.line.src_end, route.start_head);
    }
    for node in &view.nodes {
        if let Some(rect) = rects.get(&node.id) {
            draw_node(&mut canvas, node, rect);
        }
    }

    debug!(nodes = rects.len(), edges = view.edges.len(), frames = frames.len(), "graph rendered");
    finish(&canvas)
}

fn place(layout: &GraphLayout, options: &RenderOptions) -> Vec<Rectangle> {
    let rects: Vec<Rectangle> = layout
        .nodes
        .iter()
        .map(|n| Rectangle::new(n.id.clone(), n.x as i32, n.y as i32, n.width as i32, n.height as i32))
        .collect();
    let spacing = options.min_spacing as i32;

    match options.placement {
        Placement::Relax => {
            let slack = spacing * rects.len() as i32;
            CollisionResolver::new(layout.width as i32 + slack, layout.height as i32 + slack, spacing)
                .resolve(&rects)
        }
        Placement::Grid => {
            let (cols, rows) = CollisionResolver::grid_shape(rects.len());
            let cell_width =
                rects.iter().map(|r| r.width).max().unwrap_or(0) + options.layout.node_gap as i32;
            let cell_height =
                rects.iter().map(|r| r.height).max().unwrap_or(0) + options.layout.rank_gap as i32;
            CollisionResolver::new(cell_width * cols as i32, cell_height * rows as i32, spacing)
                .arrange_in_grid(&rects)
        }
    }
}

/// Frames for every subgraph below `id` that contains a placed node,
/// pushed children first. Returns the area covered by `id`'s own content.
fn collect_frames(
    diagram: &Diagram,
    id: GraphId,
    rects: &HashMap<String, Rectangle>,
    frames: &mut Vec<Frame>,
) -> Option<Rectangle> {
    let graph = diagram.graph(id);
    let mut bounds: Option<Rectangle> = None;
    for node in graph.nodes() {
        if let Some(r) = rects.get(&node.id) {
            bounds = Some(union(bounds, r));
        }
    }
    for &child in &graph.children {
        if let Some(r) = collect_frames(diagram, child, rects, frames) {
            bounds = Some(union(bounds, &r));
        }
    }

    if graph.parent.is_none() {
        return bounds;
    }
    let inner = bounds?;
    let title = if graph.label.is_empty() {
        graph.id.clone()
    } else {
        graph.label.clone()
    };
    let width = (inner.width + 2 * FRAME_PAD_X).max(display_width(&title) as i32 + 6);
    let frame = Rectangle::new(
        graph.id.clone(),
        inner.x - FRAME_PAD_X,
        inner.y - FRAME_PAD_Y,
        width,
        inner.height + 2 * FRAME_PAD_Y,
    );
    frames.push(Frame {
        bounds: frame.clone(),
        title,
    });
    Some(frame)
}

fn union(acc: Option<Rectangle>, r: &Rectangle) -> Rectangle {
    let Some(a) = acc else {
        return r.clone();
    };
    let (x, y) = (a.x.min(r.x), a.y.min(r.y));
    let (right, bottom) = (a.right().max(r.right()), a.bottom().max(r.bottom()));
    Rectangle::new(a.owner_id, x, y, right - x, bottom - y)
}

fn draw_frame(canvas: &mut AsciiCanvas, frame: &Frame) {
    let b = &frame.bounds;
    canvas.draw_box(b.x, b.y, b.width, b.height, "");
    if !frame.title.is_empty() {
        canvas.write_text(b.x + 2, b.y, &format!(" {} ", frame.title));
    }
}

/// Side of the source box an edge leaves from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Down,
    Up,
    Right,
    Left,
}

impl Side {
    fn head(self) -> char {
        match self {
            Side::Down => 'v',
            Side::Up => '^',
            Side::Right => '>',
            Side::Left => '<',
        }
    }

    fn reverse(self) -> Side {
        match self {
            Side::Down => Side::Up,
            Side::Up => Side::Down,
            Side::Right => Side::Left,
            Side::Left => Side::Right,
        }
    }

    fn is_horizontal(self) -> bool {
        matches!(self, Side::Right | Side::Left)
    }
}

/// Where an edge leaves and enters, and which way each end points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Route {
    start: (i32, i32),
    end: (i32, i32),
    start_head: Side,
    end_head: Side,
    /// Edge from a node back to itself.
    looped: bool,
}

impl Route {
    fn straight(side: Side, start: (i32, i32), end: (i32, i32)) -> Self {
        Route {
            start,
            end,
            start_head: side.reverse(),
            end_head: side,
            looped: false,
        }
    }

    /// Small loop hanging off the bottom-right corner of `r`: it leaves
    /// below the corner and comes back into the right side on the last
    /// border row, clear of the cells straight edges attach to.
    fn self_loop(r: &Rectangle) -> Self {
        Route {
            start: (r.right() - 1, r.bottom()),
            end: (r.right(), r.bottom() - 1),
            start_head: Side::Up,
            end_head: Side::Left,
            looped: true,
        }
    }
}

/// Route every edge between placed nodes. When both directions of a pair
/// exist, the first one declared takes the lane left of (or above) the
/// centre and the second the lane right of (or below) it.
fn route_edges<'e>(
    edges: &[&'e Edge],
    rects: &HashMap<String, Rectangle>,
) -> Vec<(&'e Edge, Route)> {
    let pairs: HashSet<(&str, &str)> = edges
        .iter()
        .map(|e| (e.from.as_str(), e.to.as_str()))
        .collect();
    let mut routed: HashSet<(&str, &str)> = HashSet::new();

    let mut routes = Vec::new();
    for &edge in edges {
        let (Some(from), Some(to)) = (rects.get(&edge.from), rects.get(&edge.to)) else {
            continue;
        };
        if edge.from == edge.to {
            routes.push((edge, Route::self_loop(from)));
            continue;
        }

        let reverse = (edge.to.as_str(), edge.from.as_str());
        let lane = if routed.contains(&reverse) {
            1
        } else if pairs.contains(&reverse) {
            -1
        } else {
            0
        };
        routed.insert((edge.from.as_str(), edge.to.as_str()));

        match anchors(from, to, lane) {
            Some(route) => routes.push((edge, route)),
            None => debug!(from = %edge.from, to = %edge.to, "no room for edge, skipped"),
        }
    }
    routes
}

/// First free cell outside each box, facing the other box and shifted
/// toward it so siblings do not share a start cell. `lane` moves both ends
/// sideways to keep two opposite edges apart. `None` when the boxes leave
/// no room for a line between them.
fn anchors(a: &Rectangle, b: &Rectangle, lane: i32) -> Option<Route> {
    if b.y > a.bottom() {
        let (x1, x2) = (inner_x(a, b.center_x() + lane), inner_x(b, a.center_x() + lane));
        Some(Route::straight(Side::Down, (x1, a.bottom()), (x2, b.y - 1)))
    } else if a.y > b.bottom() {
        let (x1, x2) = (inner_x(a, b.center_x() + lane), inner_x(b, a.center_x() + lane));
        Some(Route::straight(Side::Up, (x1, a.y - 1), (x2, b.bottom())))
    } else if b.x > a.right() {
        let (y1, y2) = (inner_y(a, b.center_y() + lane), inner_y(b, a.center_y() + lane));
        Some(Route::straight(Side::Right, (a.right(), y1), (b.x - 1, y2)))
    } else if a.x > b.right() {
        let (y1, y2) = (inner_y(a, b.center_y() + lane), inner_y(b, a.center_y() + lane));
        Some(Route::straight(Side::Left, (a.x - 1, y1), (b.right(), y2)))
    } else {
        None
    }
}

/// Column strictly inside `r`'s border closest to `x`.
fn inner_x(r: &Rectangle, x: i32) -> i32 {
    x.min(r.right() - 2).max(r.x + 1)
}

/// Row strictly inside `r`'s border closest to `y`.
fn inner_y(r: &Rectangle, y: i32) -> i32 {
    y.min(r.bottom() - 2).max(r.y + 1)
}

/// Stroke for a styled line; `None` lets the canvas pick by slope.
fn stroke(kind: LineKind, dx: i32) -> Option<char> {
    let steep = dx.abs() < 2;
    match kind {
        LineKind::Solid => None,
        LineKind::Dashed => Some(if steep { ':' } else { '.' }),
        LineKind::Bold => Some(if steep { '#' } else { '=' }),
    }
}

fn draw_end(canvas: &mut AsciiCanvas, (x, y): (i32, i32), end: EdgeEnd, side: Side) {
    match end {
        EdgeEnd::None => {}
        EdgeEnd::Arrow => canvas.set(x, y, side.head()),
        EdgeEnd::Circle => canvas.set(x, y, 'o'),
        EdgeEnd::Cross => canvas.set(x, y, 'x'),
    }
}

/// Line and label of one edge; ends are drawn separately.
fn draw_edge(canvas: &mut AsciiCanvas, route: &Route, line: &Line) {
    let ((x1, y1), (x2, y2)) = (route.start, route.end);
    if route.looped {
        draw_loop(canvas, route, line.kind);
        if let Some(label) = line.label() {
            canvas.write_text(x2 + 3, y2, label);
        }
        return;
    }

    canvas.draw_line(x1, y1, x2, y2, stroke(line.kind, x2 - x1));
    if let Some(label) = line.label() {
        let my = (y1 + y2) / 2;
        if route.end_head.is_horizontal() {
            let span = (x2 - x1).abs() + 1;
            let x = x1.min(x2) + (span - display_width(label) as i32) / 2;
            canvas.write_text(x, my - 1, label);
        } else {
            canvas.write_text((x1 + x2) / 2 + 2, my, label);
        }
    }
}

/// ```text
/// +---+
/// | A |
/// +---+<+
///     +-+
/// ```
fn draw_loop(canvas: &mut AsciiCanvas, route: &Route, kind: LineKind) {
    let ((sx, sy), (ex, ey)) = (route.start, route.end);
    let dash = stroke(kind, 2).unwrap_or('-');
    canvas.set(sx, sy, '+');
    canvas.set(ex, sy, dash);
    canvas.set(ex + 1, sy, '+');
    canvas.set(ex + 1, ey, '+');
    canvas.set(ex, ey, dash);
}

fn draw_node(canvas: &mut AsciiCanvas, node: &Node, r: &Rectangle) {
    let label = node.display_label();
    let (right, bottom) = (r.right() - 1, r.bottom() - 1);
    let (cx, cy) = (r.center_x(), r.center_y());

    canvas.clear_rect(r.x, r.y, r.width, r.height);
    match node.shape {
        NodeShape::Rect => {
            canvas.draw_box(r.x, r.y, r.width, r.height, label);
        }
        NodeShape::Round => {
            canvas.draw_box(r.x, r.y, r.width, r.height, label);
            canvas.set(r.x, r.y, '/');
            canvas.set(right, r.y, '\\');
            canvas.set(r.x, bottom, '\\');
            canvas.set(right, bottom, '/');
        }
        NodeShape::AsymmetricLeft => {
            canvas.draw_box(r.x, r.y, r.width, r.height, label);
            canvas.set(r.x, cy, '<');
        }
        NodeShape::AsymmetricRight => {
            canvas.draw_box(r.x, r.y, r.width, r.height, label);
            canvas.set(right, cy, '>');
        }
        NodeShape::LeftParallelogram
        | NodeShape::RightParallelogram
        | NodeShape::TrapezoidA
        | NodeShape::TrapezoidB => {
            let (left_side, right_side) = match node.shape {
                NodeShape::LeftParallelogram => ('/', '/'),
                NodeShape::RightParallelogram => ('\\', '\\'),
                NodeShape::TrapezoidA => ('/', '\\'),
                _ => ('\\', '/'),
            };
            canvas.draw_box(r.x, r.y, r.width, r.height, label);
            for row in r.y..=bottom {
                canvas.set(r.x, row, left_side);
                canvas.set(right, row, right_side);
            }
        }
        NodeShape::Hexagon => {
            canvas.draw_box(r.x + 1, r.y, r.width - 2, r.height, "");
            canvas.set(r.x + 1, r.y, '/');
            canvas.set(right - 1, r.y, '\\');
            canvas.set(r.x + 1, bottom, '\\');
            canvas.set(right - 1, bottom, '/');
            for row in r.y + 1..bottom {
                canvas.set(r.x + 1, row, ' ');
                canvas.set(right - 1, row, ' ');
                canvas.set(r.x, row, '<');
                canvas.set(right, row, '>');
            }
        }
        NodeShape::Diamond => canvas.draw_diamond(cx, cy, r.width - 1, r.height - 1),
        NodeShape::Circle => canvas.draw_circle(cx, cy, (r.width - 1) / 2, (r.height - 1) / 2),
        NodeShape::DoubleCircle => {
            let (rx, ry) = ((r.width - 1) / 2, (r.height - 1) / 2);
            canvas.draw_circle(cx, cy, rx, ry);
            canvas.draw_circle(cx, cy, rx - 2, ry - 1);
        }
    }

    let text_x = r.x + center_offset(r.width as usize, label) as i32;
    canvas.write_text(text_x, cy, label);
}

/// Canvas text with trailing spaces and trailing blank rows removed.
fn finish(canvas: &AsciiCanvas) -> String {
    let text = canvas.to_string();
    let mut lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
