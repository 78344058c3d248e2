use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::display_width::display_width;
use crate::graph_ast::*;

/// Distance between consecutive BFS layers. Odd levels are left free for edges.
pub const LEVEL_STEP: usize = 2;

/// Columns between a subgraph frame and its contents.
pub const FRAME_PAD_X: usize = 2;
/// Rows between a subgraph frame and its contents.
pub const FRAME_PAD_Y: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Columns between neighbouring nodes of one rank (TB/BT).
    pub node_gap: usize,
    /// Rows between ranks (TB/BT).
    pub rank_gap: usize,
    /// Minimum columns between ranks (LR/RL). Widened to fit edge labels.
    pub lr_rank_gap: usize,
    /// Rows between neighbouring nodes of one rank (LR/RL).
    pub lr_node_gap: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_gap: 3,
            rank_gap: 3,
            lr_rank_gap: 5,
            lr_node_gap: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLayout {
    pub id: String,
    pub level: usize,
    pub slot: usize,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl NodeLayout {
    pub fn center_x(&self) -> usize {
        self.x + self.width / 2
    }

    pub fn center_y(&self) -> usize {
        self.y + self.height / 2
    }
}

/// Positions computed for one graph view, keyed by node id. The graph itself
/// is never touched, so a layout can be recomputed at will.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphLayout {
    pub nodes: Vec<NodeLayout>,
    index: HashMap<String, usize>,
    pub direction: Direction,
    pub width: usize,
    pub height: usize,
}

impl GraphLayout {
    pub fn node(&self, id: &str) -> Option<&NodeLayout> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn level(&self, id: &str) -> Option<usize> {
        self.node(id).map(|n| n.level)
    }
}

/// Outer size of a node in cells, including its outline.
pub fn node_size(node: &Node) -> (usize, usize) {
    let text = display_width(node.display_label());
    match node.shape {
        NodeShape::Diamond | NodeShape::Circle => (text + 6, 5),
        NodeShape::DoubleCircle => (text + 8, 7),
        NodeShape::Hexagon => (text + 6, 3),
        _ => (text + 4, 3),
    }
}

/// BFS levels: 0 for roots, then +`LEVEL_STEP` per layer. Roots are nodes
/// without incoming edges, in declaration order; nodes still unreached
/// afterwards (cycles) start their own traversal. The first level given to a
/// node is kept.
pub fn assign_levels(view: &GraphView<'_>) -> HashMap<String, usize> {
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut has_incoming: HashSet<&str> = HashSet::new();
    for edge in &view.edges {
        outgoing
            .entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
        has_incoming.insert(edge.to.as_str());
    }

    let roots = view
        .nodes
        .iter()
        .filter(|n| !has_incoming.contains(n.id.as_str()));

    let mut levels = HashMap::new();
    for node in roots.chain(view.nodes.iter()) {
        if !levels.contains_key(&node.id) {
            visit_breadth_first(&node.id, &outgoing, &mut levels);
        }
    }

    debug!(
        nodes = levels.len(),
        max_level = levels.values().max().copied().unwrap_or(0),
        "levels assigned"
    );
    levels
}

fn visit_breadth_first(
    start: &str,
    outgoing: &HashMap<&str, Vec<&str>>,
    levels: &mut HashMap<String, usize>,
) {
    let mut queue = VecDeque::from([(start, 0)]);
    levels.insert(start.to_string(), 0);

    while let Some((id, level)) = queue.pop_front() {
        for &next in outgoing.get(id).into_iter().flatten() {
            if !levels.contains_key(next) {
                levels.insert(next.to_string(), level + LEVEL_STEP);
                queue.push_back((next, level + LEVEL_STEP));
            }
        }
    }
}

pub fn compute(view: &GraphView<'_>, config: &LayoutConfig) -> GraphLayout {
    let levels = assign_levels(view);
    let rank_count = levels
        .values()
        .max()
        .map_or(0, |&l| l / LEVEL_STEP + 1);

    let mut ranks_nodes: Vec<Vec<&Node>> = vec![Vec::new(); rank_count];
    for &node in &view.nodes {
        ranks_nodes[levels[&node.id] / LEVEL_STEP].push(node);
    }

    let frames = FrameGuide::new(&view.groups, &levels);
    let mut nodes = if view.direction.is_horizontal() {
        layout_columns(&ranks_nodes, &levels, &view.edges, &frames, config)
    } else {
        layout_rows(&ranks_nodes, &frames, config)
    };

    let width = nodes.iter().map(|n| n.x + n.width).max().unwrap_or(0);
    let height = nodes.iter().map(|n| n.y + n.height).max().unwrap_or(0);

    match view.direction {
        Direction::BottomUp => {
            for n in &mut nodes {
                n.y = height - n.y - n.height;
            }
        }
        Direction::RightLeft => {
            for n in &mut nodes {
                n.x = width - n.x - n.width;
            }
        }
        Direction::TopDown | Direction::LeftRight => {}
    }

    let index = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect();

    debug!(nodes = nodes.len(), ranks = rank_count, width, height, "layout computed");
    GraphLayout {
        nodes,
        index,
        direction: view.direction,
        width,
        height,
    }
}

/// Subgraph frames the renderer will draw around laid out nodes. A gap that
/// a frame border falls into grows by the frame padding, once per border.
struct FrameGuide<'v> {
    /// Members of each non-empty subgraph with its first and last rank.
    spans: Vec<(&'v HashSet<&'v str>, usize, usize)>,
}

impl<'v> FrameGuide<'v> {
    fn new(groups: &'v [HashSet<&'v str>], levels: &HashMap<String, usize>) -> Self {
        let spans = groups
            .iter()
            .filter_map(|members| {
                let ranks = members
                    .iter()
                    .filter_map(|&id| levels.get(id))
                    .map(|level| level / LEVEL_STEP);
                let (first, last) = ranks.fold(None, |acc: Option<(usize, usize)>, r| {
                    Some(acc.map_or((r, r), |(lo, hi)| (lo.min(r), hi.max(r))))
                })?;
                Some((members, first, last))
            })
            .collect();
        Self { spans }
    }

    fn count(&self, pred: impl Fn(&HashSet<&str>, usize, usize) -> bool) -> usize {
        self.spans
            .iter()
            .filter(|&&(members, first, last)| pred(members, first, last))
            .count()
    }

    /// Frame borders between `rank` and the rank after it: the deepest stack
    /// of frames closing below `upper` plus the deepest opening above `lower`.
    fn between_ranks(&self, rank: usize, upper: &[&Node], lower: &[&Node]) -> usize {
        let closing = upper
            .iter()
            .map(|n| self.count(|m, _, last| last == rank && m.contains(n.id.as_str())))
            .max()
            .unwrap_or(0);
        let opening = lower
            .iter()
            .map(|n| self.count(|m, first, _| first == rank + 1 && m.contains(n.id.as_str())))
            .max()
            .unwrap_or(0);
        closing + opening
    }

    /// Frame borders between two neighbours of one rank.
    fn between_neighbours(&self, a: &Node, b: &Node) -> usize {
        self.count(|m, _, _| m.contains(a.id.as_str()) != m.contains(b.id.as_str()))
    }

    /// Extra cells after each node of a rank, one entry per neighbour pair.
    fn neighbour_gaps(&self, rank: &[&Node], gap: usize, pad: usize) -> Vec<usize> {
        rank.windows(2)
            .map(|pair| gap + pad * self.between_neighbours(pair[0], pair[1]))
            .collect()
    }
}

/// One row per rank, each row centred on the widest.
fn layout_rows(
    ranks_nodes: &[Vec<&Node>],
    frames: &FrameGuide<'_>,
    config: &LayoutConfig,
) -> Vec<NodeLayout> {
    let gaps: Vec<Vec<usize>> = ranks_nodes
        .iter()
        .map(|rank| frames.neighbour_gaps(rank, config.node_gap, FRAME_PAD_X))
        .collect();
    let rank_widths: Vec<usize> = ranks_nodes
        .iter()
        .zip(&gaps)
        .map(|(rank, gaps)| rank.iter().map(|n| node_size(n).0).sum::<usize>() + gaps.iter().sum::<usize>())
        .collect();
    let max_width = rank_widths.iter().copied().max().unwrap_or(0);

    let mut layouts = Vec::new();
    let mut y = 0;
    for (rank, rank_nodes) in ranks_nodes.iter().enumerate() {
        let rank_height = rank_nodes.iter().map(|n| node_size(n).1).max().unwrap_or(0);
        let mut x = (max_width - rank_widths[rank]) / 2;

        for (slot, node) in rank_nodes.iter().enumerate() {
            let (w, h) = node_size(node);
            layouts.push(NodeLayout {
                id: node.id.clone(),
                level: rank * LEVEL_STEP,
                slot,
                x,
                y: y + (rank_height - h) / 2,
                width: w,
                height: h,
            });
            x += w + gaps[rank].get(slot).copied().unwrap_or(0);
        }

        let borders = ranks_nodes
            .get(rank + 1)
            .map_or(0, |lower| frames.between_ranks(rank, rank_nodes, lower));
        y += rank_height + config.rank_gap + FRAME_PAD_Y * borders;
    }

    layouts
}

/// One column per rank, each column centred on the tallest. The gap after a
/// column grows to fit the widest edge label crossing it.
fn layout_columns(
    ranks_nodes: &[Vec<&Node>],
    levels: &HashMap<String, usize>,
    edges: &[&Edge],
    frames: &FrameGuide<'_>,
    config: &LayoutConfig,
) -> Vec<NodeLayout> {
    let gaps: Vec<Vec<usize>> = ranks_nodes
        .iter()
        .map(|rank| frames.neighbour_gaps(rank, config.lr_node_gap, FRAME_PAD_Y))
        .collect();
    let column_heights: Vec<usize> = ranks_nodes
        .iter()
        .zip(&gaps)
        .map(|(rank, gaps)| rank.iter().map(|n| node_size(n).1).sum::<usize>() + gaps.iter().sum::<usize>())
        .collect();
    let max_height = column_heights.iter().copied().max().unwrap_or(0);

    let mut layouts = Vec::new();
    let mut rank_x = 0;
    for (rank, rank_nodes) in ranks_nodes.iter().enumerate() {
        let column_width = rank_nodes.iter().map(|n| node_size(n).0).max().unwrap_or(0);
        let mut y = (max_height - column_heights[rank]) / 2;

        for (slot, node) in rank_nodes.iter().enumerate() {
            let (w, h) = node_size(node);
            layouts.push(NodeLayout {
                id: node.id.clone(),
                level: rank * LEVEL_STEP,
                slot,
                x: rank_x + (column_width - w) / 2,
                y,
                width: w,
                height: h,
            });
            y += h + gaps[rank].get(slot).copied().unwrap_or(0);
        }

        let level = rank * LEVEL_STEP;
        let label_gap = edges
            .iter()
            .filter(|e| {
                let (from, to) = (levels.get(&e.from), levels.get(&e.to));
                (from == Some(&level) && to == Some(&(level + LEVEL_STEP)))
                    || (to == Some(&level) && from == Some(&(level + LEVEL_STEP)))
            })
            .filter_map(|e| e.line.label().map(|l| display_width(l) + 2))
            .max()
            .unwrap_or(0);
        let borders = ranks_nodes
            .get(rank + 1)
            .map_or(0, |next| frames.between_ranks(rank, rank_nodes, next));
        rank_x += column_width + config.lr_rank_gap.max(label_gap) + FRAME_PAD_X * borders;
    }

    layouts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_parser::parse_graph;
    use pretty_assertions::assert_eq;

    fn layout_of(input: &str) -> GraphLayout {
        let diagram = parse_graph(input).unwrap();
        compute(&diagram.view(diagram.roots()[0]), &LayoutConfig::default())
    }

    fn levels_of(input: &str) -> HashMap<String, usize> {
        let diagram = parse_graph(input).unwrap();
        assign_levels(&diagram.view(diagram.roots()[0]))
    }

    #[test]
    fn level_linear_chain() {
        let levels = levels_of("graph TD\n    A --> B\n    B --> C\n");
        assert_eq!(levels["A"], 0);
        assert_eq!(levels["B"], 2);
        assert_eq!(levels["C"], 4);
    }

    #[test]
    fn level_fan_out() {
        let levels = levels_of("graph TD\n    A --> B\n    A --> C\n");
        assert_eq!(levels["A"], 0);
        assert_eq!(levels["B"], 2);
        assert_eq!(levels["C"], 2);
    }

    #[test]
    fn level_fan_in() {
        let levels = levels_of("graph TD\n    A --> C\n    B --> C\n");
        assert_eq!(levels["A"], 0);
        assert_eq!(levels["B"], 0);
        assert_eq!(levels["C"], 2);
    }

    #[test]
    fn level_first_discovery_wins() {
        // A's traversal reaches D first; B's shorter path is ignored.
        let levels = levels_of("graph TD\n    A --> X --> Y --> D\n    B --> D\n");
        assert_eq!(levels["D"], 6);
        assert_eq!(levels["B"], 0);
    }

    #[test]
    fn level_cycle_without_root() {
        let levels = levels_of("graph TD\n    A --> B\n    B --> A\n");
        assert_eq!(levels["A"], 0);
        assert_eq!(levels["B"], 2);
    }

    #[test]
    fn level_isolated_nodes() {
        let levels = levels_of("graph TD\n    A\n    B\n");
        assert_eq!(levels["A"], 0);
        assert_eq!(levels["B"], 0);
    }

    #[test]
    fn layout_side_table() {
        let layout = layout_of("graph TD\n    A[Start] --> B[Process]\n    B --> C{Decision}\n");
        assert!(layout.level("A") < layout.level("B"));
        assert!(layout.level("B") < layout.level("C"));
        assert_eq!(layout.level("missing"), None);
        assert_eq!(layout.node("C").unwrap().slot, 0);
    }

    #[test]
    fn layout_td_two_nodes() {
        let layout = layout_of("graph TD\n    A[Start] --> B[End]\n");

        let a = layout.node("A").unwrap();
        let b = layout.node("B").unwrap();
        assert_eq!((a.x, a.y, a.width, a.height), (0, 0, 9, 3));
        assert_eq!((b.x, b.y, b.width, b.height), (1, 6, 7, 3));
        assert_eq!(a.center_x(), b.center_x(), "linear chain should be centred");
        assert_eq!((layout.width, layout.height), (9, 9));
    }

    #[test]
    fn layout_td_fan_out_side_by_side() {
        let layout = layout_of("graph TD\n    A --> B\n    A --> C\n");

        let a = layout.node("A").unwrap();
        let b = layout.node("B").unwrap();
        let c = layout.node("C").unwrap();
        assert_eq!(b.y, c.y, "B and C on same rank");
        assert!(b.y > a.y, "children below parent");
        assert!(b.x + b.width < c.x, "B left of C");
        assert_eq!((b.slot, c.slot), (0, 1));
    }

    #[test]
    fn layout_lr_two_nodes() {
        let layout = layout_of("graph LR\n    A --> B\n");

        let a = layout.node("A").unwrap();
        let b = layout.node("B").unwrap();
        assert_eq!((a.x, a.y), (0, 0));
        assert_eq!((b.x, b.y), (10, 0));
    }

    #[test]
    fn layout_lr_gap_fits_label() {
        let layout = layout_of("graph LR\n    A -->|a long label| B\n");

        let a = layout.node("A").unwrap();
        let b = layout.node("B").unwrap();
        assert_eq!(b.x - (a.x + a.width), "a long label".len() + 2);
    }

    #[test]
    fn layout_bt_mirrors_td() {
        let layout = layout_of("graph BT\n    A --> B\n");

        let a = layout.node("A").unwrap();
        let b = layout.node("B").unwrap();
        assert!(b.y < a.y, "B above A in BT");
        assert_eq!(b.y, 0);
        assert_eq!(a.y + a.height, layout.height);
    }

    #[test]
    fn layout_rl_mirrors_lr() {
        let layout = layout_of("graph RL\n    A --> B\n");

        let a = layout.node("A").unwrap();
        let b = layout.node("B").unwrap();
        assert!(b.x < a.x, "B left of A in RL");
        assert_eq!(b.x, 0);
    }

    #[test]
    fn layout_shape_sizes() {
        let layout = layout_of("graph TD\n    A[Hello]\n    B{Hello}\n    C((Hello))\n    D(((Hello)))\n    E{{Hello}}\n");
        let size = |id: &str| {
            let n = layout.node(id).unwrap();
            (n.width, n.height)
        };
        assert_eq!(size("A"), (9, 3));
        assert_eq!(size("B"), (11, 5));
        assert_eq!(size("C"), (11, 5));
        assert_eq!(size("D"), (13, 7));
        assert_eq!(size("E"), (11, 3));
    }

    #[test]
    fn layout_mixed_heights_centre_in_rank() {
        let layout = layout_of("graph TD\n    A[x] & B{y}\n");
        let a = layout.node("A").unwrap();
        let b = layout.node("B").unwrap();
        assert_eq!(a.center_y(), b.center_y());
    }

    #[test]
    fn layout_wide_label_uses_columns() {
        let layout = layout_of("graph TD\n    A[开始]\n");
        assert_eq!(layout.node("A").unwrap().width, 8);
    }

    #[test]
    fn layout_includes_subgraph_nodes() {
        let layout = layout_of("graph TD\n    subgraph s\n        A --> B\n    end\n    B --> C\n");
        assert_eq!(layout.nodes.len(), 3);
        assert_eq!(layout.level("C"), Some(4));
    }

    #[test]
    fn layout_leaves_room_below_closing_frame() {
        let layout = layout_of("graph TD\n    subgraph s\n        A --> B\n    end\n    B --> C\n");
        assert_eq!(layout.node("B").unwrap().y, 6);
        assert_eq!(layout.node("C").unwrap().y, 13);
    }

    #[test]
    fn layout_nested_frames_stack_their_borders() {
        let layout = layout_of(
            "graph TD\n    subgraph a\n        subgraph b\n            X\n        end\n    end\n    X --> Y\n",
        );
        assert_eq!(layout.node("Y").unwrap().y, 3 + 3 + 2 * FRAME_PAD_Y);
    }

    #[test]
    fn layout_widens_gap_beside_frame() {
        let layout = layout_of("graph TD\n    A & B\n    subgraph s\n        B\n    end\n");
        let a = layout.node("A").unwrap();
        let b = layout.node("B").unwrap();
        assert_eq!(b.x, a.width + 3 + FRAME_PAD_X);
    }

    #[test]
    fn layout_lr_frame_widens_rank_gap() {
        let layout = layout_of("graph LR\n    subgraph s\n        A\n    end\n    A --> B\n");
        let a = layout.node("A").unwrap();
        let b = layout.node("B").unwrap();
        assert_eq!(b.x, a.width + 5 + FRAME_PAD_X);
    }

    #[test]
    fn layout_is_repeatable() {
        let diagram = parse_graph("graph TD\n    A --> B\n    A --> C\n    C --> D\n").unwrap();
        let view = diagram.view(diagram.roots()[0]);
        let config = LayoutConfig::default();
        assert_eq!(compute(&view, &config), compute(&view, &config));
    }

    #[test]
    fn layout_empty_graph() {
        let layout = layout_of("graph TD\n");
        assert!(layout.nodes.is_empty());
        assert_eq!((layout.width, layout.height), (0, 0));
    }
}
