use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    TopDown,
    BottomUp,
    LeftRight,
    RightLeft,
}

impl Direction {
    pub fn from_keyword(s: &str) -> Option<Direction> {
        match s {
            "TB" | "TD" => Some(Direction::TopDown),
            "BT" => Some(Direction::BottomUp),
            "LR" => Some(Direction::LeftRight),
            "RL" => Some(Direction::RightLeft),
            _ => None,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftRight | Direction::RightLeft)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    Rect,
    Round,
    Circle,
    DoubleCircle,
    Diamond,
    Hexagon,
    AsymmetricLeft,
    AsymmetricRight,
    LeftParallelogram,
    RightParallelogram,
    TrapezoidA,
    TrapezoidB,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Solid,
    Dashed,
    Bold,
}

/// Decoration at one end of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEnd {
    None,
    Arrow,
    Circle,
    Cross,
}

impl EdgeEnd {
    fn from_marker(marker: Option<char>, arrow: char) -> EdgeEnd {
        match marker {
            Some(c) if c == arrow => EdgeEnd::Arrow,
            Some('o') => EdgeEnd::Circle,
            Some('x') => EdgeEnd::Cross,
            _ => EdgeEnd::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    pub src_end: EdgeEnd,
    pub dst_end: EdgeEnd,
    /// `A -- label --> B`
    pub inline_label: String,
    /// `A -->|label| B`
    pub hangoff_label: String,
    /// Style run length without `<` / `>` markers.
    pub length: usize,
}

impl Line {
    pub fn from_style(style: &str, inline_label: &str, hangoff_label: &str) -> Line {
        let kind = if style.contains('=') {
            LineKind::Bold
        } else if style.contains('.') {
            LineKind::Dashed
        } else {
            LineKind::Solid
        };

        let first = style.chars().next().filter(|c| !is_line_char(*c));
        let last = if style.chars().count() > 1 {
            style.chars().last().filter(|c| !is_line_char(*c))
        } else {
            None
        };
        let src_end = EdgeEnd::from_marker(first, '<');
        let dst_end = EdgeEnd::from_marker(last, '>');

        let length = style.chars().count()
            - usize::from(src_end == EdgeEnd::Arrow)
            - usize::from(dst_end == EdgeEnd::Arrow);

        Line {
            kind,
            src_end,
            dst_end,
            inline_label: inline_label.to_string(),
            hangoff_label: hangoff_label.to_string(),
            length,
        }
    }

    pub fn src_arrow(&self) -> bool {
        self.src_end == EdgeEnd::Arrow
    }

    pub fn dst_arrow(&self) -> bool {
        self.dst_end == EdgeEnd::Arrow
    }

    /// The label to draw: the hang-off label when present, else the inline one.
    pub fn label(&self) -> Option<&str> {
        [self.hangoff_label.as_str(), self.inline_label.as_str()]
            .into_iter()
            .find(|l| !l.is_empty())
    }
}

fn is_line_char(c: char) -> bool {
    matches!(c, '-' | '.' | '=')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub shape: NodeShape,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>, shape: NodeShape) -> Node {
        Node {
            id: id.into(),
            label: label.into(),
            shape,
        }
    }

    /// Text drawn inside the node: the label, or the id for bare nodes.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub line: Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphId(usize);

#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub id: String,
    pub label: String,
    pub parent: Option<GraphId>,
    pub children: Vec<GraphId>,
    pub direction: Direction,
    nodes: Vec<Node>,
    node_index: HashMap<String, usize>,
    edges: Vec<Edge>,
    edge_index: HashSet<(String, String)>,
}

impl Graph {
    pub fn new(id: impl Into<String>, direction: Direction) -> Graph {
        Graph {
            id: id.into(),
            direction,
            ..Graph::default()
        }
    }

    /// Register a node. Returns `false` when the id was already known; the
    /// stored node only changes if it had no label and `node` brings one.
    pub fn add_node(&mut self, node: Node) -> bool {
        if let Some(&i) = self.node_index.get(&node.id) {
            let existing = &mut self.nodes[i];
            if existing.label.is_empty() && !node.label.is_empty() {
                existing.label = node.label;
                existing.shape = node.shape;
            }
            return false;
        }
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    /// Register an edge. A second edge between the same ordered pair is dropped.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if !self.edge_index.insert((edge.from.clone(), edge.to.clone())) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }
}

/// Every graph produced by one parse. Graphs live in an arena and refer to
/// each other by [`GraphId`]; each `graph` line starts a new root.
#[derive(Debug, Clone, Default)]
pub struct Diagram {
    graphs: Vec<Graph>,
    roots: Vec<GraphId>,
}

impl Diagram {
    pub fn add_root(&mut self, direction: Direction) -> GraphId {
        let id = GraphId(self.graphs.len());
        self.graphs.push(Graph::new("root", direction));
        self.roots.push(id);
        id
    }

    pub fn add_subgraph(
        &mut self,
        parent: GraphId,
        id: impl Into<String>,
        label: impl Into<String>,
    ) -> GraphId {
        let child = GraphId(self.graphs.len());
        let mut graph = Graph::new(id, self.graphs[parent.0].direction);
        graph.label = label.into();
        graph.parent = Some(parent);
        self.graphs.push(graph);
        self.graphs[parent.0].children.push(child);
        child
    }

    pub fn roots(&self) -> &[GraphId] {
        &self.roots
    }

    pub fn graph(&self, id: GraphId) -> &Graph {
        &self.graphs[id.0]
    }

    pub fn graph_mut(&mut self, id: GraphId) -> &mut Graph {
        &mut self.graphs[id.0]
    }

    /// `id` followed by all of its descendants, depth first, in declaration order.
    pub fn descendants(&self, id: GraphId) -> Vec<GraphId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(g) = stack.pop() {
            out.push(g);
            stack.extend(self.graphs[g.0].children.iter().rev().copied());
        }
        out
    }

    /// Flattened view of `id` and its subgraphs.
    pub fn view(&self, id: GraphId) -> GraphView<'_> {
        let tree = self.descendants(id);
        let mut view = GraphView::from_graphs(
            self.graph(id).direction,
            tree.iter().map(|&g| self.graph(g)),
        );
        view.groups = tree[1..]
            .iter()
            .map(|&sub| {
                self.descendants(sub)
                    .into_iter()
                    .flat_map(|g| self.graph(g).nodes())
                    .map(|n| n.id.as_str())
                    .collect()
            })
            .collect();
        view
    }
}

/// Read-only node/edge lists that layout works on. Nodes are unique by id
/// and edges by ordered pair. When an id is declared in several graphs the
/// first declaration wins, unless it has no label and a later one does.
#[derive(Debug, Clone)]
pub struct GraphView<'a> {
    pub direction: Direction,
    pub nodes: Vec<&'a Node>,
    pub edges: Vec<&'a Edge>,
    /// Member ids of each subgraph below the viewed graph, descendants
    /// included, in pre-order.
    pub groups: Vec<HashSet<&'a str>>,
}

impl<'a> GraphView<'a> {
    fn from_graphs(direction: Direction, graphs: impl Iterator<Item = &'a Graph>) -> Self {
        let mut nodes: Vec<&'a Node> = Vec::new();
        let mut edges = Vec::new();
        let mut node_index: HashMap<&str, usize> = HashMap::new();
        let mut seen_edges = HashSet::new();

        for graph in graphs {
            for node in graph.nodes() {
                match node_index.get(node.id.as_str()) {
                    Some(&i) => {
                        if nodes[i].label.is_empty() && !node.label.is_empty() {
                            nodes[i] = node;
                        }
                    }
                    None => {
                        node_index.insert(node.id.as_str(), nodes.len());
                        nodes.push(node);
                    }
                }
            }
            for edge in graph.edges() {
                if seen_edges.insert((edge.from.as_str(), edge.to.as_str())) {
                    edges.push(edge);
                }
            }
        }

        GraphView {
            direction,
            nodes,
            edges,
            groups: Vec::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.nodes.iter().copied().find(|n| n.id == id)
    }
}
