//! Minimal Graphviz DOT builder.
//!
//! Enough to render directed graphs with clusters, attribute lists, and
//! nodes whose label is a table of input/output ports. Used by
//! [`Graph::to_dot`](crate::graph::Graph::to_dot) and by the relation graph
//! exporter.

use std::fmt::{self, Write as _};

/// Identifies a node in a [`DotGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DotNodeId(usize);

/// Identifies a cluster (`subgraph cluster_N`) in a [`DotGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClusterId(usize);

/// Identifies an edge in a [`DotGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DotEdgeId(usize);

/// Ordered attribute list. Later writes to the same key replace the value.
#[derive(Clone, Debug, Default)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    /// Sets `key` to `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Returns the value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn write_list(&self, out: &mut String) {
        if self.0.is_empty() {
            return;
        }
        out.push_str(" [");
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{k}={}", quote(v));
        }
        out.push(']');
    }

    fn write_statements(&self, out: &mut String, indent: usize) {
        for (k, v) in &self.0 {
            let _ = writeln!(out, "{:indent$}{k}={}", "", quote(v));
        }
    }
}

/// An endpoint of an edge: a node, optionally narrowed to one of its ports.
#[derive(Clone, Debug)]
pub struct Port {
    node: DotNodeId,
    port: Option<String>,
}

impl Port {
    /// The node itself.
    pub fn node(node: DotNodeId) -> Self {
        Self { node, port: None }
    }

    /// A named port of a node.
    pub fn named(node: DotNodeId, port: impl Into<String>) -> Self {
        Self {
            node,
            port: Some(port.into()),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.port {
            Some(port) => write!(f, "n{}:{port}", self.node.0),
            None => write!(f, "n{}", self.node.0),
        }
    }
}

/// A socket row shown in a node with ports.
#[derive(Clone, Debug, Default)]
pub struct DotSocket {
    /// Text shown for the socket.
    pub name: String,
    /// Optional font color.
    pub font_color: Option<String>,
}

impl DotSocket {
    /// A socket without color.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            font_color: None,
        }
    }
}

/// Handle returned by [`DotGraph::new_node_with_sockets`].
#[derive(Clone, Copy, Debug)]
pub struct NodeWithSockets {
    /// The underlying node.
    pub node: DotNodeId,
}

impl NodeWithSockets {
    /// Port of input socket `index`.
    pub fn input(&self, index: usize) -> Port {
        Port::named(self.node, format!("in{index}"))
    }

    /// Port of output socket `index`.
    pub fn output(&self, index: usize) -> Port {
        Port::named(self.node, format!("out{index}"))
    }
}

struct Cluster {
    parent: Option<ClusterId>,
    attributes: Attributes,
}

struct Node {
    cluster: Option<ClusterId>,
    attributes: Attributes,
}

struct Edge {
    from: Port,
    to: Port,
    attributes: Attributes,
}

/// A directed graph that renders to DOT text via `Display`.
pub struct DotGraph {
    attributes: Attributes,
    clusters: Vec<Cluster>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Default for DotGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DotGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            attributes: Attributes::default(),
            clusters: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Sets a graph-level attribute such as `rankdir`.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.set(key, value);
    }

    /// Adds a cluster, optionally nested in `parent`.
    pub fn new_cluster(&mut self, label: impl Into<String>, parent: Option<ClusterId>) -> ClusterId {
        let mut attributes = Attributes::default();
        attributes.set("label", label);
        self.clusters.push(Cluster { parent, attributes });
        ClusterId(self.clusters.len() - 1)
    }

    /// Sets an attribute on a cluster.
    pub fn set_cluster_attribute(&mut self, cluster: ClusterId, key: impl Into<String>, value: impl Into<String>) {
        self.clusters[cluster.0].attributes.set(key, value);
    }

    /// Adds a plain node.
    pub fn new_node(&mut self, label: impl Into<String>, cluster: Option<ClusterId>) -> DotNodeId {
        let mut attributes = Attributes::default();
        attributes.set("label", label);
        self.nodes.push(Node { cluster, attributes });
        DotNodeId(self.nodes.len() - 1)
    }

    /// Adds a node rendered as a table with one port per socket.
    ///
    /// Inputs are laid out on the left, outputs on the right.
    pub fn new_node_with_sockets(
        &mut self,
        name: &str,
        inputs: &[DotSocket],
        outputs: &[DotSocket],
        cluster: Option<ClusterId>,
    ) -> NodeWithSockets {
        let mut label = String::from("<<table border=\"0\" cellspacing=\"3\">");
        let _ = write!(
            label,
            "<tr><td colspan=\"3\" align=\"center\"><b>{}</b></td></tr>",
            escape_html(name)
        );
        for row in 0..inputs.len().max(outputs.len()) {
            label.push_str("<tr>");
            match inputs.get(row) {
                Some(socket) => {
                    let _ = write!(label, "<td align=\"left\" port=\"in{row}\">{}</td>", socket_text(socket));
                }
                None => label.push_str("<td></td>"),
            }
            label.push_str("<td></td>");
            match outputs.get(row) {
                Some(socket) => {
                    let _ = write!(label, "<td align=\"right\" port=\"out{row}\">{}</td>", socket_text(socket));
                }
                None => label.push_str("<td></td>"),
            }
            label.push_str("</tr>");
        }
        label.push_str("</table>>");

        let node = self.new_node(label, cluster);
        self.set_node_attribute(node, "shape", "box");
        NodeWithSockets { node }
    }

    /// Sets an attribute on a node.
    pub fn set_node_attribute(&mut self, node: DotNodeId, key: impl Into<String>, value: impl Into<String>) {
        self.nodes[node.0].attributes.set(key, value);
    }

    /// Adds a directed edge.
    pub fn new_edge(&mut self, from: Port, to: Port) -> DotEdgeId {
        self.edges.push(Edge {
            from,
            to,
            attributes: Attributes::default(),
        });
        DotEdgeId(self.edges.len() - 1)
    }

    /// Returns the attributes of an edge for modification.
    pub fn edge_attributes(&mut self, edge: DotEdgeId) -> &mut Attributes {
        &mut self.edges[edge.0].attributes
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn write_cluster(&self, out: &mut String, cluster: Option<ClusterId>, indent: usize) {
        if let Some(id) = cluster {
            let _ = writeln!(out, "{:indent$}subgraph cluster_{} {{", "", id.0);
            self.clusters[id.0].attributes.write_statements(out, indent + 2);
        }
        let inner = if cluster.is_some() { indent + 2 } else { indent };
        for (i, c) in self.clusters.iter().enumerate() {
            if c.parent == cluster {
                self.write_cluster(out, Some(ClusterId(i)), inner);
            }
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.cluster == cluster {
                let _ = write!(out, "{:inner$}n{i}", "");
                node.attributes.write_list(out);
                out.push('\n');
            }
        }
        if cluster.is_some() {
            let _ = writeln!(out, "{:indent$}}}", "");
        }
    }
}

impl fmt::Display for DotGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("digraph {\n");
        self.attributes.write_statements(&mut out, 2);
        self.write_cluster(&mut out, None, 2);
        for edge in &self.edges {
            let _ = write!(out, "  {} -> {}", edge.from, edge.to);
            edge.attributes.write_list(&mut out);
            out.push('\n');
        }
        out.push_str("}\n");
        f.write_str(&out)
    }
}

fn socket_text(socket: &DotSocket) -> String {
    let name = escape_html(&socket.name);
    match &socket.font_color {
        Some(color) => format!("<font color=\"{}\">{name}</font>", escape_html(color)),
        None => name,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// HTML-like labels (`<...>`) are emitted verbatim, everything else quoted.
fn quote(value: &str) -> String {
    if value.starts_with('<') && value.ends_with('>') {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nodes_and_edges() {
        let mut dot = DotGraph::new();
        dot.set_attribute("rankdir", "LR");
        let a = dot.new_node("a", None);
        let b = dot.new_node("b \"quoted\"", None);
        let e = dot.new_edge(Port::node(a), Port::node(b));
        dot.edge_attributes(e).set("color", "red");
        let text = dot.to_string();
        assert!(text.starts_with("digraph {"));
        assert!(text.contains("rankdir=\"LR\""));
        assert!(text.contains("n1 [label=\"b \\\"quoted\\\"\"]"));
        assert!(text.contains("n0 -> n1 [color=\"red\"]"));
    }

    #[test]
    fn clusters_nest() {
        let mut dot = DotGraph::new();
        let outer = dot.new_cluster("outer", None);
        let inner = dot.new_cluster("inner", Some(outer));
        dot.new_node("x", Some(inner));
        let text = dot.to_string();
        let outer_pos = text.find("subgraph cluster_0").unwrap();
        let inner_pos = text.find("subgraph cluster_1").unwrap();
        let node_pos = text.find("n0 [label=\"x\"]").unwrap();
        assert!(outer_pos < inner_pos && inner_pos < node_pos);
    }

    #[test]
    fn socket_nodes_expose_ports() {
        let mut dot = DotGraph::new();
        let n = dot.new_node_with_sockets(
            "Add <int>",
            &[DotSocket::new("a"), DotSocket::new("b")],
            &[DotSocket {
                name: "sum".into(),
                font_color: Some("red".into()),
            }],
            None,
        );
        let m = dot.new_node("sink", None);
        dot.new_edge(n.output(0), Port::node(m));
        let text = dot.to_string();
        assert!(text.contains("port=\"in1\">b</td>"));
        assert!(text.contains("<font color=\"red\">sum</font>"));
        assert!(text.contains("Add &lt;int&gt;"));
        assert!(text.contains("n0:out0 -> n1"));
    }

    #[test]
    fn attributes_replace_existing_keys() {
        let mut attrs = Attributes::default();
        attrs.set("color", "red");
        attrs.set("color", "blue");
        assert_eq!(attrs.get("color"), Some("blue"));
    }
}
