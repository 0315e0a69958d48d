//! DOT export of a lazy-function graph.

use crate::dot::{Attributes, DotGraph, DotSocket, NodeWithSockets, Port};

use super::{Graph, InputSocketId, OutputSocketId};

/// A socket of either direction, passed to [`ToDotOptions`] hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketRef {
    /// An input socket.
    Input(InputSocketId),
    /// An output socket.
    Output(OutputSocketId),
}

/// Customizes [`Graph::to_dot`].
pub trait ToDotOptions {
    /// Text shown for a socket.
    fn socket_name(&self, graph: &Graph<'_>, socket: SocketRef) -> String {
        match socket {
            SocketRef::Input(id) => graph.input_name(id),
            SocketRef::Output(id) => graph.output_name(id),
        }
    }

    /// Font color of a socket.
    fn socket_font_color(&self, graph: &Graph<'_>, socket: SocketRef) -> Option<String> {
        let _ = (graph, socket);
        None
    }

    /// Adds attributes to the edge drawn for a link.
    fn add_edge_attributes(
        &self,
        graph: &Graph<'_>,
        from: OutputSocketId,
        to: InputSocketId,
        attributes: &mut Attributes,
    ) {
        let _ = (graph, from, to, attributes);
    }
}

/// Uses every default of [`ToDotOptions`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDotOptions;

impl ToDotOptions for DefaultDotOptions {}

impl Graph<'_> {
    /// Renders the graph in Graphviz DOT syntax.
    ///
    /// Unlinked inputs with a default value get a small node showing the
    /// value when its type supports printing.
    pub fn to_dot(&self, options: &dyn ToDotOptions) -> String {
        let mut dot = DotGraph::new();
        dot.set_attribute("rankdir", "LR");

        let socket = |s: SocketRef| DotSocket {
            name: options.socket_name(self, s),
            font_color: options.socket_font_color(self, s),
        };

        let dot_nodes: Vec<NodeWithSockets> = self
            .nodes()
            .iter()
            .map(|node| {
                let inputs: Vec<DotSocket> = (0..node.inputs().len())
                    .map(|i| socket(SocketRef::Input(InputSocketId { node: node.id(), index: i })))
                    .collect();
                let outputs: Vec<DotSocket> = (0..node.outputs().len())
                    .map(|i| socket(SocketRef::Output(OutputSocketId { node: node.id(), index: i })))
                    .collect();
                let handle = dot.new_node_with_sockets(&node.name(), &inputs, &outputs, None);
                if node.is_interface() {
                    dot.set_node_attribute(handle.node, "style", "filled");
                    dot.set_node_attribute(handle.node, "fillcolor", "#e0e0e0");
                }
                handle
            })
            .collect();

        for node in self.nodes() {
            for (index, output) in node.outputs().iter().enumerate() {
                let from = OutputSocketId { node: node.id(), index };
                for &to in output.targets() {
                    let edge = dot.new_edge(
                        dot_nodes[node.id().slot()].output(index),
                        dot_nodes[to.node.slot()].input(to.index),
                    );
                    options.add_edge_attributes(self, from, to, dot.edge_attributes(edge));
                }
            }
            for (index, input) in node.inputs().iter().enumerate() {
                if input.origin().is_some() {
                    continue;
                }
                let Some(default) = input.default_value() else {
                    continue;
                };
                let label = input
                    .value_type()
                    .format(default)
                    .unwrap_or_else(|| input.value_type().name().to_string());
                let value_node = dot.new_node(label, None);
                dot.set_node_attribute(value_node, "shape", "ellipse");
                let edge = dot.new_edge(Port::node(value_node), dot_nodes[node.id().slot()].input(index));
                dot.edge_attributes(edge).set("style", "dashed");
            }
        }

        dot.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{Input, LazyFunction, Output};
    use crate::params::{Context, Params};
    use crate::value::{ValueType, value};

    struct Sum {
        inputs: Vec<Input>,
        outputs: Vec<Output>,
    }

    impl LazyFunction for Sum {
        fn name(&self) -> String {
            "Sum".to_string()
        }
        fn inputs(&self) -> &[Input] {
            &self.inputs
        }
        fn outputs(&self) -> &[Output] {
            &self.outputs
        }
        fn execute_impl(&self, _params: &Params<'_>, _context: &mut Context<'_>) {}
    }

    struct Highlight;

    impl ToDotOptions for Highlight {
        fn socket_font_color(&self, _graph: &Graph<'_>, socket: SocketRef) -> Option<String> {
            matches!(socket, SocketRef::Output(_)).then(|| "blue".to_string())
        }

        fn add_edge_attributes(
            &self,
            _graph: &Graph<'_>,
            _from: OutputSocketId,
            _to: InputSocketId,
            attributes: &mut Attributes,
        ) {
            attributes.set("color", "red");
        }
    }

    fn sum() -> Sum {
        Sum {
            inputs: vec![
                Input::new("a", ValueType::debug::<i32>()),
                Input::new("b", ValueType::debug::<i32>()),
            ],
            outputs: vec![Output::new("sum", ValueType::debug::<i32>())],
        }
    }

    #[test]
    fn test_dot_contains_nodes_links_and_defaults() {
        let f = sum();
        let mut graph = Graph::new();
        let a = graph.add_input(ValueType::debug::<i32>(), "a");
        let out = graph.add_output(ValueType::debug::<i32>(), "out");
        let node = graph.add_function(&f);
        graph.add_link(a, graph.input_id(node, 0)).unwrap();
        graph.add_link(graph.output_id(node, 0), out).unwrap();
        graph.set_default_value(graph.input_id(node, 1), value(12_i32)).unwrap();

        let text = graph.to_dot(&DefaultDotOptions);
        assert!(text.contains("<b>Sum</b>"));
        assert!(text.contains("<b>Graph Inputs</b>"));
        assert!(text.contains("n0:out0 -> n2:in0"));
        assert!(text.contains("n2:out0 -> n1:in0"));
        assert!(text.contains("label=\"12\""));
        assert!(text.contains("style=\"dashed\""));
    }

    #[test]
    fn test_dot_options_are_applied() {
        let f = sum();
        let mut graph = Graph::new();
        let a = graph.add_input(ValueType::debug::<i32>(), "a");
        let node = graph.add_function(&f);
        graph.add_link(a, graph.input_id(node, 0)).unwrap();

        let text = graph.to_dot(&Highlight);
        assert!(text.contains("<font color=\"blue\">sum</font>"));
        assert!(text.contains("n0:out0 -> n2:in0 [color=\"red\"]"));
    }
}
