//! Graphviz export of the operation graph.

use depgraph_core::DotGraph;
use depgraph_core::dot::{ClusterId, DotNodeId, Port};

use super::{DepsGraph, RelationFlags, RelationSource};

const COLOR_CYCLIC: &str = "#e02020";
const COLOR_GODMODE: &str = "#2050e0";
const FILL_ENTRY: &str = "#d8f0d8";
const FILL_EXIT: &str = "#f0d8d8";

impl DepsGraph {
    /// Renders the graph as DOT, with one cluster per ID and a nested
    /// cluster per component.
    ///
    /// Cyclic relations are drawn red, god-mode relations blue, and relations
    /// that do not flush updates dashed.
    pub fn to_dot(&self) -> String {
        let mut dot = DotGraph::new();
        dot.set_attribute("rankdir", "LR");
        dot.set_attribute("compound", "true");

        let time_source = dot.new_node("Time Source", None);
        dot.set_node_attribute(time_source, "shape", "ellipse");

        let mut id_clusters: Vec<ClusterId> = Vec::with_capacity(self.id_nodes.len());
        for node in &self.id_nodes {
            id_clusters.push(dot.new_cluster(node.name.clone(), None));
        }

        let mut operation_nodes: Vec<DotNodeId> = Vec::with_capacity(self.operations.len());
        let mut component_clusters: Vec<Option<ClusterId>> = vec![None; self.components.len()];
        for (index, operation) in self.operations.iter().enumerate() {
            let owner = operation.owner.index();
            let cluster = *component_clusters[owner].get_or_insert_with(|| {
                let component = &self.components[owner];
                let label = if component.name.is_empty() {
                    component.node_type.to_string()
                } else {
                    format!("{} ({})", component.node_type, component.name)
                };
                dot.new_cluster(label, Some(id_clusters[component.owner.index()]))
            });
            let node = dot.new_node(operation.identifier(), Some(cluster));
            dot.set_node_attribute(node, "shape", "box");

            let component = &self.components[owner];
            let op = super::OperationId(index as u32);
            if component.entry == Some(op) {
                dot.set_node_attribute(node, "style", "filled");
                dot.set_node_attribute(node, "fillcolor", FILL_ENTRY);
            } else if component.exit == Some(op) {
                dot.set_node_attribute(node, "style", "filled");
                dot.set_node_attribute(node, "fillcolor", FILL_EXIT);
            }
            operation_nodes.push(node);
        }

        for relation in &self.relations {
            let from = match relation.from {
                RelationSource::TimeSource => time_source,
                RelationSource::Operation(op) => operation_nodes[op.index()],
            };
            let to = operation_nodes[relation.to.index()];
            let edge = dot.new_edge(Port::node(from), Port::node(to));
            let attributes = dot.edge_attributes(edge);
            attributes.set("label", relation.description.clone());
            if relation.flags.contains(RelationFlags::CYCLIC) {
                attributes.set("color", COLOR_CYCLIC);
                attributes.set("penwidth", "2");
            } else if relation.flags.contains(RelationFlags::GODMODE) {
                attributes.set("color", COLOR_GODMODE);
            }
            if relation.flags.contains(RelationFlags::NO_FLUSH) {
                attributes.set("style", "dashed");
            }
        }

        dot.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Main;
    use crate::node_type::{NodeType, OpCode};

    #[test]
    fn test_dot_contains_clusters_and_edges() {
        let mut main = Main::new();
        let rig = main.add_object("Rig");
        let mut graph = DepsGraph::new();
        let id_node = graph.add_id_node(&main, rig).unwrap();
        let bone = graph.add_component_node(id_node, NodeType::Bone, "Arm");
        let local = graph.add_operation_node(bone, OpCode::BoneLocal, "", -1);
        let done = graph.add_operation_node(bone, OpCode::BoneDone, "", -1);
        graph.add_operation_relation(local, done, "Local -> Done", RelationFlags::NONE);
        let cyclic = graph.add_operation_relation(done, local, "Done -> Local", RelationFlags::NONE);
        graph.relation_mut(cyclic).flags.insert(RelationFlags::CYCLIC);
        graph.add_time_relation(local, "Time", RelationFlags::NO_FLUSH);

        let text = graph.to_dot();
        assert!(text.starts_with("digraph {"));
        assert!(text.contains("OBRig"));
        assert!(text.contains("BONE (Arm)"));
        assert!(text.contains("BONE_LOCAL"));
        assert!(text.contains("Local -> Done"));
        assert!(text.contains(COLOR_CYCLIC));
        assert!(text.contains("dashed"));
        assert!(text.contains("Time Source"));
    }
}
