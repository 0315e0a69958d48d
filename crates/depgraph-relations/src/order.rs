//! Evaluation order of operations.

use std::collections::VecDeque;

use crate::depsgraph::{DepsGraph, OperationId, RelationSource};
use crate::error::RelationError;

/// Orders all operations so every operation comes after the operations it
/// depends on (Kahn's algorithm).
///
/// Cyclic relations are ignored. Operations driven by the time source start
/// the order, followed by the other operations without dependencies, in
/// creation order. Fails if a cycle was not marked by
/// [`detect_cycles`](crate::detect_cycles).
pub fn evaluation_order(graph: &DepsGraph) -> Result<Vec<OperationId>, RelationError> {
    let count = graph.operation_count();
    let mut in_degree = vec![0usize; count];
    for (_, relation) in graph.relations() {
        if !relation.is_cyclic() && matches!(relation.from, RelationSource::Operation(_)) {
            in_degree[relation.to.index()] += 1;
        }
    }

    let mut queued = vec![false; count];
    let mut queue = VecDeque::new();
    let time_driven = graph
        .time_source()
        .outlinks()
        .iter()
        .map(|r| graph.relation(*r).to.index());
    for op in time_driven.chain(0..count) {
        if in_degree[op] == 0 && !queued[op] {
            queued[op] = true;
            queue.push_back(op);
        }
    }

    let mut order = Vec::with_capacity(count);
    while let Some(op) = queue.pop_front() {
        let id = OperationId(op as u32);
        order.push(id);
        for relation_id in graph.operation(id).outlinks() {
            let relation = graph.relation(*relation_id);
            if relation.is_cyclic() {
                continue;
            }
            let to = relation.to.index();
            in_degree[to] -= 1;
            if in_degree[to] == 0 {
                queue.push_back(to);
            }
        }
    }

    if order.len() != count {
        return Err(RelationError::UnmarkedCycles {
            count: count - order.len(),
        });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depsgraph::RelationFlags;
    use crate::detect_cycles;
    use crate::id::Main;
    use crate::node_type::{NodeType, OpCode};

    fn ops(graph: &mut DepsGraph, count: usize) -> Vec<OperationId> {
        let mut main = Main::new();
        let id = main.add_object("A");
        let node = graph.add_id_node(&main, id).unwrap();
        let component = graph.add_component_node(node, NodeType::Generic, "");
        (0..count)
            .map(|i| graph.add_operation_node(component, OpCode::Operation, &format!("op{i}"), -1))
            .collect()
    }

    fn position(order: &[OperationId], op: OperationId) -> usize {
        order.iter().position(|&o| o == op).unwrap()
    }

    #[test]
    fn test_dependencies_come_first() {
        let mut graph = DepsGraph::new();
        let o = ops(&mut graph, 4);
        graph.add_operation_relation(o[3], o[1], "3 -> 1", RelationFlags::NONE);
        graph.add_operation_relation(o[1], o[0], "1 -> 0", RelationFlags::NONE);
        graph.add_operation_relation(o[2], o[0], "2 -> 0", RelationFlags::NONE);

        let order = evaluation_order(&graph).unwrap();
        assert_eq!(order.len(), 4);
        assert!(position(&order, o[3]) < position(&order, o[1]));
        assert!(position(&order, o[1]) < position(&order, o[0]));
        assert!(position(&order, o[2]) < position(&order, o[0]));
    }

    #[test]
    fn test_time_driven_operations_start() {
        let mut graph = DepsGraph::new();
        let o = ops(&mut graph, 3);
        graph.add_time_relation(o[2], "Time", RelationFlags::NONE);
        let order = evaluation_order(&graph).unwrap();
        assert_eq!(order[0], o[2]);
    }

    #[test]
    fn test_unmarked_cycle_is_an_error() {
        let mut graph = DepsGraph::new();
        let o = ops(&mut graph, 3);
        graph.add_operation_relation(o[0], o[1], "0 -> 1", RelationFlags::NONE);
        graph.add_operation_relation(o[1], o[2], "1 -> 2", RelationFlags::NONE);
        graph.add_operation_relation(o[2], o[1], "2 -> 1", RelationFlags::NONE);

        assert_eq!(evaluation_order(&graph), Err(RelationError::UnmarkedCycles { count: 2 }));
        detect_cycles(&mut graph);
        let order = evaluation_order(&graph).unwrap();
        assert_eq!(order, vec![o[0], o[1], o[2]]);
    }
}
