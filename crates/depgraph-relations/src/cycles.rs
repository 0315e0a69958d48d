//! Dependency cycle detection.
//!
//! Walks the operation graph depth first. A relation leading back to an
//! operation that is still on the walk stack closes a cycle; it is flagged
//! [`RelationFlags::CYCLIC`] so ordering can ignore it, and the cycle is
//! reported. Relations that are already cyclic are not followed, so running
//! detection again finds nothing new.

use crate::depsgraph::{DepsGraph, OperationId, RelationFlags, RelationId};

/// One detected cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    /// The relation that closes the cycle, now flagged cyclic.
    pub closing_relation: RelationId,
    /// Operations on the cycle, in dependency order. The closing relation
    /// leads from the last operation back to the first.
    pub path: Vec<OperationId>,
    /// `relations[i]` leads from `path[i]` to `path[i + 1]`.
    pub relations: Vec<RelationId>,
}

impl CycleReport {
    /// One line per relation on the cycle, starting with the closing one.
    pub fn describe(&self, graph: &DepsGraph) -> String {
        let mut out = String::new();
        let mut line = |to: OperationId, from: OperationId, relation: RelationId| {
            out.push_str(&format!(
                "  '{}' depends on '{}' through '{}'\n",
                graph.operation_identifier(to),
                graph.operation_identifier(from),
                graph.relation(relation).description
            ));
        };
        if let (Some(&first), Some(&last)) = (self.path.first(), self.path.last()) {
            line(first, last, self.closing_relation);
        }
        for (i, &relation) in self.relations.iter().enumerate().rev() {
            line(self.path[i + 1], self.path[i], relation);
        }
        out
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    NotVisited,
    InProgress,
    Done,
}

struct Frame {
    operation: usize,
    next_outlink: usize,
    /// Relation the walk followed to get here.
    via: Option<RelationId>,
}

/// Finds dependency cycles, flags the relation closing each one as
/// [`RelationFlags::CYCLIC`], and logs every cycle as a warning.
///
/// Operations without incoming relations are used as starting points first,
/// so the closing relation is the one pointing back towards the inputs of
/// the graph.
pub fn detect_cycles(graph: &mut DepsGraph) -> Vec<CycleReport> {
    let count = graph.operation_count();
    let mut visit = vec![Visit::NotVisited; count];
    let mut reports = Vec::new();

    let has_operation_inlinks = |graph: &DepsGraph, op: usize| {
        graph
            .operation(OperationId(op as u32))
            .inlinks()
            .iter()
            .any(|r| {
                let relation = graph.relation(*r);
                !relation.is_cyclic() && matches!(relation.from, crate::RelationSource::Operation(_))
            })
    };
    let roots = (0..count).filter(|&op| !has_operation_inlinks(graph, op));
    let starts: Vec<usize> = roots.chain(0..count).collect();

    for start in starts {
        if visit[start] != Visit::NotVisited {
            continue;
        }
        visit[start] = Visit::InProgress;
        let mut stack = vec![Frame {
            operation: start,
            next_outlink: 0,
            via: None,
        }];

        while let Some(top) = stack.last_mut() {
            let operation = graph.operation(OperationId(top.operation as u32));
            let Some(&relation_id) = operation.outlinks().get(top.next_outlink) else {
                visit[top.operation] = Visit::Done;
                stack.pop();
                continue;
            };
            top.next_outlink += 1;

            let relation = graph.relation(relation_id);
            if relation.is_cyclic() {
                continue;
            }
            let to = relation.to.index();
            match visit[to] {
                Visit::NotVisited => {
                    visit[to] = Visit::InProgress;
                    stack.push(Frame {
                        operation: to,
                        next_outlink: 0,
                        via: Some(relation_id),
                    });
                }
                Visit::InProgress => {
                    let Some(position) = stack.iter().position(|frame| frame.operation == to) else {
                        continue;
                    };
                    let cycle = &stack[position..];
                    reports.push(CycleReport {
                        closing_relation: relation_id,
                        path: cycle.iter().map(|f| OperationId(f.operation as u32)).collect(),
                        relations: cycle[1..].iter().filter_map(|f| f.via).collect(),
                    });
                }
                Visit::Done => {}
            }
        }
    }

    for report in &reports {
        graph.relation_mut(report.closing_relation).flags.insert(RelationFlags::CYCLIC);
        tracing::warn!("Dependency cycle detected:\n{}", report.describe(graph));
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Main;
    use crate::node_type::{NodeType, OpCode};

    fn chain(graph: &mut DepsGraph, main: &Main, id: crate::IdKey, len: usize) -> Vec<OperationId> {
        let node = graph.add_id_node(main, id).unwrap();
        let component = graph.add_component_node(node, NodeType::Generic, "");
        (0..len)
            .map(|i| graph.add_operation_node(component, OpCode::Operation, &format!("op{i}"), -1))
            .collect()
    }

    #[test]
    fn test_acyclic_graph_has_no_reports() {
        let mut main = Main::new();
        let id = main.add_object("A");
        let mut graph = DepsGraph::new();
        let ops = chain(&mut graph, &main, id, 3);
        graph.add_operation_relation(ops[0], ops[1], "0 -> 1", RelationFlags::NONE);
        graph.add_operation_relation(ops[1], ops[2], "1 -> 2", RelationFlags::NONE);
        graph.add_operation_relation(ops[0], ops[2], "0 -> 2", RelationFlags::NONE);
        assert!(detect_cycles(&mut graph).is_empty());
        assert!(graph.relations().all(|(_, r)| !r.is_cyclic()));
    }

    #[test]
    fn test_closing_relation_is_marked() {
        let mut main = Main::new();
        let id = main.add_object("A");
        let mut graph = DepsGraph::new();
        let ops = chain(&mut graph, &main, id, 4);
        // 0 -> 1 -> 2 -> 3 -> 1
        graph.add_operation_relation(ops[0], ops[1], "0 -> 1", RelationFlags::NONE);
        graph.add_operation_relation(ops[1], ops[2], "1 -> 2", RelationFlags::NONE);
        graph.add_operation_relation(ops[2], ops[3], "2 -> 3", RelationFlags::NONE);
        let back = graph.add_operation_relation(ops[3], ops[1], "3 -> 1", RelationFlags::NONE);

        let reports = detect_cycles(&mut graph);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].closing_relation, back);
        assert_eq!(reports[0].path, vec![ops[1], ops[2], ops[3]]);
        assert_eq!(reports[0].relations.len(), 2);
        let cyclic: Vec<_> = graph.relations().filter(|(_, r)| r.is_cyclic()).map(|(id, _)| id).collect();
        assert_eq!(cyclic, vec![back]);

        let text = reports[0].describe(&graph);
        assert!(text.contains("through '3 -> 1'"));
        assert_eq!(text.lines().count(), 3);

        // Marked cycles are not reported again.
        assert!(detect_cycles(&mut graph).is_empty());
    }

    #[test]
    fn test_self_relation_is_a_cycle() {
        let mut main = Main::new();
        let id = main.add_object("A");
        let mut graph = DepsGraph::new();
        let ops = chain(&mut graph, &main, id, 1);
        let relation = graph.add_operation_relation(ops[0], ops[0], "self", RelationFlags::NONE);
        let reports = detect_cycles(&mut graph);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].path, vec![ops[0]]);
        assert!(graph.relation(relation).is_cyclic());
    }
}
