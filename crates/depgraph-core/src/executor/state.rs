//! Per-execution bookkeeping of a [`GraphExecutor`](super::GraphExecutor).

use std::sync::atomic::AtomicBool;

use parking_lot::Mutex;

use crate::function::{Storage, ValueUsage};
use crate::graph::{GRAPH_OUTPUT_NODE, Graph, GraphOutputSocket, Node, NodeId};
use crate::value::Value;

use super::queue::TaskQueue;

/// State of one input socket of a node.
#[derive(Default)]
pub(crate) struct InputState {
    /// Whether the input will be used. Starts as `Maybe`.
    pub usage: ValueUsage,
    /// The value, once it has been forwarded or loaded from the default.
    pub value: Option<Value>,
    /// Set once the node may read the value. A value arriving while the node
    /// is running only becomes visible in its next execution.
    pub was_ready_for_execution: bool,
}

/// State of one output socket of a node.
pub(crate) struct OutputState {
    /// Whether the output is used by any target. Starts as `Maybe`.
    pub usage: ValueUsage,
    /// Snapshot of `usage` taken when the node starts running, so the
    /// function sees a stable value for the whole execution.
    pub usage_for_execution: ValueUsage,
    /// Targets that may still use the output. The output becomes unused when
    /// this drops to zero.
    pub potential_target_sockets: usize,
    /// Set once the value was forwarded to the targets.
    pub has_been_computed: bool,
}

impl OutputState {
    fn new(potential_target_sockets: usize) -> Self {
        Self {
            usage: ValueUsage::Maybe,
            usage_for_execution: ValueUsage::Maybe,
            potential_target_sockets,
            has_been_computed: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NodeScheduleState {
    /// Not queued and not running.
    NotScheduled,
    /// Queued, waiting for a thread.
    Scheduled,
    /// Currently running.
    Running,
    /// Currently running and has to run again once the current execution is
    /// done.
    RunningAndRescheduled,
}

/// Everything the executor tracks about one node during an evaluation.
pub(crate) struct NodeState {
    pub inputs: Vec<InputState>,
    pub outputs: Vec<OutputState>,
    /// Inputs requested as `Used` that have not arrived yet.
    pub missing_required_inputs: usize,
    /// Set when the inputs declared `Used` by the function were requested.
    pub always_used_inputs_requested: bool,
    /// Set when the storage was created and unlinked inputs got their
    /// default values.
    pub storage_and_defaults_initialized: bool,
    /// Set when nothing about the node can change anymore.
    pub node_has_finished: bool,
    /// Side-effect nodes run even when none of their outputs are used.
    pub has_side_effects: bool,
    pub schedule_state: NodeScheduleState,
    /// Storage of the node's function. Taken out while the function runs.
    pub storage: Option<Storage>,
}

impl NodeState {
    fn new(node: &Node<'_>) -> Self {
        Self {
            inputs: node.inputs().iter().map(|_| InputState::default()).collect(),
            outputs: node
                .outputs()
                .iter()
                .map(|socket| OutputState::new(socket.targets().len()))
                .collect(),
            missing_required_inputs: 0,
            always_used_inputs_requested: false,
            storage_and_defaults_initialized: false,
            node_has_finished: false,
            has_side_effects: false,
            schedule_state: NodeScheduleState::NotScheduled,
            storage: None,
        }
    }
}

/// Storage of a graph executor: all state of one logical evaluation.
///
/// Several evaluations of the same executor can run concurrently as long as
/// each one has its own `ExecutionState`.
pub(crate) struct ExecutionState {
    /// One entry per graph node, indexed by node slot.
    pub nodes: Vec<Mutex<NodeState>>,
    /// One flag per executor input. Set once the value was forwarded.
    pub loaded_inputs: Vec<AtomicBool>,
    pub queue: TaskQueue,
    /// Set once the caller allowed using multiple threads.
    pub multi_threading: AtomicBool,
    /// False until the first execution set up static usages.
    pub initialized: bool,
}

impl ExecutionState {
    pub fn new(graph: &Graph<'_>, input_count: usize) -> Self {
        Self {
            nodes: graph
                .nodes()
                .iter()
                .map(|node| Mutex::new(NodeState::new(node)))
                .collect(),
            loaded_inputs: (0..input_count).map(|_| AtomicBool::new(false)).collect(),
            queue: TaskQueue::new(),
            multi_threading: AtomicBool::new(false),
            initialized: false,
        }
    }

    /// Computes which values can be used at all, before anything runs.
    ///
    /// A node is reachable if one of the selected graph outputs or a
    /// side-effect node depends on it. Outputs only count reachable targets,
    /// and everything about unreachable nodes is unused from the start.
    pub fn initialize_static_value_usages(
        &mut self,
        graph: &Graph<'_>,
        graph_outputs: &[GraphOutputSocket],
        side_effect_nodes: &[NodeId],
    ) {
        let node_count = graph.nodes().len();
        let mut reachable = vec![false; node_count];
        let mut selected_outputs = vec![false; graph.node(GRAPH_OUTPUT_NODE).inputs().len()];
        let mut stack: Vec<NodeId> = Vec::new();

        reachable[GRAPH_OUTPUT_NODE.slot()] = true;
        for socket in graph_outputs {
            selected_outputs[socket.index] = true;
            if let Some(origin) = graph.input(*socket).origin() {
                if !reachable[origin.node.slot()] {
                    reachable[origin.node.slot()] = true;
                    stack.push(origin.node);
                }
            }
        }
        for &node in side_effect_nodes {
            if !reachable[node.slot()] {
                reachable[node.slot()] = true;
                stack.push(node);
            }
        }
        while let Some(node) = stack.pop() {
            for input in graph.node(node).inputs() {
                let Some(origin) = input.origin() else {
                    continue;
                };
                if !reachable[origin.node.slot()] {
                    reachable[origin.node.slot()] = true;
                    stack.push(origin.node);
                }
            }
        }

        for (node, mutex) in graph.nodes().iter().zip(&mut self.nodes) {
            let state = mutex.get_mut();
            if reachable[node.id().slot()] {
                for (output, output_state) in node.outputs().iter().zip(&mut state.outputs) {
                    let use_count = output
                        .targets()
                        .iter()
                        .filter(|target| {
                            reachable[target.node.slot()]
                                && (target.node != GRAPH_OUTPUT_NODE || selected_outputs[target.index])
                        })
                        .count();
                    output_state.potential_target_sockets = use_count;
                    if use_count == 0 {
                        output_state.usage = ValueUsage::Unused;
                    }
                }
            } else {
                for input_state in &mut state.inputs {
                    input_state.usage = ValueUsage::Unused;
                }
                for output_state in &mut state.outputs {
                    output_state.potential_target_sockets = 0;
                    output_state.usage = ValueUsage::Unused;
                }
            }
        }
        for &node in side_effect_nodes {
            self.nodes[node.slot()].get_mut().has_side_effects = true;
        }
    }
}
