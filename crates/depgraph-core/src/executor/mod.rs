//! Lazy evaluation of a [`Graph`].
//!
//! [`GraphExecutor`] wraps a graph into a [`LazyFunction`]: its inputs are
//! graph-input sockets, its outputs graph-output sockets. Executing it runs
//! only the nodes whose outputs are needed (plus side-effect nodes), requests
//! graph inputs from the caller only when some node needs them, and returns
//! early when it has to wait for the caller. Since the executor is itself a
//! lazy function, it can be nested inside another graph.
//!
//! # Architecture
//!
//! - All per-evaluation state lives in the executor's storage, created by
//!   [`LazyFunction::init_storage`]. One executor can therefore serve several
//!   concurrent evaluations.
//! - Each node has a mutex-protected state (input/output usage, values,
//!   schedule state). Usage flows upstream (an output becomes used when a
//!   target requires it, unused when every target gave up on it), values
//!   flow downstream.
//! - Scheduled nodes go into a shared queue. The queue is drained on the
//!   calling thread until more than one node is ready and the caller allows
//!   multi-threading; then a scoped worker pool takes over until no node is
//!   queued or running.
//!
//! # Example
//!
//! ```rust,ignore
//! let executor = GraphExecutor::new(&graph).options(ExecutorOptions::with_threads(4));
//! let outputs = execute_eagerly(&executor, vec![value(3_i32)], None);
//! ```

mod logger;
mod queue;
mod run;
mod side_effects;
mod state;

use crate::function::{Input, LazyFunction, Output, Storage, ValueUsage};
use crate::graph::{GRAPH_INPUT_NODE, GRAPH_OUTPUT_NODE, Graph, GraphInputSocket, GraphOutputSocket, NodeId};
use crate::params::{Context, LocalUserData, Params, UserData};

#[cfg(feature = "tracing")]
pub use logger::TracingLogger;
pub use logger::ExecutorLogger;
pub use side_effects::{SideEffectProvider, StaticSideEffects};

use run::Run;
use state::ExecutionState;

/// Tuning options of a [`GraphExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Upper bound of threads used by one evaluation, including the calling
    /// thread. `1` keeps evaluation on the calling thread.
    pub threads: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self { threads: 1 }
    }
}

impl ExecutorOptions {
    /// Uses up to `threads` threads.
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    /// Uses as many threads as the machine offers.
    pub fn available_parallelism() -> Self {
        Self::with_threads(std::thread::available_parallelism().map_or(1, usize::from))
    }
}

/// Evaluates a [`Graph`] lazily. See the [module docs](self).
pub struct GraphExecutor<'a> {
    graph: &'a Graph<'a>,
    graph_inputs: Vec<GraphInputSocket>,
    graph_outputs: Vec<GraphOutputSocket>,
    /// Executor input index of each socket on the graph-input node.
    graph_input_index_by_socket: Vec<Option<usize>>,
    /// Executor output index of each socket on the graph-output node.
    graph_output_index_by_socket: Vec<Option<usize>>,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    side_effect_provider: Option<&'a dyn SideEffectProvider>,
    logger: Option<&'a dyn ExecutorLogger>,
    options: ExecutorOptions,
    name: String,
}

impl<'a> GraphExecutor<'a> {
    /// Exposes every graph input and output, in creation order.
    pub fn new(graph: &'a Graph<'a>) -> Self {
        Self::with_interface(graph, graph.graph_inputs(), graph.graph_outputs())
    }

    /// Exposes the given graph sockets as the executor's inputs and outputs.
    ///
    /// The graph's node indices have to be up to date, see
    /// [`Graph::update_node_indices`].
    ///
    /// # Panics
    ///
    /// Panics if a socket does not belong to the matching interface node.
    pub fn with_interface(
        graph: &'a Graph<'a>,
        graph_inputs: Vec<GraphInputSocket>,
        graph_outputs: Vec<GraphOutputSocket>,
    ) -> Self {
        debug_assert!(
            graph.node_indices_are_valid(),
            "node indices are stale, call update_node_indices first"
        );
        let input_node = graph.node(GRAPH_INPUT_NODE);
        let output_node = graph.node(GRAPH_OUTPUT_NODE);

        let mut graph_input_index_by_socket = vec![None; input_node.outputs().len()];
        let inputs = graph_inputs
            .iter()
            .enumerate()
            .map(|(i, socket)| {
                assert_eq!(socket.node, GRAPH_INPUT_NODE, "{socket} is not a graph input");
                graph_input_index_by_socket[socket.index] = Some(i);
                Input::with_usage(
                    input_node.output_name(socket.index),
                    graph.output(*socket).value_type(),
                    ValueUsage::Maybe,
                )
            })
            .collect();

        let mut graph_output_index_by_socket = vec![None; output_node.inputs().len()];
        let outputs = graph_outputs
            .iter()
            .enumerate()
            .map(|(i, socket)| {
                assert_eq!(socket.node, GRAPH_OUTPUT_NODE, "{socket} is not a graph output");
                graph_output_index_by_socket[socket.index] = Some(i);
                Output::new(output_node.input_name(socket.index), graph.input(*socket).value_type())
            })
            .collect();

        Self {
            graph,
            graph_inputs,
            graph_outputs,
            graph_input_index_by_socket,
            graph_output_index_by_socket,
            inputs,
            outputs,
            side_effect_provider: None,
            logger: None,
            options: ExecutorOptions::default(),
            name: "Graph Executor".to_string(),
        }
    }

    /// Sets the provider of side-effect nodes.
    #[must_use]
    pub fn side_effect_provider(mut self, provider: &'a dyn SideEffectProvider) -> Self {
        self.side_effect_provider = Some(provider);
        self
    }

    /// Sets the evaluation logger.
    #[must_use]
    pub fn logger(mut self, logger: &'a dyn ExecutorLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Sets the options.
    #[must_use]
    pub fn options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the name reported by [`LazyFunction::name`].
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The evaluated graph.
    pub fn graph(&self) -> &'a Graph<'a> {
        self.graph
    }

    pub(crate) fn graph_input_index(&self, socket_index: usize) -> Option<usize> {
        self.graph_input_index_by_socket.get(socket_index).copied().flatten()
    }

    pub(crate) fn graph_output_index(&self, socket_index: usize) -> Option<usize> {
        self.graph_output_index_by_socket.get(socket_index).copied().flatten()
    }

    fn execute_with_state(
        &self,
        state: &mut ExecutionState,
        params: &Params<'_>,
        user_data: Option<&dyn UserData>,
        local_user_data: Option<&dyn LocalUserData>,
    ) {
        let is_first_execution = !state.initialized;
        let side_effect_nodes: Vec<NodeId> = if is_first_execution {
            let nodes = self
                .side_effect_provider
                .map(|provider| {
                    provider.get_nodes_with_side_effects(&Context {
                        storage: None,
                        user_data,
                        local_user_data,
                    })
                })
                .unwrap_or_default();
            state.initialize_static_value_usages(self.graph, &self.graph_outputs, &nodes);
            state.initialized = true;
            nodes
        } else {
            Vec::new()
        };

        let run = Run {
            executor: self,
            state,
            params,
            user_data,
        };
        run.execute_round(is_first_execution, &side_effect_nodes, local_user_data);
    }

    fn destruct_state(&self, state: ExecutionState) {
        for (node, node_state) in self.graph.nodes().iter().zip(state.nodes) {
            let node_state = node_state.into_inner();
            if let (Some(function), Some(storage)) = (node.lazy_function(), node_state.storage) {
                function.destruct_storage(Some(storage));
            }
        }
    }
}

impl LazyFunction for GraphExecutor<'_> {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    fn init_storage(&self) -> Option<Storage> {
        Some(Box::new(ExecutionState::new(self.graph, self.inputs.len())))
    }

    fn destruct_storage(&self, storage: Option<Storage>) {
        if let Some(state) = storage.and_then(|s| s.downcast::<ExecutionState>().ok()) {
            self.destruct_state(*state);
        }
    }

    fn execute_impl(&self, params: &Params<'_>, context: &mut Context<'_>) {
        let user_data = context.user_data;
        let local_user_data = context.local_user_data;
        match context
            .storage
            .as_deref_mut()
            .and_then(|storage| storage.downcast_mut::<ExecutionState>())
        {
            Some(state) => self.execute_with_state(state, params, user_data, local_user_data),
            None => {
                // Called without storage: evaluate in one go with temporary state.
                let mut state = ExecutionState::new(self.graph, self.inputs.len());
                self.execute_with_state(&mut state, params, user_data, local_user_data);
                self.destruct_state(state);
            }
        }
    }
}
