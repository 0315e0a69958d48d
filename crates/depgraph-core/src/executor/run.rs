//! The scheduling algorithm of one executor round.
//!
//! # Locking
//!
//! Every node state sits behind its own mutex. A thread holds at most one
//! node lock at a time. Notifications that have to lock another node are
//! collected in a [`LockedNode`] and sent after the lock is released. A node
//! is never locked while its function runs, which lets a node forward values
//! into its own inputs.

use std::sync::atomic::Ordering;
use std::thread;

use crossbeam_deque::{Stealer, Worker};

use crate::function::{self, LazyFunction, Storage, ValueUsage};
use crate::graph::{
    GRAPH_INPUT_NODE, GRAPH_OUTPUT_NODE, Graph, InputSocketId, NodeId, OutputSocketId, SocketRef,
};
use crate::params::{Context, LocalUserData, Params, ParamsBackend, UserData};
use crate::value::Value;

use super::GraphExecutor;
use super::queue::TaskQueue;
use super::state::{ExecutionState, NodeScheduleState, NodeState};

/// A node state while its mutex is held, plus notifications to send once it
/// is released.
pub(crate) struct LockedNode<'l> {
    node: NodeId,
    state: &'l mut NodeState,
    delayed_required_outputs: Vec<OutputSocketId>,
    delayed_unused_outputs: Vec<OutputSocketId>,
}

/// One executor round over a shared [`ExecutionState`].
pub(crate) struct Run<'r> {
    pub executor: &'r GraphExecutor<'r>,
    pub state: &'r ExecutionState,
    pub params: &'r Params<'r>,
    pub user_data: Option<&'r dyn UserData>,
}

impl<'r> Run<'r> {
    fn graph(&self) -> &'r Graph<'r> {
        self.executor.graph
    }

    // --- Entry points ---

    /// Runs one round: set up on the first call, pick up new output usages
    /// and newly provided inputs, then drain the queue.
    pub fn execute_round(
        &self,
        is_first_execution: bool,
        side_effect_nodes: &[NodeId],
        local_user_data: Option<&dyn LocalUserData>,
    ) {
        if is_first_execution {
            self.set_always_unused_graph_inputs();
            self.set_defaulted_graph_outputs();
            for &node in side_effect_nodes {
                self.with_locked_node(node, |locked| self.schedule_node(locked, false));
            }
        }
        self.schedule_for_new_output_usages();
        self.forward_newly_provided_inputs();
        self.run_tasks(local_user_data);
    }

    fn set_always_unused_graph_inputs(&self) {
        let unused: Vec<usize> = {
            let state = self.state.nodes[GRAPH_INPUT_NODE.slot()].lock();
            self.executor
                .graph_inputs
                .iter()
                .enumerate()
                .filter(|(_, socket)| state.outputs[socket.index].usage == ValueUsage::Unused)
                .map(|(i, _)| i)
                .collect()
        };
        for i in unused {
            self.params.set_input_unused(i);
        }
    }

    fn set_defaulted_graph_outputs(&self) {
        let graph = self.graph();
        for (i, &socket) in self.executor.graph_outputs.iter().enumerate() {
            let input = graph.input(socket);
            if input.origin().is_some() {
                continue;
            }
            let Some(default) = input.default_value() else {
                debug_assert!(false, "graph output {i} is neither linked nor has a default value");
                continue;
            };
            if let Some(logger) = self.executor.logger {
                logger.log_socket_value(graph, SocketRef::Input(socket), default);
            }
            if !self.params.output_was_set(i) {
                self.params.set_output_value(i, default.clone());
            }
        }
    }

    fn schedule_for_new_output_usages(&self) {
        for (i, &socket) in self.executor.graph_outputs.iter().enumerate() {
            if self.params.output_was_set(i) {
                continue;
            }
            match self.params.get_output_usage(i) {
                ValueUsage::Maybe => {}
                ValueUsage::Used => {
                    self.with_locked_node(GRAPH_OUTPUT_NODE, |locked| {
                        self.set_input_required(locked, socket.index);
                    });
                }
                ValueUsage::Unused => {
                    self.with_locked_node(GRAPH_OUTPUT_NODE, |locked| {
                        self.set_input_unused(locked, socket.index);
                    });
                }
            }
        }
    }

    fn forward_newly_provided_inputs(&self) {
        for (i, &socket) in self.executor.graph_inputs.iter().enumerate() {
            let loaded = &self.state.loaded_inputs[i];
            if loaded.load(Ordering::Acquire) {
                continue;
            }
            let Some(value) = self.params.try_get_input_data(i) else {
                continue;
            };
            if loaded.swap(true, Ordering::AcqRel) {
                continue;
            }
            self.forward_value_to_linked_inputs(socket, value);
        }
    }

    // --- Draining ---

    fn run_tasks(&self, local_user_data: Option<&dyn LocalUserData>) {
        loop {
            if self.should_run_in_parallel() {
                self.run_in_parallel(local_user_data);
                return;
            }
            let Some(node) = self.state.queue.try_pop() else {
                return;
            };
            let _finish = FinishOnDrop(&self.state.queue);
            self.run_node_task(node, local_user_data);
        }
    }

    fn should_run_in_parallel(&self) -> bool {
        self.executor.options.threads > 1
            && self.state.queue.len() > 1
            && self.try_enable_multi_threading()
    }

    /// Allows this round to use multiple threads if the caller permits it.
    pub fn try_enable_multi_threading(&self) -> bool {
        if self.state.multi_threading.load(Ordering::Acquire) {
            return true;
        }
        if self.executor.options.threads <= 1 || !self.params.try_enable_multi_threading() {
            return false;
        }
        self.state.multi_threading.store(true, Ordering::Release);
        true
    }

    fn run_in_parallel(&self, local_user_data: Option<&dyn LocalUserData>) {
        let threads = self.executor.options.threads;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "executor {}: running {} queued nodes on {threads} threads",
            self.executor.name,
            self.state.queue.len()
        );
        let (mut workers, stealers) = TaskQueue::workers(threads);
        let Some(own) = workers.pop() else {
            return;
        };
        let stealers = &stealers;
        thread::scope(|scope| {
            for (worker_id, local) in workers.into_iter().enumerate() {
                scope.spawn(move || {
                    let data = self.user_data.and_then(|data| data.get_local());
                    self.worker_loop(worker_id, &local, stealers, data.as_deref());
                });
            }
            self.worker_loop(threads - 1, &own, stealers, local_user_data);
        });
    }

    /// Runs nodes until nothing is queued and no other worker is running a
    /// node that could schedule more.
    fn worker_loop(
        &self,
        worker_id: usize,
        local: &Worker<NodeId>,
        stealers: &[Stealer<NodeId>],
        local_user_data: Option<&dyn LocalUserData>,
    ) {
        let queue = &self.state.queue;
        loop {
            let Some(node) = queue.pop_for(local, stealers, worker_id) else {
                if queue.is_idle() {
                    return;
                }
                thread::yield_now();
                continue;
            };
            let _finish = FinishOnDrop(queue);
            self.run_node_task(node, local_user_data);
        }
    }

    // --- Node execution ---

    fn run_node_task(&self, node: NodeId, local_user_data: Option<&dyn LocalUserData>) {
        let graph = self.graph();
        let Some(function) = graph.node(node).lazy_function() else {
            debug_assert!(false, "interface node {node} was scheduled");
            return;
        };
        let allow_missing = function.allow_missing_requested_inputs();

        let prepared = self.with_locked_node(node, |locked| {
            debug_assert_eq!(locked.state.schedule_state, NodeScheduleState::Scheduled);
            locked.state.schedule_state = NodeScheduleState::Running;
            if locked.state.node_has_finished {
                return None;
            }

            let mut required_uncomputed_output_exists = false;
            for output in &mut locked.state.outputs {
                output.usage_for_execution = output.usage;
                if output.usage == ValueUsage::Used && !output.has_been_computed {
                    required_uncomputed_output_exists = true;
                }
            }
            if !required_uncomputed_output_exists && !locked.state.has_side_effects {
                return None;
            }

            if !locked.state.always_used_inputs_requested {
                for (i, input) in function.inputs().iter().enumerate() {
                    let linked = graph.input(InputSocketId { node, index: i }).origin().is_some();
                    if input.usage == ValueUsage::Used && linked {
                        self.set_input_required(locked, i);
                    }
                }
                locked.state.always_used_inputs_requested = true;
            }

            for input in &mut locked.state.inputs {
                if input.was_ready_for_execution {
                    continue;
                }
                if input.value.is_some() {
                    input.was_ready_for_execution = true;
                    continue;
                }
                if !allow_missing && input.usage == ValueUsage::Used {
                    return None;
                }
            }

            let is_first_execution = !locked.state.storage_and_defaults_initialized;
            if is_first_execution {
                self.load_unlinked_inputs(node, locked.state);
                locked.state.storage_and_defaults_initialized = true;
            }
            Some((is_first_execution, locked.state.storage.take()))
        });

        let executed = prepared.map(|(is_first_execution, storage)| {
            let mut storage = if is_first_execution { function.init_storage() } else { storage };
            self.execute_node(node, function, &mut storage, local_user_data);
            storage
        });

        self.with_locked_node(node, |locked| {
            if let Some(storage) = executed {
                locked.state.storage = storage;
                self.check_expected_outputs(locked);
            }
            self.finish_node_if_possible(locked, function);
            let reschedule_requested =
                locked.state.schedule_state == NodeScheduleState::RunningAndRescheduled;
            locked.state.schedule_state = NodeScheduleState::NotScheduled;
            if reschedule_requested && !locked.state.node_has_finished {
                self.schedule_node(locked, false);
            }
        });
    }

    fn load_unlinked_inputs(&self, node: NodeId, state: &mut NodeState) {
        let graph = self.graph();
        for (index, input_state) in state.inputs.iter_mut().enumerate() {
            let id = InputSocketId { node, index };
            let socket = graph.input(id);
            if socket.origin().is_some() {
                continue;
            }
            let Some(default) = socket.default_value() else {
                debug_assert!(false, "unlinked input {} has no default value", graph.input_detailed_name(id));
                continue;
            };
            if let Some(logger) = self.executor.logger {
                logger.log_socket_value(graph, SocketRef::Input(id), default);
            }
            debug_assert!(input_state.value.is_none());
            input_state.value = Some(default.clone());
            input_state.was_ready_for_execution = true;
        }
    }

    fn execute_node(
        &self,
        node: NodeId,
        function: &dyn LazyFunction,
        storage: &mut Option<Storage>,
        local_user_data: Option<&dyn LocalUserData>,
    ) {
        let backend = NodeParams { run: self, node };
        let params = Params::new(function, &backend, self.state.multi_threading.load(Ordering::Acquire));
        let mut context = Context {
            storage: storage.as_deref_mut(),
            user_data: self.user_data,
            local_user_data,
        };
        let graph = self.graph();
        if let Some(logger) = self.executor.logger {
            logger.log_before_node_execute(graph, node);
        }
        function::execute(function, &params, &mut context);
        if let Some(logger) = self.executor.logger {
            logger.log_after_node_execute(graph, node);
        }
    }

    /// A node that is not waiting for anything must have computed every
    /// output that was required when it started.
    fn check_expected_outputs(&self, locked: &LockedNode<'_>) {
        if locked.state.missing_required_inputs > 0
            || locked.state.schedule_state == NodeScheduleState::RunningAndRescheduled
        {
            return;
        }
        let missing: Vec<OutputSocketId> = locked
            .state
            .outputs
            .iter()
            .enumerate()
            .filter(|(_, output)| output.usage_for_execution == ValueUsage::Used && !output.has_been_computed)
            .map(|(index, _)| OutputSocketId {
                node: locked.node,
                index,
            })
            .collect();
        if missing.is_empty() {
            return;
        }
        if let Some(logger) = self.executor.logger {
            logger.dump_when_outputs_are_missing(self.graph(), locked.node, &missing);
        }
        debug_assert!(
            false,
            "node {} did not compute required outputs",
            self.graph().node(locked.node).name()
        );
    }

    fn finish_node_if_possible(&self, locked: &mut LockedNode<'_>, function: &dyn LazyFunction) {
        let state = &*locked.state;
        if state.node_has_finished
            || state.missing_required_inputs > 0
            || state.schedule_state == NodeScheduleState::RunningAndRescheduled
        {
            return;
        }
        if state
            .outputs
            .iter()
            .any(|output| output.usage != ValueUsage::Unused && !output.has_been_computed)
        {
            return;
        }
        if state
            .inputs
            .iter()
            .any(|input| input.usage == ValueUsage::Used && !input.was_ready_for_execution)
        {
            return;
        }

        locked.state.node_has_finished = true;
        for index in 0..locked.state.inputs.len() {
            match locked.state.inputs[index].usage {
                ValueUsage::Maybe => self.set_input_unused(locked, index),
                ValueUsage::Used => locked.state.inputs[index].value = None,
                ValueUsage::Unused => {}
            }
        }
        if let Some(storage) = locked.state.storage.take() {
            function.destruct_storage(Some(storage));
        }
    }

    // --- Usage propagation ---

    /// Marks an input as required. Returns the value if it is available.
    fn set_input_required(&self, locked: &mut LockedNode<'_>, index: usize) -> Option<Value> {
        let input = &mut locked.state.inputs[index];
        debug_assert_ne!(input.usage, ValueUsage::Unused, "unused input requested");
        if let Some(value) = &input.value {
            input.was_ready_for_execution = true;
            return Some(value.clone());
        }
        if input.usage == ValueUsage::Used {
            return None;
        }
        let Some(origin) = self.graph().input(InputSocketId { node: locked.node, index }).origin() else {
            debug_assert!(false, "unlinked input requested before its default was loaded");
            return None;
        };
        input.usage = ValueUsage::Used;
        locked.state.missing_required_inputs += 1;
        locked.delayed_required_outputs.push(origin);
        None
    }

    fn set_input_unused(&self, locked: &mut LockedNode<'_>, index: usize) {
        let input = &mut locked.state.inputs[index];
        debug_assert_ne!(input.usage, ValueUsage::Used, "required input marked unused");
        if input.usage == ValueUsage::Unused {
            return;
        }
        input.usage = ValueUsage::Unused;
        input.value = None;
        if input.was_ready_for_execution {
            return;
        }
        if let Some(origin) = self.graph().input(InputSocketId { node: locked.node, index }).origin() {
            locked.delayed_unused_outputs.push(origin);
        }
    }

    fn notify_output_required(&self, socket: OutputSocketId) {
        if socket.node == GRAPH_INPUT_NODE {
            let Some(i) = self.executor.graph_input_index(socket.index) else {
                return;
            };
            self.with_locked_node(GRAPH_INPUT_NODE, |locked| {
                locked.state.outputs[socket.index].usage = ValueUsage::Used;
            });
            let loaded = &self.state.loaded_inputs[i];
            if loaded.load(Ordering::Acquire) {
                return;
            }
            let Some(value) = self.params.try_get_input_data_or_request(i) else {
                return;
            };
            if loaded.swap(true, Ordering::AcqRel) {
                return;
            }
            self.forward_value_to_linked_inputs(socket, value);
            return;
        }

        self.with_locked_node(socket.node, |locked| {
            let output = &mut locked.state.outputs[socket.index];
            if output.usage == ValueUsage::Used {
                return;
            }
            output.usage = ValueUsage::Used;
            self.schedule_node(locked, false);
        });
    }

    fn notify_output_unused(&self, socket: OutputSocketId) {
        let became_unused = self.with_locked_node(socket.node, |locked| {
            let output = &mut locked.state.outputs[socket.index];
            debug_assert!(output.potential_target_sockets > 0);
            output.potential_target_sockets = output.potential_target_sockets.saturating_sub(1);
            if output.potential_target_sockets > 0 || output.usage != ValueUsage::Maybe {
                return false;
            }
            output.usage = ValueUsage::Unused;
            if socket.node != GRAPH_INPUT_NODE {
                // Running the node early releases its inputs sooner.
                self.schedule_node(locked, true);
            }
            true
        });
        if became_unused && socket.node == GRAPH_INPUT_NODE {
            if let Some(i) = self.executor.graph_input_index(socket.index) {
                self.params.set_input_unused(i);
            }
        }
    }

    // --- Values ---

    fn forward_value_to_linked_inputs(&self, from: OutputSocketId, value: Value) {
        let graph = self.graph();
        let logger = self.executor.logger;
        if let Some(logger) = logger {
            logger.log_socket_value(graph, SocketRef::Output(from), &value);
        }
        for &target in graph.output(from).targets() {
            if let Some(logger) = logger {
                logger.log_socket_value(graph, SocketRef::Input(target), &value);
            }
            if target.node == GRAPH_OUTPUT_NODE {
                if let Some(i) = self.executor.graph_output_index(target.index) {
                    if self.params.get_output_usage(i) != ValueUsage::Unused && !self.params.output_was_set(i) {
                        self.params.set_output_value(i, value.clone());
                    }
                }
                continue;
            }
            let allow_missing = graph
                .node(target.node)
                .lazy_function()
                .is_some_and(|f| f.allow_missing_requested_inputs());
            self.with_locked_node(target.node, |locked| {
                let input = &mut locked.state.inputs[target.index];
                if input.usage == ValueUsage::Unused {
                    return;
                }
                debug_assert!(input.value.is_none(), "input {target} received a value twice");
                debug_assert!(!input.was_ready_for_execution);
                input.value = Some(value.clone());
                if input.usage != ValueUsage::Used {
                    return;
                }
                locked.state.missing_required_inputs -= 1;
                if locked.state.missing_required_inputs == 0 || allow_missing {
                    self.schedule_node(locked, false);
                }
            });
        }
    }

    // --- Locking and scheduling ---

    fn with_locked_node<R>(&self, node: NodeId, f: impl FnOnce(&mut LockedNode<'_>) -> R) -> R {
        let (result, required, unused) = {
            let mut guard = self.state.nodes[node.slot()].lock();
            let mut locked = LockedNode {
                node,
                state: &mut guard,
                delayed_required_outputs: Vec::new(),
                delayed_unused_outputs: Vec::new(),
            };
            let result = f(&mut locked);
            (result, locked.delayed_required_outputs, locked.delayed_unused_outputs)
        };
        for socket in required {
            self.notify_output_required(socket);
        }
        for socket in unused {
            self.notify_output_unused(socket);
        }
        result
    }

    fn schedule_node(&self, locked: &mut LockedNode<'_>, is_priority: bool) {
        debug_assert!(self.graph().node(locked.node).is_function());
        match locked.state.schedule_state {
            NodeScheduleState::NotScheduled => {
                locked.state.schedule_state = NodeScheduleState::Scheduled;
                self.state.queue.push(locked.node, is_priority);
            }
            NodeScheduleState::Running => {
                locked.state.schedule_state = NodeScheduleState::RunningAndRescheduled;
            }
            NodeScheduleState::Scheduled | NodeScheduleState::RunningAndRescheduled => {}
        }
    }
}

/// Marks a popped node as done even if running it panicked, so the other
/// workers do not spin forever.
struct FinishOnDrop<'q>(&'q TaskQueue);

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Params passed to a function node while it runs inside the executor.
struct NodeParams<'a> {
    run: &'a Run<'a>,
    node: NodeId,
}

impl NodeParams<'_> {
    fn lock(&self) -> parking_lot::MutexGuard<'_, NodeState> {
        self.run.state.nodes[self.node.slot()].lock()
    }
}

impl ParamsBackend for NodeParams<'_> {
    fn try_get_input_data_impl(&self, index: usize) -> Option<Value> {
        let state = self.lock();
        let input = &state.inputs[index];
        if input.was_ready_for_execution {
            input.value.clone()
        } else {
            None
        }
    }

    fn try_get_input_data_or_request_impl(&self, index: usize) -> Option<Value> {
        self.run.with_locked_node(self.node, |locked| {
            let input = &locked.state.inputs[index];
            if input.was_ready_for_execution {
                return input.value.clone();
            }
            self.run.set_input_required(locked, index)
        })
    }

    fn set_output_value_impl(&self, index: usize, value: Value) {
        {
            let mut state = self.lock();
            let output = &mut state.outputs[index];
            debug_assert!(!output.has_been_computed);
            output.has_been_computed = true;
        }
        self.run.forward_value_to_linked_inputs(
            OutputSocketId {
                node: self.node,
                index,
            },
            value,
        );
    }

    fn output_was_set_impl(&self, index: usize) -> bool {
        self.lock().outputs[index].has_been_computed
    }

    fn get_output_usage_impl(&self, index: usize) -> ValueUsage {
        self.lock().outputs[index].usage_for_execution
    }

    fn set_input_unused_impl(&self, index: usize) {
        self.run
            .with_locked_node(self.node, |locked| self.run.set_input_unused(locked, index));
    }

    fn try_enable_multi_threading_impl(&self) -> bool {
        self.run.try_enable_multi_threading()
    }
}
