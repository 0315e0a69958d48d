//! Demo functions and graphs used by `eval` and `dot`.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context as _, bail};
use clap::ValueEnum;
use depgraph_core::executor::{ExecutorLogger, TracingLogger};
use depgraph_core::graph::SocketRef;
use depgraph_core::{
    Context, Graph, GraphExecutor, Input, LazyFunction, NodeId, Output, Params, Value, ValueType, ValueUsage, value,
};

fn number() -> ValueType {
    ValueType::debug::<f64>()
}

fn flag() -> ValueType {
    ValueType::debug::<bool>()
}

/// Binary arithmetic operator.
#[derive(Clone, Copy, Debug)]
pub enum Op {
    Add,
    Multiply,
}

/// `a <op> b` on `f64`.
pub struct BinaryOp {
    op: Op,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
}

impl BinaryOp {
    pub fn new(op: Op) -> Self {
        Self {
            op,
            inputs: vec![Input::new("a", number()), Input::new("b", number())],
            outputs: vec![Output::new("result", number())],
        }
    }
}

impl LazyFunction for BinaryOp {
    fn name(&self) -> String {
        match self.op {
            Op::Add => "Add".to_string(),
            Op::Multiply => "Multiply".to_string(),
        }
    }
    fn inputs(&self) -> &[Input] {
        &self.inputs
    }
    fn outputs(&self) -> &[Output] {
        &self.outputs
    }
    fn execute_impl(&self, params: &Params<'_>, _context: &mut Context<'_>) {
        let a: f64 = params.get_input(0);
        let b: f64 = params.get_input(1);
        let result = match self.op {
            Op::Add => a + b,
            Op::Multiply => a * b,
        };
        params.set_output(0, result);
    }
}

/// `x * x`.
pub struct Square {
    inputs: Vec<Input>,
    outputs: Vec<Output>,
}

impl Square {
    pub fn new() -> Self {
        Self {
            inputs: vec![Input::new("x", number())],
            outputs: vec![Output::new("squared", number())],
        }
    }
}

impl LazyFunction for Square {
    fn name(&self) -> String {
        "Square".to_string()
    }
    fn inputs(&self) -> &[Input] {
        &self.inputs
    }
    fn outputs(&self) -> &[Output] {
        &self.outputs
    }
    fn execute_impl(&self, params: &Params<'_>, _context: &mut Context<'_>) {
        let x: f64 = params.get_input(0);
        params.set_output(0, x * x);
    }
}

/// Forwards one of two inputs. Only the selected branch is requested.
pub struct Switch {
    inputs: Vec<Input>,
    outputs: Vec<Output>,
}

impl Switch {
    pub fn new() -> Self {
        Self {
            inputs: vec![
                Input::new("condition", flag()),
                Input::with_usage("true", number(), ValueUsage::Maybe),
                Input::with_usage("false", number(), ValueUsage::Maybe),
            ],
            outputs: vec![Output::new("value", number())],
        }
    }
}

impl LazyFunction for Switch {
    fn name(&self) -> String {
        "Switch".to_string()
    }
    fn inputs(&self) -> &[Input] {
        &self.inputs
    }
    fn outputs(&self) -> &[Output] {
        &self.outputs
    }
    fn execute_impl(&self, params: &Params<'_>, _context: &mut Context<'_>) {
        let condition: bool = params.get_input(0);
        let (selected, unused) = if condition { (1, 2) } else { (2, 1) };
        params.set_input_unused(unused);
        if let Some(v) = params.try_get_input_or_request::<f64>(selected) {
            params.set_output(0, v);
        }
    }
}

/// Functions shared by all demo graphs.
pub struct Functions {
    add: BinaryOp,
    multiply: BinaryOp,
    square: Square,
    switch: Switch,
}

impl Functions {
    pub fn new() -> Self {
        Self {
            add: BinaryOp::new(Op::Add),
            multiply: BinaryOp::new(Op::Multiply),
            square: Square::new(),
            switch: Switch::new(),
        }
    }
}

/// The demo graphs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Demo {
    /// `(a + b) * c`
    Arith,
    /// `condition ? a * a : b + b`, evaluating only one branch
    Switch,
    /// `arith(x, x, 2) + 1` with the arith graph as a nested executor
    Nested,
}

/// `(a + b) * c`.
pub fn arith_graph(functions: &Functions) -> anyhow::Result<Graph<'_>> {
    let mut graph = Graph::new();
    let a = graph.add_input(number(), "a");
    let b = graph.add_input(number(), "b");
    let c = graph.add_input(number(), "c");
    let out = graph.add_output(number(), "result");
    let add = graph.add_function(&functions.add);
    let multiply = graph.add_function(&functions.multiply);
    graph.add_link(a, graph.input_id(add, 0))?;
    graph.add_link(b, graph.input_id(add, 1))?;
    graph.add_link(graph.output_id(add, 0), graph.input_id(multiply, 0))?;
    graph.add_link(c, graph.input_id(multiply, 1))?;
    graph.add_link(graph.output_id(multiply, 0), out)?;
    graph.update_node_indices();
    Ok(graph)
}

fn switch_graph(functions: &Functions) -> anyhow::Result<Graph<'_>> {
    let mut graph = Graph::new();
    let condition = graph.add_input(flag(), "condition");
    let a = graph.add_input(number(), "a");
    let b = graph.add_input(number(), "b");
    let out = graph.add_output(number(), "value");
    let square = graph.add_function(&functions.square);
    let double = graph.add_function(&functions.add);
    let switch = graph.add_function(&functions.switch);
    graph.add_link(a, graph.input_id(square, 0))?;
    graph.add_link(b, graph.input_id(double, 0))?;
    graph.add_link(b, graph.input_id(double, 1))?;
    graph.add_link(condition, graph.input_id(switch, 0))?;
    graph.add_link(graph.output_id(square, 0), graph.input_id(switch, 1))?;
    graph.add_link(graph.output_id(double, 0), graph.input_id(switch, 2))?;
    graph.add_link(graph.output_id(switch, 0), out)?;
    graph.update_node_indices();
    Ok(graph)
}

fn nested_graph<'a>(functions: &'a Functions, arith: &'a GraphExecutor<'a>) -> anyhow::Result<Graph<'a>> {
    let mut graph = Graph::new();
    let x = graph.add_input(number(), "x");
    let out = graph.add_output(number(), "result");
    let inner = graph.add_function(arith);
    let add = graph.add_function(&functions.add);
    graph.add_link(x, graph.input_id(inner, 0))?;
    graph.add_link(x, graph.input_id(inner, 1))?;
    graph.set_default_value(graph.input_id(inner, 2), value(2.0_f64))?;
    graph.add_link(graph.output_id(inner, 0), graph.input_id(add, 0))?;
    graph.set_default_value(graph.input_id(add, 1), value(1.0_f64))?;
    graph.add_link(graph.output_id(add, 0), out)?;
    graph.update_node_indices();
    Ok(graph)
}

impl Demo {
    /// Builds the graph. `arith` is the executor nested by [`Demo::Nested`].
    pub fn build<'a>(self, functions: &'a Functions, arith: &'a GraphExecutor<'a>) -> anyhow::Result<Graph<'a>> {
        match self {
            Demo::Arith => arith_graph(functions),
            Demo::Switch => switch_graph(functions),
            Demo::Nested => nested_graph(functions, arith),
        }
    }

    /// Value used for an input the user did not set.
    pub fn default_input(self, name: &str) -> &'static str {
        match name {
            "a" => "1",
            "b" => "2",
            "c" => "3",
            "x" => "4",
            "condition" => "true",
            _ => "0",
        }
    }
}

/// Parses `text` into a value of `value_type`.
pub fn parse_value(value_type: ValueType, text: &str) -> anyhow::Result<Value> {
    if value_type.is::<bool>() {
        let v: bool = text.parse().with_context(|| format!("'{text}' is not true or false"))?;
        Ok(value(v))
    } else if value_type.is::<f64>() {
        let v: f64 = text.parse().with_context(|| format!("'{text}' is not a number"))?;
        Ok(value(v))
    } else {
        bail!("inputs of type {value_type} cannot be given on the command line")
    }
}

/// Counts node executions and forwards socket values to `tracing` when
/// asked to.
pub struct EvalLogger {
    executions: Vec<AtomicUsize>,
    log_socket_values: bool,
}

impl EvalLogger {
    pub fn new(graph: &Graph<'_>, log_socket_values: bool) -> Self {
        Self {
            executions: graph.nodes().iter().map(|_| AtomicUsize::new(0)).collect(),
            log_socket_values,
        }
    }

    /// How often `node` started executing.
    pub fn executions(&self, node: NodeId) -> usize {
        self.executions
            .get(node.index() as usize)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }
}

impl ExecutorLogger for EvalLogger {
    fn log_socket_value(&self, graph: &Graph<'_>, socket: SocketRef, value: &Value) {
        if self.log_socket_values {
            TracingLogger.log_socket_value(graph, socket, value);
        }
    }

    fn log_before_node_execute(&self, graph: &Graph<'_>, node: NodeId) {
        if let Some(count) = self.executions.get(node.index() as usize) {
            count.fetch_add(1, Ordering::Relaxed);
        }
        TracingLogger.log_before_node_execute(graph, node);
    }

    fn dump_when_outputs_are_missing(
        &self,
        graph: &Graph<'_>,
        node: NodeId,
        missing: &[depgraph_core::OutputSocketId],
    ) {
        TracingLogger.dump_when_outputs_are_missing(graph, node, missing);
    }
}
