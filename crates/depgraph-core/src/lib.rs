//! Depgraph Core - lazy functions and lazily evaluated function graphs
//!
//! This crate provides a function abstraction that is lazy on both ends and a
//! graph executor that composes such functions into a bigger one.
//!
//! # Core Abstractions
//!
//! ## Lazy Functions
//!
//! - [`LazyFunction`] - Object-safe trait for functions that only compute used
//!   outputs and request inputs on demand
//! - [`Params`] - What a function sees while it runs: input access, output
//!   publishing, usage hints
//! - [`Context`] - Storage and caller-provided user data
//! - [`ValueUsage`] - Used / Maybe / Unused hint for inputs and outputs
//!
//! ## Values
//!
//! - [`Value`] - Shared, type-erased value flowing between sockets
//! - [`ValueType`] - Copyable descriptor of a socket's Rust type
//!
//! ## Graphs
//!
//! - [`Graph`] - Arena of function nodes and links between their sockets
//! - [`GraphExecutor`] - Evaluates a graph lazily, optionally on several
//!   threads, and is itself a [`LazyFunction`]
//! - [`DotGraph`] - Small Graphviz builder used for debug output
//!
//! ## Calling Functions Directly
//!
//! - [`BasicParams`] - Standalone params over caller-owned slots
//! - [`execute_eagerly`] - Provide every input, get every output
//! - [`execute_on_demand`] - Provide inputs only when they are requested
//!
//! # Example
//!
//! ```rust,ignore
//! use depgraph_core::{Graph, GraphExecutor, ValueType, execute_eagerly, value};
//!
//! let mut graph = Graph::new();
//! let a = graph.add_input(ValueType::of::<i32>(), "a");
//! let node = graph.add_function(&double);
//! let out = graph.add_output(ValueType::of::<i32>(), "out");
//! graph.add_link(a, graph.input_id(node, 0))?;
//! graph.add_link(graph.output_id(node, 0), out)?;
//! graph.update_node_indices();
//!
//! let executor = GraphExecutor::new(&graph);
//! let outputs = execute_eagerly(&executor, vec![value(21_i32)], None);
//! ```
//!
//! # Features
//!
//! - `tracing` - emit graph mutation and scheduling events through `tracing`
//!   and enable [`TracingLogger`](executor::TracingLogger).

pub mod dot;
pub mod executor;
pub mod function;
pub mod graph;
pub mod params;
pub mod value;

pub use dot::DotGraph;
pub use executor::{ExecutorLogger, ExecutorOptions, GraphExecutor, SideEffectProvider, StaticSideEffects};
pub use function::{Input, LazyFunction, Output, Storage, ValueUsage};
pub use graph::{
    DefaultDotOptions, GraphError, Graph, GraphInputSocket, GraphOutputSocket, InputSocketId, NodeId,
    OutputSocketId, ToDotOptions,
};
pub use params::{
    BasicParams, Context, LocalUserData, Params, ParamsBackend, UserData, execute_eagerly, execute_on_demand,
};
pub use value::{Value, ValueType, value};
