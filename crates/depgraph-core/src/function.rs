//! The lazy-function abstraction.
//!
//! A [`LazyFunction`] is a computation with declared typed inputs and outputs
//! that supports laziness on both ends:
//!
//! - Only outputs that are actually used have to be computed.
//! - Inputs can be requested on demand, depending on which outputs are used.
//!
//! Because of this, a lazy function may be executed more than once before it
//! has produced everything its caller needs. A switch is the classic example:
//!
//! 1. First execution: the output is used, so the function requests the
//!    condition input and returns.
//! 2. Second execution: the condition is available. The function requests the
//!    one branch input it selects and returns again.
//! 3. Third execution: the branch input arrived and is forwarded to the output.
//!
//! In that sense a lazy function is a small state machine that advances every
//! time it is executed. Any state it needs across executions lives in the
//! storage created by [`LazyFunction::init_storage`].

use std::any::Any;

use crate::params::{Context, Params};
use crate::value::ValueType;

/// Persistent per-context state of a lazy function.
pub type Storage = Box<dyn Any + Send>;

/// Tri-state hint telling whether a value will be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueUsage {
    /// The value is definitely used and therefore has to be computed.
    Used,
    /// It is unknown whether the value will be used. Computing it is fine but
    /// the result may be discarded.
    #[default]
    Maybe,
    /// The value will definitely not be used.
    Unused,
}

/// Describes an input of a [`LazyFunction`].
#[derive(Debug, Clone)]
pub struct Input {
    /// Name used for debugging.
    pub debug_name: String,
    /// Type of the value.
    pub value_type: ValueType,
    /// Static usage of the input.
    ///
    /// When this is [`ValueUsage::Used`], the caller guarantees the value is
    /// available the first time the function is executed, so the function does
    /// not have to check for it.
    pub usage: ValueUsage,
}

impl Input {
    /// Creates an input that is always used.
    pub fn new(debug_name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            debug_name: debug_name.into(),
            value_type,
            usage: ValueUsage::Used,
        }
    }

    /// Creates an input with an explicit static usage.
    pub fn with_usage(debug_name: impl Into<String>, value_type: ValueType, usage: ValueUsage) -> Self {
        Self {
            debug_name: debug_name.into(),
            value_type,
            usage,
        }
    }
}

/// Describes an output of a [`LazyFunction`].
#[derive(Debug, Clone)]
pub struct Output {
    /// Name used for debugging.
    pub debug_name: String,
    /// Type of the value.
    pub value_type: ValueType,
}

impl Output {
    /// Creates an output.
    pub fn new(debug_name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            debug_name: debug_name.into(),
            value_type,
        }
    }
}

/// A function that computes outputs and requests inputs lazily.
///
/// Implementations are referenced, not owned, by graph nodes and may be
/// executed from any thread, hence the `Send + Sync` bound.
pub trait LazyFunction: Send + Sync {
    /// Name of the function, mainly for debugging.
    fn name(&self) -> String {
        "unknown".to_string()
    }

    /// Declared inputs.
    fn inputs(&self) -> &[Input];

    /// Declared outputs.
    fn outputs(&self) -> &[Output];

    /// Name of an input, mainly for debugging.
    fn input_name(&self, index: usize) -> String {
        self.inputs()[index].debug_name.clone()
    }

    /// Name of an output, mainly for debugging.
    fn output_name(&self, index: usize) -> String {
        self.outputs()[index].debug_name.clone()
    }

    /// If true, the function may be executed even when inputs it requested
    /// earlier are not available yet.
    ///
    /// This lets the function make progress and compute outputs that may be
    /// fed back into itself: graphs may contain cycles as long as there are no
    /// actual data dependencies along them.
    fn allow_missing_requested_inputs(&self) -> bool {
        false
    }

    /// Creates the storage passed to every execution in the same context.
    fn init_storage(&self) -> Option<Storage> {
        None
    }

    /// Destroys storage created by [`init_storage`](Self::init_storage).
    fn destruct_storage(&self, storage: Option<Storage>) {
        debug_assert!(storage.is_none(), "{}: storage was not destructed", self.name());
        drop(storage);
    }

    /// Calls `f` with the input indices `output_index` may depend on.
    ///
    /// Every output depends on every input by default.
    fn possible_output_dependencies(&self, output_index: usize, f: &mut dyn FnMut(&[usize])) {
        let _ = output_index;
        let all: Vec<usize> = (0..self.inputs().len()).collect();
        f(&all);
    }

    /// Retrieves inputs and sets outputs through `params`.
    ///
    /// Call through [`execute`] so the input guarantees are checked.
    fn execute_impl(&self, params: &Params<'_>, context: &mut Context<'_>);
}

/// Executes `function`, checking that every always-used input is available.
///
/// After execution the function has either computed all required outputs or
/// is waiting for more inputs.
pub fn execute(function: &dyn LazyFunction, params: &Params<'_>, context: &mut Context<'_>) {
    debug_assert!(
        function.allow_missing_requested_inputs()
            || always_used_inputs_available(function, params),
        "{}: executed without all used inputs",
        function.name()
    );
    function.execute_impl(params, context);
}

/// Returns true if every input declared [`ValueUsage::Used`] is available.
pub fn always_used_inputs_available(function: &dyn LazyFunction, params: &Params<'_>) -> bool {
    function
        .inputs()
        .iter()
        .enumerate()
        .filter(|(_, input)| input.usage == ValueUsage::Used)
        .all(|(i, _)| params.try_get_input_data(i).is_some())
}

/// Collects the result of [`LazyFunction::possible_output_dependencies`].
pub fn output_dependencies(function: &dyn LazyFunction, output_index: usize) -> Vec<usize> {
    let mut result = Vec::new();
    function.possible_output_dependencies(output_index, &mut |indices| {
        result.extend_from_slice(indices);
    });
    result
}
