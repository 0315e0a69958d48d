//! Calling convention between a lazy function and its caller.
//!
//! [`Params`] is what a [`LazyFunction`] sees during one execution: it reads
//! inputs (possibly requesting ones that are not available yet), publishes
//! outputs, and reports inputs it will never read. The caller-specific
//! behavior lives behind [`ParamsBackend`]; `Params` itself only adds the
//! bounds and thread checks.
//!
//! [`BasicParams`] is a standalone backend for calling a function directly,
//! used by [`execute_eagerly`] and [`execute_on_demand`].

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::function::{self, LazyFunction, ValueUsage};
use crate::value::Value;

/// Caller-side implementation of the lazy-function calling convention.
///
/// Methods are only invoked through [`Params`], which validates indices and
/// thread usage before dispatching.
pub trait ParamsBackend: Sync {
    /// Returns the input if it is available.
    fn try_get_input_data_impl(&self, index: usize) -> Option<Value>;
    /// Returns the input if it is available, otherwise requests it.
    fn try_get_input_data_or_request_impl(&self, index: usize) -> Option<Value>;
    /// Publishes an output value.
    fn set_output_value_impl(&self, index: usize, value: Value);
    /// Returns true if the output was published already.
    fn output_was_set_impl(&self, index: usize) -> bool;
    /// Returns how the output will be used by the caller.
    fn get_output_usage_impl(&self, index: usize) -> ValueUsage;
    /// Marks an input as never read.
    fn set_input_unused_impl(&self, index: usize);
    /// Grants multi-threaded access to the params, if possible.
    fn try_enable_multi_threading_impl(&self) -> bool {
        false
    }
}

/// Records which thread may mutate a [`Params`].
///
/// Mutations are confined to the creating thread until multi-threading is
/// enabled, which is a one-way transition.
#[derive(Debug)]
pub struct ThreadAffinity {
    owner: ThreadId,
    multi_threading: AtomicBool,
}

impl ThreadAffinity {
    /// Binds to the current thread.
    pub fn new(allow_multi_threading_initially: bool) -> Self {
        Self {
            owner: thread::current().id(),
            multi_threading: AtomicBool::new(allow_multi_threading_initially),
        }
    }

    /// Returns true once any thread may call mutating methods.
    #[inline]
    pub fn is_multi_threaded(&self) -> bool {
        self.multi_threading.load(Ordering::Acquire)
    }

    /// Allows access from all threads from now on.
    #[inline]
    pub fn enable_multi_threading(&self) {
        self.multi_threading.store(true, Ordering::Release);
    }

    /// Returns true if the current thread may call mutating methods.
    pub fn is_valid_thread(&self) -> bool {
        self.is_multi_threaded() || thread::current().id() == self.owner
    }

    #[inline]
    fn assert_valid_thread(&self) {
        debug_assert!(
            self.is_valid_thread(),
            "params used from a different thread without enabling multi-threading"
        );
    }
}

/// Per-execution interface a [`LazyFunction`] uses to read inputs and write
/// outputs.
pub struct Params<'a> {
    function: &'a dyn LazyFunction,
    backend: &'a dyn ParamsBackend,
    affinity: ThreadAffinity,
}

impl<'a> Params<'a> {
    /// Creates params for one execution of `function`.
    pub fn new(
        function: &'a dyn LazyFunction,
        backend: &'a dyn ParamsBackend,
        allow_multi_threading_initially: bool,
    ) -> Self {
        Self {
            function,
            backend,
            affinity: ThreadAffinity::new(allow_multi_threading_initially),
        }
    }

    /// The function these params were prepared for.
    pub fn function(&self) -> &'a dyn LazyFunction {
        self.function
    }

    /// Returns the input value if it is available already.
    pub fn try_get_input_data(&self, index: usize) -> Option<Value> {
        self.check_input(index);
        self.backend.try_get_input_data_impl(index)
    }

    /// Like [`try_get_input_data`](Self::try_get_input_data), but requests the
    /// input when it is missing. A requested input becomes available in a later
    /// execution unless it is marked unused.
    pub fn try_get_input_data_or_request(&self, index: usize) -> Option<Value> {
        self.check_input(index);
        self.affinity.assert_valid_thread();
        self.backend.try_get_input_data_or_request_impl(index)
    }

    /// Publishes an output. Each output can be set at most once.
    pub fn set_output_value(&self, index: usize, value: Value) {
        self.check_output(index);
        self.affinity.assert_valid_thread();
        debug_assert!(
            self.function.outputs()[index].value_type.matches(&value),
            "{}: output {index} set with wrong type",
            self.function.name()
        );
        debug_assert!(
            !self.backend.output_was_set_impl(index),
            "{}: output {index} set twice",
            self.function.name()
        );
        self.backend.set_output_value_impl(index, value);
    }

    /// Returns true if the output has been set already.
    pub fn output_was_set(&self, index: usize) -> bool {
        self.check_output(index);
        self.backend.output_was_set_impl(index)
    }

    /// Returns how the caller is going to use the output.
    pub fn get_output_usage(&self, index: usize) -> ValueUsage {
        self.check_output(index);
        self.backend.get_output_usage_impl(index)
    }

    /// Tells the caller that the input will not be read.
    ///
    /// Only inputs that are not statically [`ValueUsage::Used`] can become
    /// unused.
    pub fn set_input_unused(&self, index: usize) {
        self.check_input(index);
        self.affinity.assert_valid_thread();
        debug_assert!(
            self.function.inputs()[index].usage != ValueUsage::Used,
            "{}: input {index} is always used",
            self.function.name()
        );
        self.backend.set_input_unused_impl(index);
    }

    /// Tries to allow calling mutating methods from other threads.
    ///
    /// Once granted, multi-threading stays enabled for these params. The
    /// caller is free to refuse, in which case the function has to stay on
    /// the current thread.
    pub fn try_enable_multi_threading(&self) -> bool {
        self.affinity.assert_valid_thread();
        if self.affinity.is_multi_threaded() {
            return true;
        }
        let success = self.backend.try_enable_multi_threading_impl();
        if success {
            self.affinity.enable_multi_threading();
        }
        success
    }

    /// Returns the thread-affinity token of these params.
    pub fn affinity(&self) -> &ThreadAffinity {
        &self.affinity
    }

    // --- Typed helpers ---

    /// Returns a clone of an input that must be available.
    ///
    /// # Panics
    ///
    /// Panics if the input is missing or has a different type.
    pub fn get_input<T: Any + Clone>(&self, index: usize) -> T {
        self.try_get_input(index).unwrap_or_else(|| {
            panic!("{}: input {index} is not available", self.function.name())
        })
    }

    /// Returns a clone of an input if it is available.
    pub fn try_get_input<T: Any + Clone>(&self, index: usize) -> Option<T> {
        self.try_get_input_data(index)
            .and_then(|v| v.downcast_ref::<T>().cloned())
    }

    /// Returns a clone of an input if it is available, otherwise requests it.
    pub fn try_get_input_or_request<T: Any + Clone>(&self, index: usize) -> Option<T> {
        self.try_get_input_data_or_request(index)
            .and_then(|v| v.downcast_ref::<T>().cloned())
    }

    /// Returns a shared handle to an input without cloning the value.
    pub fn try_get_input_shared<T: Any + Send + Sync>(&self, index: usize) -> Option<Arc<T>> {
        self.try_get_input_data(index)
            .and_then(|v| v.downcast::<T>().ok())
    }

    /// Wraps `value` and publishes it as an output.
    pub fn set_output<T: Any + Send + Sync>(&self, index: usize, value: T) {
        self.set_output_value(index, Arc::new(value));
    }

    #[inline]
    fn check_input(&self, index: usize) {
        debug_assert!(
            index < self.function.inputs().len(),
            "{}: input index {index} out of bounds",
            self.function.name()
        );
    }

    #[inline]
    fn check_output(&self, index: usize) {
        debug_assert!(
            index < self.function.outputs().len(),
            "{}: output index {index} out of bounds",
            self.function.name()
        );
    }
}

/// Arbitrary data passed into lazy functions during execution.
///
/// Some functions expect a specific implementation and downcast it through
/// [`UserData::as_any`].
pub trait UserData: Send + Sync {
    /// Returns the data as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Creates data local to the calling thread.
    fn get_local(&self) -> Option<Box<dyn LocalUserData>> {
        None
    }
}

/// Thread-local extension of [`UserData`].
pub trait LocalUserData: Send {
    /// Returns the data as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Passed to a lazy function when it is executed.
#[derive(Default)]
pub struct Context<'a> {
    /// State created by [`LazyFunction::init_storage`], if any.
    pub storage: Option<&'a mut (dyn Any + Send + 'static)>,
    /// Caller-provided data.
    pub user_data: Option<&'a dyn UserData>,
    /// Caller-provided data local to the executing thread.
    pub local_user_data: Option<&'a dyn LocalUserData>,
}

impl<'a> Context<'a> {
    /// Creates a context without storage.
    pub fn new(user_data: Option<&'a dyn UserData>) -> Self {
        Self {
            storage: None,
            user_data,
            local_user_data: None,
        }
    }

    /// Downcasts the storage to `T`.
    pub fn storage_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.storage.as_deref_mut()?.downcast_mut::<T>()
    }

    /// Downcasts the user data to `T`.
    pub fn user_data<T: Any>(&self) -> Option<&T> {
        self.user_data?.as_any().downcast_ref::<T>()
    }
}

/// A standalone [`ParamsBackend`] over caller-owned slots.
///
/// The caller fills input slots, executes the function, inspects which inputs
/// were requested, provides them, and executes again.
pub struct BasicParams {
    inputs: Mutex<Vec<Option<Value>>>,
    input_usages: Mutex<Vec<Option<ValueUsage>>>,
    outputs: Mutex<Vec<Option<Value>>>,
    output_usages: Vec<ValueUsage>,
}

impl BasicParams {
    /// Creates empty slots matching `function`, with every output used.
    pub fn new(function: &dyn LazyFunction) -> Self {
        Self::with_output_usages(function, vec![ValueUsage::Used; function.outputs().len()])
    }

    /// Creates empty slots with explicit output usages.
    pub fn with_output_usages(function: &dyn LazyFunction, output_usages: Vec<ValueUsage>) -> Self {
        assert_eq!(output_usages.len(), function.outputs().len());
        let input_count = function.inputs().len();
        Self {
            inputs: Mutex::new(vec![None; input_count]),
            input_usages: Mutex::new(vec![None; input_count]),
            outputs: Mutex::new(vec![None; function.outputs().len()]),
            output_usages,
        }
    }

    /// Provides an input value.
    pub fn set_input(&self, index: usize, value: Value) {
        self.inputs.lock()[index] = Some(value);
    }

    /// Returns true if the input was provided.
    pub fn has_input(&self, index: usize) -> bool {
        self.inputs.lock()[index].is_some()
    }

    /// Returns the usage the function reported for an input, if any.
    pub fn input_usage(&self, index: usize) -> Option<ValueUsage> {
        self.input_usages.lock()[index]
    }

    /// Inputs that were requested but not provided yet.
    pub fn pending_requests(&self) -> Vec<usize> {
        let inputs = self.inputs.lock();
        let usages = self.input_usages.lock();
        usages
            .iter()
            .enumerate()
            .filter(|(i, usage)| **usage == Some(ValueUsage::Used) && inputs[*i].is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns a published output.
    pub fn output(&self, index: usize) -> Option<Value> {
        self.outputs.lock()[index].clone()
    }

    /// Returns a published output downcast to `T`.
    pub fn output_as<T: Any + Clone>(&self, index: usize) -> Option<T> {
        self.output(index)
            .and_then(|v| v.downcast_ref::<T>().cloned())
    }

    /// Removes and returns all outputs.
    pub fn take_outputs(&self) -> Vec<Option<Value>> {
        let mut outputs = self.outputs.lock();
        outputs.iter_mut().map(Option::take).collect()
    }

    /// Returns true once every used output has been published.
    pub fn all_used_outputs_set(&self) -> bool {
        let outputs = self.outputs.lock();
        self.output_usages
            .iter()
            .zip(outputs.iter())
            .all(|(usage, output)| *usage != ValueUsage::Used || output.is_some())
    }
}

impl ParamsBackend for BasicParams {
    fn try_get_input_data_impl(&self, index: usize) -> Option<Value> {
        self.inputs.lock()[index].clone()
    }

    fn try_get_input_data_or_request_impl(&self, index: usize) -> Option<Value> {
        let value = self.inputs.lock()[index].clone();
        if value.is_none() {
            self.input_usages.lock()[index] = Some(ValueUsage::Used);
        }
        value
    }

    fn set_output_value_impl(&self, index: usize, value: Value) {
        self.outputs.lock()[index] = Some(value);
    }

    fn output_was_set_impl(&self, index: usize) -> bool {
        self.outputs.lock()[index].is_some()
    }

    fn get_output_usage_impl(&self, index: usize) -> ValueUsage {
        self.output_usages[index]
    }

    fn set_input_unused_impl(&self, index: usize) {
        self.input_usages.lock()[index] = Some(ValueUsage::Unused);
    }

    fn try_enable_multi_threading_impl(&self) -> bool {
        true
    }
}

/// Executes `function` once with every input provided and every output used.
///
/// Returns the outputs in declaration order.
pub fn execute_eagerly(
    function: &dyn LazyFunction,
    inputs: Vec<Value>,
    user_data: Option<&dyn UserData>,
) -> Vec<Option<Value>> {
    assert_eq!(inputs.len(), function.inputs().len(), "{}: wrong input count", function.name());
    let backend = BasicParams::new(function);
    for (i, value) in inputs.into_iter().enumerate() {
        backend.set_input(i, value);
    }
    let mut storage = function.init_storage();
    {
        let params = Params::new(function, &backend, false);
        let mut context = Context {
            storage: storage.as_deref_mut(),
            user_data,
            local_user_data: None,
        };
        function::execute(function, &params, &mut context);
    }
    function.destruct_storage(storage);
    debug_assert!(backend.all_used_outputs_set(), "{}: outputs missing", function.name());
    backend.take_outputs()
}

/// Executes `function` repeatedly, providing inputs only when requested.
///
/// `provide` is called once for each input the function asks for; inputs
/// declared [`ValueUsage::Used`] are provided up front. Stops once every
/// output is set or the function makes no new requests.
pub fn execute_on_demand(
    function: &dyn LazyFunction,
    user_data: Option<&dyn UserData>,
    mut provide: impl FnMut(usize) -> Value,
) -> Vec<Option<Value>> {
    let backend = BasicParams::new(function);
    for (i, input) in function.inputs().iter().enumerate() {
        if input.usage == ValueUsage::Used {
            backend.set_input(i, provide(i));
        }
    }
    let mut storage = function.init_storage();
    loop {
        {
            let params = Params::new(function, &backend, false);
            let mut context = Context {
                storage: storage.as_deref_mut(),
                user_data,
                local_user_data: None,
            };
            function::execute(function, &params, &mut context);
        }
        if backend.all_used_outputs_set() {
            break;
        }
        let requests = backend.pending_requests();
        if requests.is_empty() {
            break;
        }
        for i in requests {
            backend.set_input(i, provide(i));
        }
    }
    function.destruct_storage(storage);
    backend.take_outputs()
}
