//! Type-erased values passed through sockets.
//!
//! Every socket is tagged with a [`ValueType`], a small `Copy` descriptor that
//! identifies the Rust type flowing through it. Values themselves travel as
//! [`Value`], a shared immutable `Arc<dyn Any>`: fan-out to several targets
//! shares one allocation instead of copying.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A type-erased value flowing through the graph.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wraps a concrete value into a [`Value`].
pub fn value<T: Any + Send + Sync>(v: T) -> Value {
    Arc::new(v)
}

type FormatFn = fn(&(dyn Any + Send + Sync)) -> Option<String>;

/// Describes the type of a socket.
///
/// Two sockets can only be linked when their value types are equal, i.e. they
/// describe the same Rust type.
#[derive(Clone, Copy)]
pub struct ValueType {
    type_id: TypeId,
    name: &'static str,
    format: Option<FormatFn>,
}

impl ValueType {
    /// Describes `T` without debug printing support.
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
            format: None,
        }
    }

    /// Describes `T` and allows printing values of it with their `Debug` impl.
    pub fn debug<T: Any + Send + Sync + fmt::Debug>() -> Self {
        Self {
            format: Some(|v| v.downcast_ref::<T>().map(|v| format!("{v:?}"))),
            ..Self::of::<T>()
        }
    }

    /// Returns the `TypeId` of the described type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns a short, human-readable type name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if `value` holds the described type.
    pub fn matches(&self, value: &Value) -> bool {
        (**value).type_id() == self.type_id
    }

    /// Returns true if `T` is the described type.
    pub fn is<T: Any>(&self) -> bool {
        TypeId::of::<T>() == self.type_id
    }

    /// Prints `value` if this type was created with [`ValueType::debug`].
    pub fn format(&self, value: &Value) -> Option<String> {
        self.format.and_then(|f| f(value.as_ref()))
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ValueType {}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueType({})", self.name)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Strips module paths: `alloc::string::String` becomes `String`.
fn short_type_name(full: &'static str) -> &'static str {
    if full.contains('<') {
        return full;
    }
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_types_compare_equal() {
        assert_eq!(ValueType::of::<i32>(), ValueType::debug::<i32>());
        assert_ne!(ValueType::of::<i32>(), ValueType::of::<i64>());
    }

    #[test]
    fn short_names() {
        assert_eq!(ValueType::of::<String>().name(), "String");
        assert_eq!(ValueType::of::<i32>().name(), "i32");
    }

    #[test]
    fn matches_checks_inner_type() {
        let v = value(5_i32);
        assert!(ValueType::of::<i32>().matches(&v));
        assert!(!ValueType::of::<u32>().matches(&v));
    }

    #[test]
    fn format_only_when_debuggable() {
        let v = value(42_i32);
        assert_eq!(ValueType::debug::<i32>().format(&v).as_deref(), Some("42"));
        assert_eq!(ValueType::of::<i32>().format(&v), None);
    }
}
