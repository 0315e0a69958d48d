//! Tracks what the relation builder is working on, for diagnostics.
//!
//! Builders push an entry when they start on a data-block, bone, constraint
//! or driver and the entry is popped when the returned guard is dropped.
//! When a relation cannot be added, the current stack is printed so the
//! failing call site can be found.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// One level of the builder stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StackEntry {
    /// A data-block, by display name.
    Id(String),
    /// A bone of the pose being built.
    Bone(String),
    /// A constraint.
    Constraint(String),
    /// A driver, by the path it drives.
    Driver(String),
    /// Anything else.
    Other(String),
}

impl fmt::Display for StackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(name) => write!(f, "ID {name}"),
            Self::Bone(name) => write!(f, "Bone {name}"),
            Self::Constraint(name) => write!(f, "Constraint {name}"),
            Self::Driver(path) => write!(f, "Driver {path}"),
            Self::Other(text) => f.write_str(text),
        }
    }
}

/// Stack of [`StackEntry`] values shared between a builder and the guards
/// it hands out.
#[derive(Clone, Debug, Default)]
pub struct BuilderStack {
    entries: Rc<RefCell<Vec<StackEntry>>>,
}

impl BuilderStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `entry` until the returned guard is dropped.
    #[must_use = "the entry is popped as soon as the guard is dropped"]
    pub fn trace(&self, entry: StackEntry) -> ScopedEntry {
        self.entries.borrow_mut().push(entry);
        ScopedEntry {
            entries: Rc::clone(&self.entries),
        }
    }

    /// True if nothing is being traced.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Number of entries.
    pub fn depth(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Copy of the current entries, outermost first.
    pub fn entries(&self) -> Vec<StackEntry> {
        self.entries.borrow().clone()
    }

    /// Renders the stack, outermost first, one indented line per entry.
    pub fn backtrace(&self) -> String {
        let mut out = String::new();
        for (depth, entry) in self.entries.borrow().iter().enumerate() {
            out.push_str(&format!("{:indent$}{entry}\n", "", indent = 2 * (depth + 1)));
        }
        out
    }
}

/// Pops its stack entry on drop.
#[derive(Debug)]
pub struct ScopedEntry {
    entries: Rc<RefCell<Vec<StackEntry>>>,
}

impl Drop for ScopedEntry {
    fn drop(&mut self) {
        self.entries.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_pop_in_reverse_order() {
        let stack = BuilderStack::new();
        assert!(stack.is_empty());
        {
            let _id = stack.trace(StackEntry::Id("OBRig".into()));
            {
                let _bone = stack.trace(StackEntry::Bone("Arm".into()));
                assert_eq!(stack.depth(), 2);
                assert_eq!(stack.backtrace(), "  ID OBRig\n    Bone Arm\n");
            }
            assert_eq!(stack.entries(), vec![StackEntry::Id("OBRig".into())]);
        }
        assert!(stack.is_empty());
    }

    #[test]
    fn test_clones_share_entries() {
        let stack = BuilderStack::new();
        let other = stack.clone();
        let _guard = other.trace(StackEntry::Driver("location[0]".into()));
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.backtrace(), "  Driver location[0]\n");
    }
}
