//! Relations between operations and their flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use super::nodes::OperationId;

/// Index of a relation in its [`DepsGraph`](super::DepsGraph).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationId(pub(crate) u32);

impl RelationId {
    /// Returns the raw index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bit set of relation properties.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RelationFlags(u32);

impl RelationFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// The relation closes a dependency cycle and is ignored for ordering.
    pub const CYCLIC: Self = Self(1 << 0);
    /// Updates are flushed through this relation even when the target
    /// would normally block them.
    pub const GODMODE: Self = Self(1 << 4);
    /// Updates are not flushed through this relation.
    pub const NO_FLUSH: Self = Self(1 << 5);
    /// Only user edits are flushed through this relation.
    pub const FLUSH_USER_EDIT_ONLY: Self = Self(1 << 6);
    /// Reuse an existing relation with the same endpoints and description
    /// instead of adding a duplicate.
    pub const CHECK_BEFORE_ADD: Self = Self(1 << 7);

    const NAMES: [(Self, &'static str); 5] = [
        (Self::CYCLIC, "CYCLIC"),
        (Self::GODMODE, "GODMODE"),
        (Self::NO_FLUSH, "NO_FLUSH"),
        (Self::FLUSH_USER_EDIT_ONLY, "FLUSH_USER_EDIT_ONLY"),
        (Self::CHECK_BEFORE_ADD, "CHECK_BEFORE_ADD"),
    ];

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every flag in `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if no flag is set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Sets the flags in `other`.
    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clears the flags in `other`.
    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for RelationFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RelationFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for RelationFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Where a relation starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelationSource {
    /// The graph's time source.
    TimeSource,
    /// An operation.
    Operation(OperationId),
}

/// A dependency: `to` has to be evaluated after `from`.
#[derive(Clone, Debug)]
pub struct Relation {
    /// Where the relation starts.
    pub from: RelationSource,
    /// The dependent operation.
    pub to: OperationId,
    /// Human readable reason for the relation.
    pub description: String,
    /// Relation properties.
    pub flags: RelationFlags,
}

impl Relation {
    /// True if the relation closes a cycle.
    pub fn is_cyclic(&self) -> bool {
        self.flags.contains(RelationFlags::CYCLIC)
    }
}
