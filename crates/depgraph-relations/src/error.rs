//! Error types for relation graph building and ordering.

use thiserror::Error;

use crate::id::IdKey;

/// Errors from building or ordering a [`DepsGraph`](crate::DepsGraph).
///
/// Unresolved relation endpoints are deliberately not part of this enum:
/// they are logged and skipped so one bad relation does not stop the build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationError {
    /// The data-block is not in the database passed to the graph.
    #[error("data-block {0} is not in the database")]
    UnknownId(IdKey),

    /// Some operations are on cycles that were never marked cyclic.
    #[error("{count} operations are part of dependency cycles that were not marked; run cycle detection first")]
    UnmarkedCycles {
        /// Operations left out of the order.
        count: usize,
    },
}
