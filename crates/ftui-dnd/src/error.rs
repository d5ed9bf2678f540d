#![forbid(unsafe_code)]

//! Errors raised by the host document model.
//!
//! Session orchestration itself is infallible: re-entrant starts are silent
//! no-ops, registry misses are skipped, and contradictory platform signals are
//! ignored. Only structural edits to the [`Document`](crate::document::Document)
//! can fail.

use std::fmt;

use crate::document::NodeId;

/// Error type for document tree edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DndError {
    /// The node id does not belong to this document.
    UnknownNode(NodeId),
    /// The operation requires an element, but the node is a text node.
    NotAnElement(NodeId),
    /// Appending would make a node its own ancestor.
    CycleDetected {
        /// Intended parent.
        parent: NodeId,
        /// Node that was being appended.
        child: NodeId,
    },
    /// The document root cannot be detached or re-parented.
    RootImmutable,
}

impl fmt::Display for DndError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode(id) => write!(f, "unknown node {id}"),
            Self::NotAnElement(id) => write!(f, "node {id} is not an element"),
            Self::CycleDetected { parent, child } => {
                write!(f, "appending {child} under {parent} would create a cycle")
            }
            Self::RootImmutable => write!(f, "the document root cannot be moved"),
        }
    }
}

impl std::error::Error for DndError {}

/// Convenience alias for document operations.
pub type Result<T> = std::result::Result<T, DndError>;
