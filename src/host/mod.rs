//! Host - The real tree the reconciler mutates.
//!
//! The reconciler never inspects host nodes. It asks the host to create a
//! node for a fiber, to apply a props diff to an existing node, and to
//! insert or remove nodes under a parent. [`Document`] is an in-memory
//! implementation used by tests and as a reference backend.

pub mod memory;

pub use memory::{Document, DocumentError, DocumentStats, NodeId, NodeKind};

use std::fmt;
use std::hash::Hash;

use crate::vnode::Props;

/// A mutable tree of nodes with parent/child/sibling navigation.
///
/// Failures are reported as [`anyhow::Error`] and surface from the
/// scheduler wrapped in [`ReconcileError::Host`](crate::ReconcileError::Host).
pub trait Host {
    /// Handle to a node. Cloning must not copy the node itself.
    type Node: Clone + Eq + Hash + fmt::Debug;

    /// Materialize a detached node for a host fiber.
    fn create_node(&mut self, ty: &str, props: &Props) -> anyhow::Result<Self::Node>;

    /// Apply the minimal attribute/content change from `old` to `new`.
    fn update_node(&mut self, node: &Self::Node, old: &Props, new: &Props) -> anyhow::Result<()>;

    /// Insert (or move) `child` under `parent` before `anchor`, or append.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        anchor: Option<&Self::Node>,
    ) -> anyhow::Result<()>;

    /// Detach `child` from `parent`.
    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> anyhow::Result<()>;

    /// Free `node` and everything below it once it has left the tree for good.
    ///
    /// Called after `remove_child` for each top-level node of a deleted
    /// subtree, and for detached nodes created by a pass that was abandoned
    /// before commit. Hosts whose nodes are freed on drop can keep the
    /// default, which does nothing.
    fn release_node(&mut self, node: &Self::Node) -> anyhow::Result<()> {
        let _ = node;
        Ok(())
    }

    fn first_child(&self, parent: &Self::Node) -> Option<Self::Node>;

    fn last_child(&self, parent: &Self::Node) -> Option<Self::Node>;
}
