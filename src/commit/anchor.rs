//! Anchor computation for placements.
//!
//! A placed node goes immediately before the node of the next sibling that
//! is already in its final position. Siblings still awaiting placement are
//! skipped (they are committed later, relative to their own anchor), and
//! component fibers are transparent in both directions: their first host
//! descendants count as siblings, and a component parent's siblings count
//! when the fiber is the component's last child.

use std::fmt;

use crate::fiber::{FiberArena, FiberId};
use crate::host::Host;
use crate::types::{FiberTag, PatchFlags};

/// Node to insert `id`'s node(s) before, or `None` to append.
pub fn host_sibling<N: Clone>(arena: &FiberArena<N>, id: FiberId) -> Option<N> {
    let mut current = id;

    'siblings: loop {
        // Climb until a sibling exists, only through component parents
        loop {
            let fiber = arena.get(current)?;
            if fiber.sibling.is_some() {
                break;
            }
            let parent = fiber.parent?;
            if arena.get(parent)?.tag != FiberTag::Hook {
                return None;
            }
            current = parent;
        }
        current = arena.get(current)?.sibling?;

        // Descend through components to the first host fiber
        loop {
            let fiber = arena.get(current)?;
            if fiber.patch.contains(PatchFlags::PLACE) {
                continue 'siblings;
            }
            match fiber.tag {
                FiberTag::Host => return fiber.node().cloned(),
                _ => match fiber.child {
                    Some(child) => current = child,
                    None => continue 'siblings,
                },
            }
        }
    }
}

/// Host nodes directly owned by `id`'s subtree: the fiber's own node, or
/// for a component, the top-level nodes of its rendered output.
pub fn top_level_nodes<N: Clone>(arena: &FiberArena<N>, id: FiberId) -> Vec<N> {
    let mut nodes = Vec::new();
    collect_nodes(arena, id, &mut nodes);
    nodes
}

fn collect_nodes<N: Clone>(arena: &FiberArena<N>, id: FiberId, out: &mut Vec<N>) {
    let Some(fiber) = arena.get(id) else {
        return;
    };
    match fiber.tag {
        FiberTag::Host => out.extend(fiber.node().cloned()),
        FiberTag::Hook => {
            for child in arena.children(id) {
                collect_nodes(arena, child, out);
            }
        }
        FiberTag::Root => {}
    }
}

// =============================================================================
// Bootstrap Anchor
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Bootstrap<N> {
    /// No placement into a container yet.
    Pending,
    /// Unanchored placements into `container` go before `start`.
    Active { container: N, start: N },
    Done,
}

/// One-time commit state owned by the scheduler.
///
/// With the legacy bootstrap rule enabled, the first placement into a
/// container that already has content pins unanchored placements before
/// the container's original first child, so new nodes land ahead of the
/// pre-existing ones. The rule switches off for good once a placed node
/// ends up as its parent's last child.
#[derive(Debug, Clone)]
pub struct CommitState<N> {
    bootstrap: Bootstrap<N>,
}

impl<N: Clone + PartialEq + fmt::Debug> CommitState<N> {
    pub fn new(legacy_bootstrap_anchor: bool) -> Self {
        let bootstrap = if legacy_bootstrap_anchor {
            Bootstrap::Pending
        } else {
            Bootstrap::Done
        };
        Self { bootstrap }
    }

    /// Whether the bootstrap rule can still affect a placement.
    pub fn is_bootstrapping(&self) -> bool {
        !matches!(self.bootstrap, Bootstrap::Done)
    }

    /// Adjust `anchor` for a placement under `parent`.
    ///
    /// `into_container` is true when `parent` is a root container.
    pub(crate) fn anchor<H>(
        &mut self,
        host: &H,
        parent: &N,
        into_container: bool,
        anchor: Option<N>,
    ) -> Option<N>
    where
        H: Host<Node = N>,
    {
        if into_container && self.bootstrap == Bootstrap::Pending {
            self.bootstrap = match host.first_child(parent) {
                Some(start) => {
                    tracing::debug!(?start, "bootstrap anchor active");
                    Bootstrap::Active {
                        container: parent.clone(),
                        start,
                    }
                }
                None => Bootstrap::Done,
            };
        }

        match &self.bootstrap {
            Bootstrap::Active { container, start } if anchor.is_none() && container == parent => {
                Some(start.clone())
            }
            _ => anchor,
        }
    }

    /// Record a finished placement of `node` under `parent`.
    pub(crate) fn placed<H>(&mut self, host: &H, parent: &N, node: &N)
    where
        H: Host<Node = N>,
    {
        if let Bootstrap::Active { .. } = self.bootstrap {
            if host.last_child(parent).as_ref() == Some(node) {
                tracing::debug!("bootstrap anchor done");
                self.bootstrap = Bootstrap::Done;
            }
        }
    }
}
