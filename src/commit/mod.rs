//! Commit - Apply a finished patch list to the host tree.
//!
//! # Architecture
//!
//! The unit root's patch list is ordered depth-first, child before parent,
//! left before right, with each parent's deletions ahead of its children's
//! patches. Commit walks it once:
//!
//! - `DELETE` removes the top-level host nodes of the fiber's subtree from
//!   the nearest host ancestor (component fibers are looked through), has
//!   the host release them, and frees the subtree from the arena.
//! - `UPDATE` on a host fiber diffs the snapshot props against the new ones.
//! - `PLACE` inserts the node before [`host_sibling`], or appends. A moved
//!   component moves all of its top-level host nodes together.
//!
//! Effects run after every patch has been applied, for each component
//! rendered in the pass, in render order.

mod anchor;

pub use anchor::*;

use crate::error::{ReconcileError, Result};
use crate::fiber::{FiberArena, FiberId};
use crate::hooks::EffectFn;
use crate::host::Host;
use crate::types::{FiberTag, Key, PatchFlags};

// =============================================================================
// Report
// =============================================================================

/// One patch as it was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedPatch {
    pub fiber: FiberId,
    pub tag: FiberTag,
    pub flags: PatchFlags,
    /// Tag or component name.
    pub ty: String,
    pub key: Option<Key>,
}

/// Outcome of committing one unit of work.
#[derive(Debug, Clone, Default)]
pub struct CommitReport {
    /// Applied patches, in commit order.
    pub patches: Vec<AppliedPatch>,
    pub effects_run: usize,
}

impl CommitReport {
    /// Number of applied patches carrying `flag`.
    pub fn count(&self, flag: PatchFlags) -> usize {
        self.patches.iter().filter(|p| p.flags.contains(flag)).count()
    }

    pub fn placed(&self) -> usize {
        self.count(PatchFlags::PLACE)
    }

    pub fn updated(&self) -> usize {
        self.count(PatchFlags::UPDATE)
    }

    pub fn deleted(&self) -> usize {
        self.count(PatchFlags::DELETE)
    }

    /// Applied patches whose type name is `ty`.
    pub fn of_type<'a>(&'a self, ty: &'a str) -> impl Iterator<Item = &'a AppliedPatch> + 'a {
        self.patches.iter().filter(move |p| p.ty == ty)
    }
}

// =============================================================================
// Patches
// =============================================================================

/// Apply `patches` in order.
///
/// On error the patches applied so far stay applied and the rest are not
/// attempted.
pub fn commit_patches<H: Host>(
    host: &mut H,
    arena: &mut FiberArena<H::Node>,
    state: &mut CommitState<H::Node>,
    patches: &[FiberId],
) -> Result<Vec<AppliedPatch>> {
    let mut applied = Vec::with_capacity(patches.len());

    for &id in patches {
        let Some(fiber) = arena.get(id) else {
            tracing::trace!(?id, "patch target already released");
            continue;
        };
        if fiber.tag == FiberTag::Root || fiber.patch.is_empty() {
            continue;
        }
        let patch = AppliedPatch {
            fiber: id,
            tag: fiber.tag,
            flags: fiber.patch,
            ty: fiber.type_name().to_string(),
            key: fiber.key.clone(),
        };

        let parent_id = arena.host_parent(id).ok_or(ReconcileError::StaleFiber(id))?;
        let parent = arena.fiber(parent_id)?;
        let parent_node = parent
            .node()
            .cloned()
            .ok_or(ReconcileError::MissingNode(parent_id))?;
        let into_container = parent.tag == FiberTag::Root;

        tracing::trace!(fiber = ?id, ty = %patch.ty, flags = ?patch.flags, "apply patch");

        if patch.flags.contains(PatchFlags::DELETE) {
            delete_subtree(host, arena, id, &parent_node)?;
        } else {
            match patch.tag {
                FiberTag::Host => {
                    commit_host(host, arena, state, id, patch.flags, &parent_node, into_container)?
                }
                FiberTag::Hook => {
                    commit_hook(host, arena, state, id, patch.flags, &parent_node, into_container)?
                }
                FiberTag::Root => {}
            }
            if let Some(fiber) = arena.get_mut(id) {
                fiber.patch = PatchFlags::empty();
                fiber.patches.clear();
            }
        }
        if let Some(parent) = arena.get_mut(parent_id) {
            parent.patches.clear();
        }

        applied.push(patch);
    }

    Ok(applied)
}

fn commit_host<H: Host>(
    host: &mut H,
    arena: &FiberArena<H::Node>,
    state: &mut CommitState<H::Node>,
    id: FiberId,
    flags: PatchFlags,
    parent: &H::Node,
    into_container: bool,
) -> Result<()> {
    let fiber = arena.fiber(id)?;
    let node = fiber.node().cloned().ok_or(ReconcileError::MissingNode(id))?;

    if flags.contains(PatchFlags::UPDATE) {
        let old = fiber
            .alternate
            .and_then(|alt| arena.get(alt))
            .map(|alt| alt.props.clone());
        if let Some(old) = old {
            host.update_node(&node, &old, &fiber.props)
                .map_err(ReconcileError::host("update_node"))?;
        }
    }

    if flags.contains(PatchFlags::PLACE) {
        place(host, arena, state, id, parent, into_container, &[node])?;
    }
    Ok(())
}

fn commit_hook<H: Host>(
    host: &mut H,
    arena: &FiberArena<H::Node>,
    state: &mut CommitState<H::Node>,
    id: FiberId,
    flags: PatchFlags,
    parent: &H::Node,
    into_container: bool,
) -> Result<()> {
    // A new component's children carry their own placements
    let moved = flags.contains(PatchFlags::PLACE) && arena.fiber(id)?.alternate.is_some();
    if moved {
        let nodes = top_level_nodes(arena, id);
        place(host, arena, state, id, parent, into_container, &nodes)?;
    }
    Ok(())
}

fn place<H: Host>(
    host: &mut H,
    arena: &FiberArena<H::Node>,
    state: &mut CommitState<H::Node>,
    id: FiberId,
    parent: &H::Node,
    into_container: bool,
    nodes: &[H::Node],
) -> Result<()> {
    let anchor = host_sibling(arena, id);
    let anchor = state.anchor(host, parent, into_container, anchor);

    for node in nodes {
        host.insert_before(parent, node, anchor.as_ref())
            .map_err(ReconcileError::host("insert_before"))?;
        state.placed(host, parent, node);
    }
    Ok(())
}

/// Remove the host nodes of `id`'s subtree from `parent`, then free them and
/// the fiber subtree.
fn delete_subtree<H: Host>(
    host: &mut H,
    arena: &mut FiberArena<H::Node>,
    id: FiberId,
    parent: &H::Node,
) -> Result<()> {
    for node in top_level_nodes(arena, id) {
        host.remove_child(parent, &node)
            .map_err(ReconcileError::host("remove_child"))?;
        host.release_node(&node)
            .map_err(ReconcileError::host("release_node"))?;
    }
    let released = arena.remove_subtree(id);
    tracing::trace!(fiber = ?id, released, "subtree deleted");
    Ok(())
}

// =============================================================================
// Effects
// =============================================================================

/// Run the effects registered by each rendered component, in render order.
///
/// Returns the number of effects run. The first failing effect stops the
/// run and is reported with its component.
pub fn run_effects<N>(arena: &FiberArena<N>, rendered: &[FiberId]) -> Result<usize> {
    let mut run = 0;

    for &id in rendered {
        let Some(fiber) = arena.get(id) else {
            continue;
        };
        let Some(state) = fiber.hook_state() else {
            continue;
        };
        let effects: Vec<EffectFn> = state.effects().cloned().collect();
        let component = fiber.type_name().to_string();

        for effect in effects {
            effect().map_err(|source| ReconcileError::Effect {
                fiber: id,
                component: component.clone(),
                source,
            })?;
            run += 1;
        }
    }

    Ok(run)
}
