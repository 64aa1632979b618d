//! Reconciliation - Diff a fiber's previous children against new vnodes.
//!
//! # Algorithm
//!
//! 1. Key the old children (kept on the fiber from the last pass) and the
//!    new vnodes with [`keyed_children`].
//! 2. **Matching pass** over the old children: a child whose key is still
//!    present with the same type is reusable; keyed ones get a sequential
//!    index. Every other old child is tagged `DELETE` and pushed onto the
//!    parent's patch list right away.
//! 3. **Build pass** over the new children, in new order: reusable fibers
//!    are snapshotted, merged and tagged `UPDATE` (plus `PLACE` when their
//!    keyed index changed, or when an earlier commit failed before placing
//!    them); everything else becomes a fresh `PLACE` fiber.
//!    The results are linked into a new child/sibling chain.
//!
//! A child that changes type under the same key is never updated in place:
//! the old fiber is deleted and a new one placed.
//!
//! Every mutation of a fiber that existed before the pass is preceded by a
//! snapshot recorded in the [`WorkJournal`], so an aborted pass can be
//! rolled back to the last committed tree.

mod keys;

pub use keys::*;

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::Result;
use crate::fiber::{Fiber, FiberArena, FiberId};
use crate::types::{ChildKey, PatchFlags};
use crate::vnode::VNode;

// =============================================================================
// Work Journal
// =============================================================================

/// Record of everything one unit of work changed in the arena.
#[derive(Debug, Default)]
pub struct WorkJournal {
    /// Fibers created during this pass.
    pub created: Vec<FiberId>,
    /// Pre-existing fibers that were snapshotted before being mutated.
    pub snapshotted: Vec<FiberId>,
    /// Old fibers tagged `DELETE`.
    pub deleted: Vec<FiberId>,
    /// HOOK fibers rendered, in render order.
    pub rendered: Vec<FiberId>,
}

impl WorkJournal {
    /// Commit succeeded: release the snapshots and unlink alternates.
    pub fn finish<N>(&mut self, arena: &mut FiberArena<N>) {
        for id in self.snapshotted.drain(..) {
            let alternate = arena.get_mut(id).and_then(|fiber| fiber.alternate.take());
            if let Some(alternate) = alternate {
                arena.remove(alternate);
            }
        }
        self.created.clear();
        self.deleted.clear();
    }

    /// Pass aborted: restore every snapshot and drop every new fiber.
    pub fn rollback<N>(&mut self, arena: &mut FiberArena<N>) {
        for id in self.created.drain(..).rev() {
            arena.remove(id);
        }
        for id in self.snapshotted.drain(..).rev() {
            let alternate = arena.get(id).and_then(|fiber| fiber.alternate);
            let Some(snapshot) = alternate.and_then(|alt| arena.remove(alt)) else {
                continue;
            };
            if let Some(fiber) = arena.get_mut(id) {
                *fiber = snapshot;
            }
        }
        for id in self.deleted.drain(..) {
            if let Some(fiber) = arena.get_mut(id) {
                fiber.patch.remove(PatchFlags::DELETE);
            }
        }
        self.rendered.clear();
    }
}

/// Snapshot `id` into a new arena entry and point its `alternate` at it.
///
/// A fiber is snapshotted at most once per pass.
pub fn snapshot<N: Clone>(
    arena: &mut FiberArena<N>,
    journal: &mut WorkJournal,
    id: FiberId,
) -> Result<()> {
    let fiber = arena.fiber(id)?;
    if fiber.alternate.is_some() {
        return Ok(());
    }
    let copy = fiber.clone();
    let alternate = arena.insert(copy);
    arena.fiber_mut(id)?.alternate = Some(alternate);
    journal.snapshotted.push(id);
    Ok(())
}

// =============================================================================
// Reconcile Children
// =============================================================================

/// Diff the children of `wip` against `children` and relink its child chain.
pub fn reconcile_children<N: Clone>(
    arena: &mut FiberArena<N>,
    journal: &mut WorkJournal,
    wip: FiberId,
    children: &[VNode],
) -> Result<()> {
    let old_children = std::mem::take(&mut arena.fiber_mut(wip)?.children);
    let new_children = keyed_children(children);

    // Matching pass over the old children
    let mut reusable: HashMap<ChildKey, (FiberId, Option<usize>)> =
        HashMap::with_capacity(old_children.len());
    let mut deletions = Vec::new();
    let mut old_index = 0;

    for (key, old_id) in old_children {
        let old = arena.fiber(old_id)?;
        match new_children.get(&key) {
            Some(vnode) if old.is_same(vnode) => {
                let index = key.is_explicit().then(|| {
                    old_index += 1;
                    old_index - 1
                });
                reusable.insert(key, (old_id, index));
            }
            _ => deletions.push(old_id),
        }
    }

    for &old_id in &deletions {
        arena.fiber_mut(old_id)?.patch = PatchFlags::DELETE;
        journal.deleted.push(old_id);
    }
    arena.fiber_mut(wip)?.patches.extend(deletions);

    // Build pass over the new children
    let mut next_children = IndexMap::with_capacity(new_children.len());
    let mut new_index = 0;
    let mut prev: Option<FiberId> = None;

    for (key, vnode) in new_children {
        let id = match reusable.remove(&key) {
            Some((old_id, old_index)) => {
                snapshot(arena, journal, old_id)?;
                let index = key.is_explicit().then(|| {
                    new_index += 1;
                    new_index - 1
                });

                let fiber = arena.fiber_mut(old_id)?;
                // Left over from a commit that failed before placing it
                let unplaced = fiber.patch.contains(PatchFlags::PLACE);
                fiber.merge(&vnode);
                fiber.patch = PatchFlags::UPDATE;
                if index != old_index || unplaced {
                    fiber.patch |= PatchFlags::PLACE;
                }
                fiber.index = index;
                old_id
            }
            None => {
                let id = arena.insert(Fiber::from_vnode(&vnode, PatchFlags::PLACE));
                journal.created.push(id);
                id
            }
        };

        let fiber = arena.fiber_mut(id)?;
        fiber.parent = Some(wip);
        fiber.sibling = None;

        match prev {
            Some(prev) => arena.fiber_mut(prev)?.sibling = Some(id),
            None => arena.fiber_mut(wip)?.child = Some(id),
        }
        prev = Some(id);
        next_children.insert(key, id);
    }

    let parent = arena.fiber_mut(wip)?;
    if prev.is_none() {
        parent.child = None;
    }
    parent.children = next_children;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FiberTag;
    use crate::vnode::{Props, h};

    fn li(key: &str) -> VNode {
        h("li", Props::new()).key(key)
    }

    /// Reconcile `first`, pretend it was committed, then reconcile `second`.
    fn two_passes(first: &[VNode], second: &[VNode]) -> (FiberArena<u32>, FiberId) {
        let mut arena = FiberArena::new();
        let root = arena.insert(Fiber::root(0u32, Vec::new()));

        let mut journal = WorkJournal::default();
        reconcile_children(&mut arena, &mut journal, root, first).unwrap();
        for id in arena.children(root).collect::<Vec<_>>() {
            arena.get_mut(id).unwrap().patch = PatchFlags::empty();
        }
        arena.get_mut(root).unwrap().patches.clear();
        journal.finish(&mut arena);

        let mut journal = WorkJournal::default();
        reconcile_children(&mut arena, &mut journal, root, second).unwrap();
        (arena, root)
    }

    fn flags(arena: &FiberArena<u32>, root: FiberId) -> Vec<(String, PatchFlags)> {
        arena
            .children(root)
            .map(|id| {
                let fiber = arena.get(id).unwrap();
                let key = fiber.key.as_ref().map(|k| k.to_string()).unwrap_or_default();
                (key, fiber.patch)
            })
            .collect()
    }

    #[test]
    fn test_first_pass_places_everything() {
        let mut arena = FiberArena::new();
        let root = arena.insert(Fiber::root(0u32, Vec::new()));
        let mut journal = WorkJournal::default();

        reconcile_children(&mut arena, &mut journal, root, &[li("a"), li("b")]).unwrap();

        let children: Vec<_> = arena.children(root).collect();
        assert_eq!(children.len(), 2);
        for id in &children {
            let fiber = arena.get(*id).unwrap();
            assert_eq!(fiber.patch, PatchFlags::PLACE);
            assert_eq!(fiber.parent, Some(root));
            assert_eq!(fiber.tag, FiberTag::Host);
        }
        assert_eq!(journal.created, children);
        assert!(arena.get(root).unwrap().patches.is_empty(), "nothing to delete");
    }

    #[test]
    fn test_identical_children_only_update() {
        let (arena, root) = two_passes(&[li("a"), li("b")], &[li("a"), li("b")]);

        for (key, patch) in flags(&arena, root) {
            assert_eq!(patch, PatchFlags::UPDATE, "{} should update in place", key);
        }
        assert!(arena.get(root).unwrap().patches.is_empty(), "no deletions");
    }

    #[test]
    fn test_keyed_reorder_moves_without_delete() {
        let (arena, root) = two_passes(
            &[li("1"), li("2"), li("3")],
            &[li("3"), li("1"), li("2")],
        );

        let result = flags(&arena, root);
        assert_eq!(
            result.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            vec!["3", "1", "2"]
        );
        for (key, patch) in &result {
            assert_eq!(
                *patch,
                PatchFlags::UPDATE | PatchFlags::PLACE,
                "{} should be reused and moved",
                key
            );
        }
        assert!(
            arena.get(root).unwrap().patches.is_empty(),
            "reorder must not delete anything"
        );
    }

    #[test]
    fn test_stable_prefix_not_moved() {
        let (arena, root) = two_passes(&[li("a"), li("b"), li("c")], &[li("a"), li("c"), li("b")]);
        let result = flags(&arena, root);

        assert_eq!(result[0], ("a".to_string(), PatchFlags::UPDATE));
        assert_eq!(result[1], ("c".to_string(), PatchFlags::UPDATE | PatchFlags::PLACE));
        assert_eq!(result[2], ("b".to_string(), PatchFlags::UPDATE | PatchFlags::PLACE));
    }

    #[test]
    fn test_unplaced_fiber_keeps_place() {
        let mut arena = FiberArena::new();
        let root = arena.insert(Fiber::root(0u32, Vec::new()));
        let mut journal = WorkJournal::default();
        reconcile_children(&mut arena, &mut journal, root, &[li("a"), li("b")]).unwrap();
        journal.finish(&mut arena);

        // "a" was placed, the commit failed before "b"
        let placed = arena.get(root).unwrap().child.unwrap();
        arena.get_mut(placed).unwrap().patch = PatchFlags::empty();

        let mut journal = WorkJournal::default();
        reconcile_children(&mut arena, &mut journal, root, &[li("a"), li("b")]).unwrap();

        let result = flags(&arena, root);
        assert_eq!(result[0], ("a".to_string(), PatchFlags::UPDATE));
        assert_eq!(result[1], ("b".to_string(), PatchFlags::UPDATE | PatchFlags::PLACE));
    }

    #[test]
    fn test_type_change_deletes_and_places() {
        let (arena, root) = two_passes(
            &[h("div", Props::new()).key("k")],
            &[h("span", Props::new()).key("k")],
        );

        let deleted = &arena.get(root).unwrap().patches;
        assert_eq!(deleted.len(), 1);
        let old = arena.get(deleted[0]).unwrap();
        assert_eq!(old.patch, PatchFlags::DELETE);
        assert_eq!(old.type_name(), "div");

        let new_id = arena.get(root).unwrap().child.unwrap();
        let new = arena.get(new_id).unwrap();
        assert_eq!(new.type_name(), "span");
        assert_eq!(new.patch, PatchFlags::PLACE, "type change is never an update");
        assert_ne!(new_id, deleted[0]);
    }

    #[test]
    fn test_removed_child_deleted_eagerly() {
        let (arena, root) = two_passes(&[li("a"), li("b"), li("c")], &[li("a"), li("c")]);

        let deleted = &arena.get(root).unwrap().patches;
        assert_eq!(deleted.len(), 1);
        assert_eq!(arena.get(deleted[0]).unwrap().key, Some("b".into()));

        let keys: Vec<_> = flags(&arena, root).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_reused_fiber_gets_alternate_snapshot() {
        let (arena, root) = two_passes(
            &[h("li", Props::new().attr("class", "old")).key("a")],
            &[h("li", Props::new().attr("class", "new")).key("a")],
        );

        let id = arena.get(root).unwrap().child.unwrap();
        let fiber = arena.get(id).unwrap();
        let alternate = arena.get(fiber.alternate.unwrap()).unwrap();

        assert_eq!(fiber.props.get("class").and_then(|v| v.as_str()), Some("new"));
        assert_eq!(alternate.props.get("class").and_then(|v| v.as_str()), Some("old"));
    }

    #[test]
    fn test_empty_children_clears_chain() {
        let (arena, root) = two_passes(&[li("a")], &[]);
        let root_fiber = arena.get(root).unwrap();

        assert_eq!(root_fiber.child, None);
        assert!(root_fiber.children.is_empty());
        assert_eq!(root_fiber.patches.len(), 1);
    }

    #[test]
    fn test_rollback_restores_previous_tree() {
        let mut arena = FiberArena::new();
        let root = arena.insert(Fiber::root(0u32, Vec::new()));
        let mut journal = WorkJournal::default();
        reconcile_children(&mut arena, &mut journal, root, &[li("a"), li("b")]).unwrap();
        for id in arena.children(root).collect::<Vec<_>>() {
            arena.get_mut(id).unwrap().patch = PatchFlags::empty();
        }
        journal.finish(&mut arena);
        let before: Vec<_> = arena.children(root).collect();
        let fibers_before = arena.len();

        let mut journal = WorkJournal::default();
        snapshot(&mut arena, &mut journal, root).unwrap();
        reconcile_children(&mut arena, &mut journal, root, &[li("b"), li("c")]).unwrap();
        journal.rollback(&mut arena);

        assert_eq!(arena.children(root).collect::<Vec<_>>(), before);
        assert_eq!(arena.len(), fibers_before, "new fibers and snapshots released");
        for id in before {
            let fiber = arena.get(id).unwrap();
            assert!(fiber.patch.is_empty(), "patch flags restored");
            assert_eq!(fiber.alternate, None);
        }
        assert!(arena.get(root).unwrap().patches.is_empty());
    }
}
