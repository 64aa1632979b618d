//! Fiber Arena - Slot storage for every live fiber.
//!
//! Handles are versioned, so a [`FiberId`] held by a stale state setter
//! never resolves to a different fiber that later reuses the slot.

use slotmap::SlotMap;

use super::{Fiber, FiberId};
use crate::error::{ReconcileError, Result};
use crate::types::FiberTag;

#[derive(Debug)]
pub struct FiberArena<N> {
    fibers: SlotMap<FiberId, Fiber<N>>,
}

impl<N> Default for FiberArena<N> {
    fn default() -> Self {
        Self {
            fibers: SlotMap::with_key(),
        }
    }
}

impl<N> FiberArena<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fiber: Fiber<N>) -> FiberId {
        self.fibers.insert(fiber)
    }

    pub fn remove(&mut self, id: FiberId) -> Option<Fiber<N>> {
        self.fibers.remove(id)
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber<N>> {
        self.fibers.get(id)
    }

    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<N>> {
        self.fibers.get_mut(id)
    }

    pub fn contains(&self, id: FiberId) -> bool {
        self.fibers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    /// Resolve a handle or report it as stale.
    pub fn fiber(&self, id: FiberId) -> Result<&Fiber<N>> {
        self.fibers.get(id).ok_or(ReconcileError::StaleFiber(id))
    }

    /// Mutable variant of [`FiberArena::fiber`].
    pub fn fiber_mut(&mut self, id: FiberId) -> Result<&mut Fiber<N>> {
        self.fibers.get_mut(id).ok_or(ReconcileError::StaleFiber(id))
    }

    /// Child fibers of `id`, following the sibling chain.
    pub fn children(&self, id: FiberId) -> Children<'_, N> {
        Children {
            arena: self,
            next: self.get(id).and_then(|fiber| fiber.child),
        }
    }

    /// Nearest ancestor that owns a node (HOST or ROOT), skipping HOOK fibers.
    pub fn host_parent(&self, id: FiberId) -> Option<FiberId> {
        let mut current = self.get(id)?.parent;
        while let Some(parent) = current {
            let fiber = self.get(parent)?;
            if fiber.tag != FiberTag::Hook {
                return Some(parent);
            }
            current = fiber.parent;
        }
        None
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor(&self, ancestor: FiberId, id: FiberId) -> bool {
        let mut current = Some(id);
        while let Some(fiber) = current {
            if fiber == ancestor {
                return true;
            }
            current = self.get(fiber).and_then(|f| f.parent);
        }
        false
    }

    /// Remove `id` and all of its descendants, including their alternates.
    ///
    /// Returns the number of arena entries released.
    pub fn remove_subtree(&mut self, id: FiberId) -> usize {
        let mut removed = 0;
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            let Some(fiber) = self.fibers.remove(current) else {
                continue;
            };
            removed += 1;

            if let Some(alternate) = fiber.alternate {
                if self.fibers.remove(alternate).is_some() {
                    removed += 1;
                }
            }

            let mut child = fiber.child;
            while let Some(c) = child {
                stack.push(c);
                child = self.fibers.get(c).and_then(|f| f.sibling);
            }
        }

        removed
    }
}

/// Iterator over a fiber's children.
pub struct Children<'a, N> {
    arena: &'a FiberArena<N>,
    next: Option<FiberId>,
}

impl<N> Iterator for Children<'_, N> {
    type Item = FiberId;

    fn next(&mut self) -> Option<FiberId> {
        let current = self.next?;
        self.next = self.arena.get(current).and_then(|fiber| fiber.sibling);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PatchFlags;
    use crate::vnode::{Component, Props, component, h};

    fn link(arena: &mut FiberArena<u32>, parent: FiberId, children: &[FiberId]) {
        let mut prev: Option<FiberId> = None;
        for &child in children {
            arena.get_mut(child).unwrap().parent = Some(parent);
            match prev {
                Some(p) => arena.get_mut(p).unwrap().sibling = Some(child),
                None => arena.get_mut(parent).unwrap().child = Some(child),
            }
            prev = Some(child);
        }
    }

    fn host(arena: &mut FiberArena<u32>, tag: &str) -> FiberId {
        arena.insert(Fiber::from_vnode(&h(tag, Props::new()), PatchFlags::empty()))
    }

    #[test]
    fn test_children_iteration() {
        let mut arena = FiberArena::new();
        let root = arena.insert(Fiber::root(0u32, Vec::new()));
        let a = host(&mut arena, "a");
        let b = host(&mut arena, "b");
        let c = host(&mut arena, "c");
        link(&mut arena, root, &[a, b, c]);

        let children: Vec<_> = arena.children(root).collect();
        assert_eq!(children, vec![a, b, c]);
        assert_eq!(arena.children(a).count(), 0);
    }

    #[test]
    fn test_host_parent_skips_components() {
        let mut arena = FiberArena::new();
        let root = arena.insert(Fiber::root(0u32, Vec::new()));
        let comp = Component::new("Wrap", |_, _| Vec::new());
        let hook = arena.insert(Fiber::from_vnode(
            &component(&comp, Props::new()),
            PatchFlags::empty(),
        ));
        let leaf = host(&mut arena, "span");
        link(&mut arena, root, &[hook]);
        link(&mut arena, hook, &[leaf]);

        assert_eq!(arena.host_parent(leaf), Some(root));
        assert_eq!(arena.host_parent(hook), Some(root));
        assert_eq!(arena.host_parent(root), None);
        assert!(arena.is_ancestor(root, leaf));
        assert!(!arena.is_ancestor(leaf, root));
    }

    #[test]
    fn test_remove_subtree_keeps_siblings() {
        let mut arena = FiberArena::new();
        let root = arena.insert(Fiber::root(0u32, Vec::new()));
        let a = host(&mut arena, "a");
        let b = host(&mut arena, "b");
        let a1 = host(&mut arena, "a1");
        let a2 = host(&mut arena, "a2");
        link(&mut arena, root, &[a, b]);
        link(&mut arena, a, &[a1, a2]);

        let snapshot = arena.get(a1).unwrap().clone();
        let alt = arena.insert(snapshot);
        arena.get_mut(a1).unwrap().alternate = Some(alt);

        assert_eq!(arena.remove_subtree(a), 4, "a, a1, its alternate and a2");
        assert!(arena.contains(root));
        assert!(arena.contains(b), "sibling of the removed fiber survives");
        assert!(!arena.contains(a2));
        assert!(!arena.contains(alt));
    }

    #[test]
    fn test_stale_lookup_is_an_error() {
        let mut arena = FiberArena::new();
        let id = host(&mut arena, "x");
        arena.remove(id);
        assert!(matches!(arena.fiber(id), Err(ReconcileError::StaleFiber(stale)) if stale == id));
    }
}
