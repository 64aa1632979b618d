//! Fibers - Mutable units of reconciliation work.
//!
//! A fiber mirrors one vnode across renders. It carries tree links, the
//! patch flags computed by the diff, the list of descendant fibers whose
//! patches bubbled up to it, and ownership of either a host node or a
//! component instance.
//!
//! # Architecture
//!
//! Fibers live in a [`FiberArena`] and refer to each other by [`FiberId`]:
//!
//! ```text
//! parent ──child──▶ first ──sibling──▶ second ──sibling──▶ None
//!   ▲                 │                  │
//!   └─────parent──────┴──────parent──────┘
//! ```
//!
//! None of the links own anything. `alternate` points at a snapshot of the
//! fiber taken before this pass mutated it, and is released at commit.

mod arena;

pub use arena::*;

use std::rc::Rc;

use indexmap::IndexMap;

use crate::hooks::HookState;
use crate::types::{ChildKey, FiberTag, Key, PatchFlags};
use crate::vnode::{ElementType, Props, VNode};

slotmap::new_key_type! {
    /// Handle of a fiber in a [`FiberArena`].
    pub struct FiberId;
}

// =============================================================================
// Base
// =============================================================================

/// What a fiber owns in the outside world.
#[derive(Debug, Clone)]
pub enum Base<N> {
    /// Real node (HOST fibers, or the container of a ROOT fiber).
    Node(N),
    /// Component instance state (HOOK fibers).
    Instance(HookState),
}

// =============================================================================
// Fiber
// =============================================================================

#[derive(Debug, Clone)]
pub struct Fiber<N> {
    pub tag: FiberTag,
    /// `None` only for ROOT fibers.
    pub ty: Option<ElementType>,
    pub key: Option<Key>,
    pub props: Rc<Props>,
    pub base: Option<Base<N>>,

    pub parent: Option<FiberId>,
    pub child: Option<FiberId>,
    pub sibling: Option<FiberId>,
    pub alternate: Option<FiberId>,

    /// Current children by match key, in sibling order.
    pub children: IndexMap<ChildKey, FiberId>,

    pub patch: PatchFlags,
    pub patches: Vec<FiberId>,

    /// Position among reused keyed siblings, for move detection.
    pub index: Option<usize>,
}

impl<N> Fiber<N> {
    /// Root fiber wrapping `container`.
    pub fn root(container: N, children: Vec<VNode>) -> Self {
        Self {
            tag: FiberTag::Root,
            ty: None,
            key: None,
            props: Rc::new(Props {
                children,
                ..Props::default()
            }),
            base: Some(Base::Node(container)),
            parent: None,
            child: None,
            sibling: None,
            alternate: None,
            children: IndexMap::new(),
            patch: PatchFlags::empty(),
            patches: Vec::new(),
            index: None,
        }
    }

    /// Fresh fiber for a vnode that has no previous counterpart.
    pub fn from_vnode(vnode: &VNode, patch: PatchFlags) -> Self {
        let tag = match vnode.ty {
            ElementType::Component(_) => FiberTag::Hook,
            ElementType::Host(_) => FiberTag::Host,
        };
        Self {
            tag,
            ty: Some(vnode.ty.clone()),
            key: vnode.key.clone(),
            props: vnode.props.clone(),
            base: None,
            parent: None,
            child: None,
            sibling: None,
            alternate: None,
            children: IndexMap::new(),
            patch,
            patches: Vec::new(),
            index: None,
        }
    }

    /// Shallow same-value check: same type and same explicit key.
    ///
    /// Props are not compared; a matching fiber is always reused and
    /// receives the new props through [`Fiber::merge`].
    pub fn is_same(&self, vnode: &VNode) -> bool {
        self.ty.as_ref() == Some(&vnode.ty) && self.key == vnode.key
    }

    /// Copy the new description's fields onto a reused fiber.
    pub fn merge(&mut self, vnode: &VNode) {
        self.ty = Some(vnode.ty.clone());
        self.key = vnode.key.clone();
        self.props = vnode.props.clone();
    }

    /// Tag or component name, `"#root"` for roots.
    pub fn type_name(&self) -> &str {
        self.ty.as_ref().map(ElementType::name).unwrap_or("#root")
    }

    /// Real node owned by this fiber, if any.
    pub fn node(&self) -> Option<&N> {
        match &self.base {
            Some(Base::Node(node)) => Some(node),
            _ => None,
        }
    }

    /// Component instance state, if this is a mounted HOOK fiber.
    pub fn hook_state(&self) -> Option<&HookState> {
        match &self.base {
            Some(Base::Instance(state)) => Some(state),
            _ => None,
        }
    }

    /// Whether this fiber is backed by a node of its own.
    #[inline]
    pub fn has_own_node(&self) -> bool {
        self.tag == FiberTag::Host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vnode::{Component, component, h};

    #[test]
    fn test_tag_resolved_from_type() {
        let host: Fiber<u32> = Fiber::from_vnode(&h("div", Props::new()), PatchFlags::PLACE);
        assert_eq!(host.tag, FiberTag::Host);
        assert_eq!(host.patch, PatchFlags::PLACE);

        let comp = Component::new("App", |_, _| Vec::new());
        let hook: Fiber<u32> = Fiber::from_vnode(&component(&comp, Props::new()), PatchFlags::PLACE);
        assert_eq!(hook.tag, FiberTag::Hook);
        assert_eq!(hook.type_name(), "App");
        assert!(!hook.has_own_node());
    }

    #[test]
    fn test_is_same_checks_type_and_key() {
        let fiber: Fiber<u32> = Fiber::from_vnode(&h("li", Props::new()).key("a"), PatchFlags::PLACE);

        assert!(fiber.is_same(&h("li", Props::new().attr("class", "x")).key("a")));
        assert!(!fiber.is_same(&h("li", Props::new()).key("b")));
        assert!(!fiber.is_same(&h("span", Props::new()).key("a")));
    }

    #[test]
    fn test_merge_replaces_props() {
        let mut fiber: Fiber<u32> = Fiber::from_vnode(&h("li", Props::new()), PatchFlags::PLACE);
        fiber.merge(&h("li", Props::new().attr("class", "done")));
        assert_eq!(
            fiber.props.get("class").and_then(|v| v.as_str()),
            Some("done")
        );
    }

    #[test]
    fn test_root_fiber() {
        let root = Fiber::root(7u32, vec![h("p", Props::new())]);
        assert_eq!(root.tag, FiberTag::Root);
        assert_eq!(root.node(), Some(&7));
        assert_eq!(root.props.children.len(), 1);
        assert_eq!(root.type_name(), "#root");
    }
}
