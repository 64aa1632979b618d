//! In-memory document tree.
//!
//! Nodes are elements (tag + ordered attributes) or text. Every mutation
//! is counted in [`DocumentStats`] so callers can check that an update
//! touched only what it had to.

use std::fmt::Write as _;
use std::rc::Rc;

use indexmap::IndexMap;
use slotmap::SlotMap;
use thiserror::Error;

use super::Host;
use crate::types::AttrValue;
use crate::vnode::{NODE_VALUE, Props, TEXT_TAG};

slotmap::new_key_type! {
    /// Handle of a node in a [`Document`].
    pub struct NodeId;
}

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element {
        tag: Rc<str>,
        attrs: IndexMap<Rc<str>, AttrValue>,
    },
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Mutation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentStats {
    pub created: usize,
    pub inserted: usize,
    pub removed: usize,
    /// Nodes freed, descendants included.
    pub released: usize,
    /// Attribute or text writes (including removals).
    pub updated: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("text node {0:?} cannot have children")]
    TextParent(NodeId),
}

// =============================================================================
// Document
// =============================================================================

#[derive(Debug, Default)]
pub struct Document {
    nodes: SlotMap<NodeId, NodeData>,
    stats: DocumentStats,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.create(NodeKind::Element {
            tag: Rc::from(tag),
            attrs: IndexMap::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.create(NodeKind::Text(text.to_string()))
    }

    fn create(&mut self, kind: NodeKind) -> NodeId {
        self.stats.created += 1;
        self.nodes.insert(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        })
    }

    fn data(&self, id: NodeId) -> Result<&NodeData, DocumentError> {
        self.nodes.get(id).ok_or(DocumentError::UnknownNode(id))
    }

    fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData, DocumentError> {
        self.nodes.get_mut(id).ok_or(DocumentError::UnknownNode(id))
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Insert `child` before `anchor` (or append), detaching it first.
    ///
    /// An anchor equal to `child` means "keep it where it is".
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        anchor: Option<NodeId>,
    ) -> Result<(), DocumentError> {
        if let NodeKind::Text(_) = self.data(parent)?.kind {
            return Err(DocumentError::TextParent(parent));
        }
        self.data(child)?;
        if self.is_ancestor_or_self(child, parent) {
            return Err(DocumentError::Cycle { parent, child });
        }

        let anchor = match anchor {
            Some(anchor) if anchor == child => self.next_sibling(child),
            other => other,
        };
        if let Some(anchor) = anchor {
            if self.data(anchor)?.parent != Some(parent) {
                return Err(DocumentError::NotAChild {
                    parent,
                    child: anchor,
                });
            }
        }

        self.detach(child)?;

        let children = &mut self.data_mut(parent)?.children;
        let position = anchor
            .and_then(|anchor| children.iter().position(|&c| c == anchor))
            .unwrap_or(children.len());
        children.insert(position, child);
        self.data_mut(child)?.parent = Some(parent);
        self.stats.inserted += 1;
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        self.insert_before(parent, child, None)
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        if self.data(child)?.parent != Some(parent) {
            return Err(DocumentError::NotAChild { parent, child });
        }
        self.detach(child)?;
        self.stats.removed += 1;
        Ok(())
    }

    /// Detach `id` if it is attached, then free it and all of its
    /// descendants. Returns the number of nodes freed.
    pub fn release(&mut self, id: NodeId) -> Result<usize, DocumentError> {
        self.detach(id)?;

        let mut released = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(data) = self.nodes.remove(current) {
                stack.extend(data.children);
                released += 1;
            }
        }
        self.stats.released += released;
        Ok(released)
    }

    fn detach(&mut self, child: NodeId) -> Result<(), DocumentError> {
        let Some(old_parent) = self.data(child)?.parent else {
            return Ok(());
        };
        self.data_mut(old_parent)?.children.retain(|&c| c != child);
        self.data_mut(child)?.parent = None;
        Ok(())
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let position = siblings.iter().position(|&c| c == id)?;
        siblings.get(position + 1).copied()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id).map(|n| &n.kind)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { tag, .. } => Some(tag.as_ref()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&AttrValue> {
        match self.kind(id)? {
            NodeKind::Element { attrs, .. } => attrs.get(name),
            NodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) => Some(text.as_str()),
            NodeKind::Element { .. } => None,
        }
    }

    // -------------------------------------------------------------------------
    // Content
    // -------------------------------------------------------------------------

    pub fn set_attr(
        &mut self,
        id: NodeId,
        name: &str,
        value: AttrValue,
    ) -> Result<(), DocumentError> {
        if let NodeKind::Element { attrs, .. } = &mut self.data_mut(id)?.kind {
            attrs.insert(Rc::from(name), value);
            self.stats.updated += 1;
        }
        Ok(())
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Result<(), DocumentError> {
        if let NodeKind::Element { attrs, .. } = &mut self.data_mut(id)?.kind {
            if attrs.shift_remove(name).is_some() {
                self.stats.updated += 1;
            }
        }
        Ok(())
    }

    pub fn set_text(&mut self, id: NodeId, value: &str) -> Result<(), DocumentError> {
        if let NodeKind::Text(text) = &mut self.data_mut(id)?.kind {
            if text.as_str() != value {
                *text = value.to_string();
                self.stats.updated += 1;
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn stats(&self) -> DocumentStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = DocumentStats::default();
    }

    /// Serialize `id` and its subtree, e.g. `<ul><li>a</li></ul>`.
    pub fn to_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(id, &mut out);
        out
    }

    /// Serialize only the children of `id`.
    pub fn inner_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_markup(child, &mut out);
        }
        out
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => out.push_str(text),
            Some(NodeKind::Element { tag, attrs }) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    let _ = write!(out, " {}=\"{}\"", name, value);
                }
                out.push('>');
                for &child in self.children(id) {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{}>", tag);
            }
            None => {}
        }
    }
}

// =============================================================================
// Host Implementation
// =============================================================================

impl Host for Document {
    type Node = NodeId;

    fn create_node(&mut self, ty: &str, props: &Props) -> anyhow::Result<NodeId> {
        if ty == TEXT_TAG {
            let content = props
                .get(NODE_VALUE)
                .map(|v| v.to_string())
                .unwrap_or_default();
            return Ok(self.create_text(&content));
        }

        let id = self.create_element(ty);
        if let Some(NodeKind::Element { attrs, .. }) = self.nodes.get_mut(id).map(|n| &mut n.kind) {
            for (name, value) in &props.attrs {
                attrs.insert(name.clone(), value.clone());
            }
        }
        Ok(id)
    }

    fn update_node(&mut self, node: &NodeId, old: &Props, new: &Props) -> anyhow::Result<()> {
        if let Some(NodeKind::Text(_)) = self.kind(*node) {
            let content = new
                .get(NODE_VALUE)
                .map(|v| v.to_string())
                .unwrap_or_default();
            self.set_text(*node, &content)?;
            return Ok(());
        }

        for name in old.attrs.keys() {
            if !new.attrs.contains_key(name) {
                self.remove_attr(*node, name)?;
            }
        }
        for (name, value) in &new.attrs {
            if old.attrs.get(name) != Some(value) {
                self.set_attr(*node, name, value.clone())?;
            }
        }
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        anchor: Option<&NodeId>,
    ) -> anyhow::Result<()> {
        Document::insert_before(self, *parent, *child, anchor.copied())?;
        Ok(())
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> anyhow::Result<()> {
        Document::remove_child(self, *parent, *child)?;
        Ok(())
    }

    fn release_node(&mut self, node: &NodeId) -> anyhow::Result<()> {
        self.release(*node)?;
        Ok(())
    }

    fn first_child(&self, parent: &NodeId) -> Option<NodeId> {
        self.children(*parent).first().copied()
    }

    fn last_child(&self, parent: &NodeId) -> Option<NodeId> {
        self.children(*parent).last().copied()
    }
}
