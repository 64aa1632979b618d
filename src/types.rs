//! Core types for spark-fiber.
//!
//! These types are shared by every stage of the reconciler: the vnode
//! description, the fiber arena, the diff and the commit engine.

use std::fmt;
use std::rc::Rc;

// =============================================================================
// Fiber Tag
// =============================================================================

/// What kind of work a fiber represents.
///
/// Resolved once when the fiber is created from its vnode type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FiberTag {
    /// Top-level fiber wrapping a container node. Never mutated by commit.
    Root,
    /// Fiber backed by a real node in the host tree.
    Host,
    /// Stateful component. Owns hook state, has no node of its own.
    Hook,
}

// =============================================================================
// Patch Flags
// =============================================================================

bitflags::bitflags! {
    /// Real-tree mutation a fiber needs at commit time.
    ///
    /// `UPDATE | PLACE` marks a reused fiber whose content is updated in
    /// place and whose node must also move.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PatchFlags: u8 {
        /// Insert (or move) the node before its anchor.
        const PLACE = 1 << 0;
        /// Apply a props diff to the existing node.
        const UPDATE = 1 << 1;
        /// Remove the subtree's nodes.
        const DELETE = 1 << 2;
    }
}

// =============================================================================
// Keys
// =============================================================================

/// Explicit identity key attached to a vnode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Str(Rc<str>),
    Int(i64),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(Rc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(Rc::from(s))
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Int(i as i64)
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Int(i as i64)
    }
}

/// Key under which a child is matched across renders.
///
/// Explicit keys survive reordering. Positional keys only identify a child
/// as long as it stays at the same position among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChildKey {
    Explicit(Key),
    Positional(usize),
}

impl ChildKey {
    /// Whether this key came from the vnode itself.
    #[inline]
    pub fn is_explicit(&self) -> bool {
        matches!(self, ChildKey::Explicit(_))
    }
}

impl fmt::Display for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildKey::Explicit(key) => write!(f, "{}", key),
            ChildKey::Positional(index) => write!(f, ".{}", index),
        }
    }
}

// =============================================================================
// Attribute Values
// =============================================================================

/// Value of a single attribute in [`Props`](crate::vnode::Props).
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl AttrValue {
    /// String view, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Integer view, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Boolean view, if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(Rc::from(s))
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(Rc::from(s))
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<i32> for AttrValue {
    fn from(i: i32) -> Self {
        AttrValue::Int(i as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}
