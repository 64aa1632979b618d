//! Vnodes - Immutable tree descriptions produced by application code.
//!
//! A vnode names either a host element (`"ul"`, `"li"`, `#text`) or a
//! stateful [`Component`], carries [`Props`] with its children, and an
//! optional explicit [`Key`].
//!
//! ```ignore
//! use spark_fiber::vnode::{h, text, Props};
//!
//! let list = h("ul", Props::new().children(vec![
//!     h("li", Props::new().child(text("a"))).key("a"),
//!     h("li", Props::new().child(text("b"))).key("b"),
//! ]));
//! ```

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::hooks::Hooks;
use crate::types::{AttrValue, Key};

/// Tag used for text vnodes. The text lives in the `nodeValue` attribute.
pub const TEXT_TAG: &str = "#text";

/// Attribute holding the content of a text vnode.
pub const NODE_VALUE: &str = "nodeValue";

// =============================================================================
// Props
// =============================================================================

/// Attributes plus ordered children of a vnode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    pub attrs: IndexMap<Rc<str>, AttrValue>,
    pub children: Vec<VNode>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute.
    pub fn attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(Rc::from(name), value.into());
        self
    }

    /// Append one child.
    pub fn child(mut self, child: VNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append several children.
    pub fn children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Look up an attribute.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }
}

// =============================================================================
// Component
// =============================================================================

/// Render function of a stateful component.
pub type RenderFn = dyn Fn(&Props, &mut Hooks<'_>) -> Vec<VNode>;

/// A stateful component type.
///
/// Two components are the same type only if they share the same render
/// function allocation, so create each component once and clone it into
/// every vnode that uses it.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    render: Rc<RenderFn>,
}

impl Component {
    pub fn new(
        name: &str,
        render: impl Fn(&Props, &mut Hooks<'_>) -> Vec<VNode> + 'static,
    ) -> Self {
        Self {
            name: Rc::from(name),
            render: Rc::new(render),
        }
    }

    /// Component name (used in logs and commit reports).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the render function.
    pub fn render(&self, props: &Props, hooks: &mut Hooks<'_>) -> Vec<VNode> {
        (self.render)(props, hooks)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.render, &other.render)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.name).finish()
    }
}

// =============================================================================
// Element Type
// =============================================================================

/// What a vnode renders to.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    /// Host node with the given tag.
    Host(Rc<str>),
    /// Stateful component whose render output becomes its children.
    Component(Component),
}

impl ElementType {
    /// Tag or component name.
    pub fn name(&self) -> &str {
        match self {
            ElementType::Host(tag) => tag.as_ref(),
            ElementType::Component(component) => component.name(),
        }
    }

    #[inline]
    pub fn is_component(&self) -> bool {
        matches!(self, ElementType::Component(_))
    }
}

// =============================================================================
// VNode
// =============================================================================

/// Immutable description of one node for one render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct VNode {
    pub ty: ElementType,
    pub key: Option<Key>,
    pub props: Rc<Props>,
}

impl VNode {
    /// Attach an explicit identity key.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Whether this vnode is a text node.
    pub fn is_text(&self) -> bool {
        matches!(&self.ty, ElementType::Host(tag) if &**tag == TEXT_TAG)
    }
}

/// Create a host vnode.
pub fn h(tag: &str, props: Props) -> VNode {
    VNode {
        ty: ElementType::Host(Rc::from(tag)),
        key: None,
        props: Rc::new(props),
    }
}

/// Create a text vnode.
pub fn text(content: impl Into<AttrValue>) -> VNode {
    VNode {
        ty: ElementType::Host(Rc::from(TEXT_TAG)),
        key: None,
        props: Rc::new(Props::new().attr(NODE_VALUE, content)),
    }
}

/// Create a vnode for a stateful component.
pub fn component(component: &Component, props: Props) -> VNode {
    VNode {
        ty: ElementType::Component(component.clone()),
        key: None,
        props: Rc::new(props),
    }
}
