//! Child keying - Turns a child list into a match-key map.
//!
//! Explicit keys are used as-is. Unkeyed children get a positional key
//! counted among the unkeyed siblings only, so inserting or moving keyed
//! children does not shift the identity of their unkeyed neighbours.
//! Reordering unkeyed children is not detected: they match by position.

use indexmap::IndexMap;

use crate::types::ChildKey;
use crate::vnode::VNode;

/// Key a child list, preserving order.
///
/// A repeated explicit key is reported and the later occurrence is skipped.
pub fn keyed_children(children: &[VNode]) -> IndexMap<ChildKey, VNode> {
    let mut keyed = IndexMap::with_capacity(children.len());
    let mut position = 0;

    for child in children {
        let key = match &child.key {
            Some(key) => ChildKey::Explicit(key.clone()),
            None => {
                position += 1;
                ChildKey::Positional(position - 1)
            }
        };

        if keyed.contains_key(&key) {
            tracing::warn!(
                key = %key,
                ty = child.ty.name(),
                "duplicate child key, later occurrence skipped"
            );
            continue;
        }
        keyed.insert(key, child.clone());
    }

    keyed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Key;
    use crate::vnode::{Props, h, text};

    #[test]
    fn test_explicit_and_positional_keys() {
        let children = vec![
            text("a"),
            h("li", Props::new()).key("x"),
            text("b"),
        ];
        let keyed = keyed_children(&children);
        let keys: Vec<_> = keyed.keys().cloned().collect();

        assert_eq!(
            keys,
            vec![
                ChildKey::Positional(0),
                ChildKey::Explicit(Key::from("x")),
                ChildKey::Positional(1),
            ],
            "positional keys count unkeyed siblings only"
        );
    }

    #[test]
    fn test_duplicate_keys_skipped() {
        let children = vec![
            h("li", Props::new().attr("n", 1)).key("a"),
            h("li", Props::new().attr("n", 2)).key("a"),
            h("li", Props::new()).key("b"),
        ];
        let keyed = keyed_children(&children);

        assert_eq!(keyed.len(), 2, "duplicate key should be skipped, not crash");
        let first = &keyed[&ChildKey::Explicit(Key::from("a"))];
        assert_eq!(first.props.get("n").and_then(|v| v.as_int()), Some(1));
    }

    #[test]
    fn test_empty_list() {
        assert!(keyed_children(&[]).is_empty());
    }
}
