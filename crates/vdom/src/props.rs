//! Component props and state values.

use crate::node::VirtualNode;
use serde_json::{Map, Value};

/// Opaque component state. Updates merge shallowly by top-level key.
pub type State = Map<String, Value>;

/// Convert a JSON value into a state object. Anything but an object becomes empty state.
#[inline]
#[must_use]
pub fn into_state(value: Value) -> State {
    match value {
        Value::Object(map) => map,
        _ => State::new(),
    }
}

/// Shallow merge: every top-level key of `partial` replaces the one in `target`.
pub fn merge_state(target: &mut State, partial: State) {
    for (name, value) in partial {
        target.insert(name, value);
    }
}

/// Props passed to a component: named values plus the children written inside it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props {
    values: Map<String, Value>,
    children: Vec<VirtualNode>,
}

impl Props {
    /// Empty props.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prop, replacing any previous value under the same name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Replace the children passed through to the component.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = VirtualNode>) -> Self {
        self.children = children.into_iter().collect();
        self
    }

    /// Raw prop value.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Prop rendered as text: strings verbatim, null or missing as empty, anything else as JSON.
    #[must_use]
    pub fn text(&self, name: &str) -> String {
        value_text(self.values.get(name))
    }

    /// Children written inside the component node.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[VirtualNode] {
        &self.children
    }
}

/// Text form of an optional JSON value, as used for props and state in render output.
#[must_use]
pub fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_shallow() {
        let mut state = into_state(json!({
            "text": "Deku Shield",
            "nested": { "left": 1, "right": 2 }
        }));
        merge_state(&mut state, into_state(json!({ "nested": { "left": 5 } })));
        assert_eq!(state.get("text"), Some(&json!("Deku Shield")));
        assert_eq!(state.get("nested"), Some(&json!({ "left": 5 })));
    }

    #[test]
    fn text_formats_values() {
        let props = Props::new().with("one", "Hello").with("count", 3).with("none", Value::Null);
        assert_eq!(props.text("one"), "Hello");
        assert_eq!(props.text("count"), "3");
        assert_eq!(props.text("none"), "");
        assert_eq!(props.text("missing"), "");
        assert_eq!(props.get("count"), Some(&json!(3)));
    }

    #[test]
    fn equality_covers_children() {
        let with_child = Props::new().with_children([VirtualNode::text("a")]);
        let other_child = Props::new().with_children([VirtualNode::text("b")]);
        assert_ne!(with_child, other_child);
        assert_eq!(with_child.clone(), with_child);
        assert_eq!(into_state(json!([1, 2])), State::new());
    }
}
