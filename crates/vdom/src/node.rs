//! Immutable virtual node model.

use crate::component::Component;
use crate::error::NodeError;
use crate::props::Props;
use smallvec::SmallVec;
use std::collections::HashSet;

/// Ordered attribute list. Setting an existing name replaces its value in place.
pub type Attributes = SmallVec<(String, String), 4>;

/// Description of a piece of UI before reconciliation.
///
/// Nodes are immutable once built: the diff engine only ever reads them.
#[derive(Clone, Debug, PartialEq)]
pub enum VirtualNode {
    /// A text run.
    Text(String),
    /// A host element with attributes and children.
    Element(Element),
    /// A component reference with its props.
    Component(ComponentNode),
    /// Explicit no-render marker.
    Empty,
}

/// Shape of a node, used when deciding between in-place update and replacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Text,
    Element,
    Component,
    Empty,
}

/// Element payload of a [`VirtualNode`].
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    tag: String,
    attributes: Attributes,
    children: Vec<VirtualNode>,
    key: Option<String>,
}

impl Element {
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[VirtualNode] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

/// Component payload of a [`VirtualNode`].
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentNode {
    component: Component,
    props: Props,
    key: Option<String>,
}

impl ComponentNode {
    #[inline]
    #[must_use]
    pub const fn component(&self) -> &Component {
        &self.component
    }

    #[inline]
    #[must_use]
    pub const fn props(&self) -> &Props {
        &self.props
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl VirtualNode {
    /// A text node.
    #[inline]
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// The no-render marker.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self::Empty
    }

    /// Start building an element with the given tag.
    #[inline]
    #[must_use]
    pub fn element(tag: impl Into<String>) -> ElementBuilder {
        ElementBuilder::new(tag)
    }

    /// A component node. Children travel inside `props`.
    #[must_use]
    pub fn component(component: &Component, props: Props) -> Self {
        Self::Component(ComponentNode {
            component: component.clone(),
            props,
            key: None,
        })
    }

    /// Attach an explicit sibling key. Text and empty nodes have no identity of
    /// their own and are returned unchanged.
    #[must_use]
    pub fn keyed(self, key: impl Into<String>) -> Self {
        match self {
            Self::Element(mut element) => {
                element.key = Some(key.into());
                Self::Element(element)
            }
            Self::Component(mut node) => {
                node.key = Some(key.into());
                Self::Component(node)
            }
            other => other,
        }
    }

    /// Explicit sibling key, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Element(element) => element.key(),
            Self::Component(node) => node.key(),
            Self::Text(_) | Self::Empty => None,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Text(_) => NodeKind::Text,
            Self::Element(_) => NodeKind::Element,
            Self::Component(_) => NodeKind::Component,
            Self::Empty => NodeKind::Empty,
        }
    }

    /// Check the whole tree, including children passed through component props.
    ///
    /// # Errors
    /// Returns the first malformed element found.
    pub fn validate(&self) -> Result<(), NodeError> {
        match self {
            Self::Element(element) => {
                check_element(&element.tag, &element.attributes, &element.children)?;
                element.children.iter().try_for_each(Self::validate)
            }
            Self::Component(node) => {
                check_siblings(node.component.name(), node.props.children())?;
                node.props.children().iter().try_for_each(Self::validate)
            }
            Self::Text(_) | Self::Empty => Ok(()),
        }
    }
}

impl From<&str> for VirtualNode {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for VirtualNode {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Builder for element nodes. `build` validates tag, attributes and sibling keys.
#[derive(Debug, Clone)]
pub struct ElementBuilder {
    tag: String,
    attributes: Attributes,
    children: Vec<VirtualNode>,
    key: Option<String>,
}

impl ElementBuilder {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
            key: None,
        }
    }

    /// Set an attribute. A repeated name keeps its original position.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(existing, _)| *existing == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name, value));
        }
        self
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn child(mut self, child: impl Into<VirtualNode>) -> Self {
        self.children.push(child.into());
        self
    }

    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = VirtualNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Append a text child.
    #[must_use]
    pub fn text(self, value: impl Into<String>) -> Self {
        self.child(VirtualNode::text(value))
    }

    /// Finish the element.
    ///
    /// # Errors
    /// Fails on an empty or invalid tag, an invalid attribute name, or
    /// duplicate sibling keys among the children.
    pub fn build(self) -> Result<VirtualNode, NodeError> {
        check_element(&self.tag, &self.attributes, &self.children)?;
        Ok(VirtualNode::Element(Element {
            tag: self.tag,
            attributes: self.attributes,
            children: self.children,
            key: self.key,
        }))
    }
}

fn check_element(
    tag: &str,
    attributes: &Attributes,
    children: &[VirtualNode],
) -> Result<(), NodeError> {
    let mut chars = tag.chars();
    let Some(first) = chars.next() else {
        return Err(NodeError::EmptyTag);
    };
    if !first.is_ascii_alphabetic() || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '-') {
        return Err(NodeError::InvalidTag(tag.to_owned()));
    }
    for (name, _) in attributes.iter() {
        let malformed = name.is_empty()
            || name
                .chars()
                .any(|ch| ch.is_whitespace() || matches!(ch, '"' | '\'' | '<' | '>' | '/' | '='));
        if malformed {
            return Err(NodeError::InvalidAttribute {
                tag: tag.to_owned(),
                name: name.clone(),
            });
        }
    }
    check_siblings(tag, children)
}

fn check_siblings(parent: &str, children: &[VirtualNode]) -> Result<(), NodeError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(children.len());
    for key in children.iter().filter_map(VirtualNode::key) {
        if !seen.insert(key) {
            return Err(NodeError::DuplicateKey {
                parent: parent.to_owned(),
                key: key.to_owned(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_attribute_order_and_replaces_in_place() -> Result<(), NodeError> {
        let node = VirtualNode::element("span")
            .attr("class", "a")
            .attr("id", "x")
            .attr("class", "b")
            .text("Hello")
            .build()?;
        assert!(matches!(node, VirtualNode::Element(_)), "expected element");
        if let VirtualNode::Element(element) = node {
            let pairs: Vec<(&str, &str)> = element
                .attributes()
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()))
                .collect();
            assert_eq!(pairs, [("class", "b"), ("id", "x")]);
            assert_eq!(element.children(), [VirtualNode::text("Hello")]);
        }
        Ok(())
    }

    #[test]
    fn malformed_elements_fail_at_construction() {
        assert_eq!(VirtualNode::element("").build(), Err(NodeError::EmptyTag));
        assert_eq!(
            VirtualNode::element("1div").build(),
            Err(NodeError::InvalidTag("1div".into()))
        );
        assert!(matches!(
            VirtualNode::element("div").attr("on click", "x").build(),
            Err(NodeError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn duplicate_sibling_keys_are_rejected() -> Result<(), NodeError> {
        let item = |key: &str| VirtualNode::element("li").key(key).build();
        let result = VirtualNode::element("ul").child(item("a")?).child(item("a")?).build();
        assert_eq!(
            result,
            Err(NodeError::DuplicateKey {
                parent: "ul".into(),
                key: "a".into()
            })
        );
        Ok(())
    }

    #[test]
    fn keyed_only_applies_to_elements_and_components() -> Result<(), NodeError> {
        let text = VirtualNode::text("x").keyed("k");
        assert_eq!(text.key(), None);
        let element = VirtualNode::element("p").build()?.keyed("k");
        assert_eq!(element.key(), Some("k"));
        assert_eq!(element.kind(), NodeKind::Element);
        Ok(())
    }

    #[test]
    fn validate_descends_into_component_children() -> Result<(), NodeError> {
        let wrapper = Component::builder("Wrapper").build();
        let child = |key: &str| VirtualNode::element("b").key(key).build();
        let props = Props::new().with_children([child("x")?, child("x")?]);
        let node = VirtualNode::component(&wrapper, props);
        assert!(matches!(node.validate(), Err(NodeError::DuplicateKey { .. })));
        Ok(())
    }
}
