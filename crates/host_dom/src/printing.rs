use super::dom::{DomNode, DomTree, NodeKind};
use indextree::NodeId;
use serde_json::{Map, Value, json};

// -----------------------
// Module-scope helpers
// -----------------------

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

fn write_node(tree: &DomTree, id: NodeId, out: &mut String) {
    let Some(node_ref) = tree.arena.get(id) else {
        return;
    };
    let DomNode { kind, attrs, .. } = node_ref.get();
    match kind {
        NodeKind::MountPoint => write_children(tree, id, out),
        NodeKind::Element { tag } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs.iter() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attr(value, out);
                out.push('"');
            }
            out.push('>');
            write_children(tree, id, out);
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeKind::Text { text } => escape_text(text, out),
    }
}

fn write_children(tree: &DomTree, id: NodeId, out: &mut String) {
    for child in id.children(&tree.arena) {
        write_node(tree, child, out);
    }
}

fn node_to_json(tree: &DomTree, id: NodeId) -> Value {
    let Some(node_ref) = tree.arena.get(id) else {
        return Value::Null;
    };
    let DomNode { kind, attrs, .. } = node_ref.get();
    let children: Vec<Value> = id
        .children(&tree.arena)
        .map(|child| node_to_json(tree, child))
        .filter(|value| !value.is_null())
        .collect();
    match kind {
        NodeKind::MountPoint => json!({ "type": "mount", "children": children }),
        NodeKind::Element { tag } => {
            let mut attrs_obj = Map::new();
            for (name, value) in attrs.iter() {
                attrs_obj.insert(name.clone(), Value::String(value.clone()));
            }
            json!({
                "type": "element",
                "tag": tag,
                "attrs": Value::Object(attrs_obj),
                "children": children,
            })
        }
        // Empty placeholders carry no content.
        NodeKind::Text { text } if text.is_empty() => Value::Null,
        NodeKind::Text { text } => json!({ "type": "text", "text": text }),
    }
}

impl DomTree {
    /// Serialize everything attached to the mount point, like `innerHTML`.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        write_node(self, self.mount_point, &mut out);
        out
    }

    /// Build a deterministic JSON representation of the mounted output.
    /// Schema:
    /// - Mount point: { "type":"mount", "children":[ ... ] }
    /// - Element: { "type":"element", "tag": "div", "attrs": {..}, "children":[ ... ] }
    /// - Text: { "type":"text", "text":"..." }
    pub fn to_json_value(&self) -> Value {
        node_to_json(self, self.mount_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use vdom::{HostRenderer as _, NodeKey};

    #[test]
    fn escapes_text_and_attributes() -> Result<()> {
        let mut tree = DomTree::new();
        tree.create_element(NodeKey(1), "p")?;
        tree.set_attribute(NodeKey(1), "title", r#"a "b" & c"#)?;
        tree.create_text(NodeKey(2), "1 < 2 & 3 > 2")?;
        tree.insert_child(NodeKey(1), NodeKey(2), 0)?;
        tree.attach_root(NodeKey(1))?;
        assert_eq!(
            tree.inner_html(),
            r#"<p title="a &quot;b&quot; &amp; c">1 &lt; 2 &amp; 3 &gt; 2</p>"#
        );
        Ok(())
    }

    #[test]
    fn json_snapshot_skips_empty_placeholders() -> Result<()> {
        let mut tree = DomTree::new();
        tree.create_element(NodeKey(1), "div")?;
        tree.set_attribute(NodeKey(1), "name", "ComponentA")?;
        tree.create_text(NodeKey(2), "")?;
        tree.insert_child(NodeKey(1), NodeKey(2), 0)?;
        tree.attach_root(NodeKey(1))?;
        assert_eq!(
            tree.to_json_value(),
            json!({
                "type": "mount",
                "children": [{
                    "type": "element",
                    "tag": "div",
                    "attrs": { "name": "ComponentA" },
                    "children": [],
                }],
            })
        );
        Ok(())
    }
}
