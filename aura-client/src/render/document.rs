//! Headless in-memory node tree.
use crate::{Dom, NodeId};
use slotmap::{SecondaryMap, SlotMap};
use std::{cell::RefCell, fmt::Write};
use tracing::warn;

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Kind of a node in a [`Document`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Element { tag: String, id: Option<String> },
    Text(String),
    Comment(String),
}

#[derive(Copy, Clone, Debug, Default)]
struct TreeInfo {
    parent: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

#[derive(Copy, Clone, Debug, Default)]
struct ContainerInfo {
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
}

#[derive(Default)]
struct DocumentInner {
    nodes: SlotMap<NodeId, NodeKind>,
    tree: SecondaryMap<NodeId, TreeInfo>,
    containers: SecondaryMap<NodeId, ContainerInfo>,
}

impl DocumentInner {
    fn create(&mut self, kind: NodeKind) -> NodeId {
        let is_element = matches!(kind, NodeKind::Element { .. });
        let id = self.nodes.insert(kind);
        self.tree.insert(id, TreeInfo::default());
        if is_element {
            self.containers.insert(id, ContainerInfo::default());
        }
        id
    }

    fn detach(&mut self, node: NodeId) {
        let Some(info) = self.tree.get(node).copied() else { return };
        let Some(parent) = info.parent else { return };
        match info.prev_sibling {
            None => self.containers[parent].first_child = info.next_sibling,
            Some(prev) => self.tree[prev].next_sibling = info.next_sibling,
        }
        match info.next_sibling {
            None => self.containers[parent].last_child = info.prev_sibling,
            Some(next) => self.tree[next].prev_sibling = info.prev_sibling,
        }
        self.tree[node] = TreeInfo::default();
    }

    /// Inserts `node` into `parent`, before `reference` or at the end.
    fn link(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        if !self.containers.contains_key(parent) {
            warn!("cannot insert into {parent:?}: not an element");
            return;
        }
        if Some(node) == reference || node == parent {
            return;
        }
        if !self.nodes.contains_key(node) {
            warn!("cannot insert {node:?}: node was freed");
            return;
        }
        self.detach(node);

        let prev_sibling = match reference {
            Some(before) => self.tree[before].prev_sibling,
            None => self.containers[parent].last_child,
        };
        self.tree.insert(
            node,
            TreeInfo {
                parent: Some(parent),
                prev_sibling,
                next_sibling: reference,
            },
        );
        match reference {
            Some(before) => self.tree[before].prev_sibling = Some(node),
            None => self.containers[parent].last_child = Some(node),
        }
        match prev_sibling {
            Some(prev) => self.tree[prev].next_sibling = Some(node),
            None => self.containers[parent].first_child = Some(node),
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.get(node).and_then(|info| info.parent)
    }

    fn children(&self, parent: NodeId) -> Vec<NodeId> {
        let mut children = Vec::new();
        let mut next = self.containers.get(parent).and_then(|c| c.first_child);
        while let Some(child) = next {
            children.push(child);
            next = self.tree[child].next_sibling;
        }
        children
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node] {
            NodeKind::Element { tag, id } => {
                match id {
                    Some(id) => {
                        let _ = write!(out, "<{tag} id=\"{id}\">");
                    }
                    None => {
                        let _ = write!(out, "<{tag}>");
                    }
                }
                for child in self.children(node) {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(label) => {
                let _ = write!(out, "<!--{label}-->");
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A [`Dom`] backed by an in-memory tree.
///
/// Removed elements and text nodes are only detached from their parent, so that they can be
/// inserted again. Removed comments are freed.
#[derive(Default)]
pub struct Document {
    inner: RefCell<DocumentInner>,
}

impl Document {
    pub fn new() -> Document {
        Document::default()
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.borrow_mut().create(NodeKind::Element {
            tag: tag.to_string(),
            id: None,
        })
    }

    /// Creates an element with an `id` attribute, findable with `element_by_id`.
    pub fn create_element_with_id(&self, tag: &str, id: &str) -> NodeId {
        self.inner.borrow_mut().create(NodeKind::Element {
            tag: tag.to_string(),
            id: Some(id.to_string()),
        })
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner.borrow_mut().create(NodeKind::Text(text.to_string()))
    }

    /// Number of live nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.inner.borrow().nodes.get(node).cloned()
    }

    pub fn is_comment(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(NodeKind::Comment(_)))
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().parent(node)
    }

    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        self.inner.borrow().children(parent)
    }

    /// Serializes a subtree, e.g. `<ul><li>a</li><!--locator--></ul>`.
    pub fn markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.inner.borrow().write_markup(node, &mut out);
        out
    }
}

impl Dom for Document {
    fn insert_before(&self, nodes: &[NodeId], reference: NodeId) {
        let mut inner = self.inner.borrow_mut();
        let Some(parent) = inner.parent(reference) else {
            warn!("insert_before: reference node {reference:?} is detached");
            return;
        };
        for &node in nodes {
            inner.link(parent, node, Some(reference));
        }
    }

    fn insert_after(&self, nodes: &[NodeId], reference: NodeId) {
        let mut inner = self.inner.borrow_mut();
        let Some(parent) = inner.parent(reference) else {
            warn!("insert_after: reference node {reference:?} is detached");
            return;
        };
        let next = inner.tree[reference].next_sibling;
        for &node in nodes {
            inner.link(parent, node, next);
        }
    }

    fn insert_first(&self, nodes: &[NodeId], parent: NodeId) {
        let mut inner = self.inner.borrow_mut();
        let first = inner.containers.get(parent).and_then(|c| c.first_child);
        for &node in nodes {
            inner.link(parent, node, first);
        }
    }

    fn append_child(&self, nodes: &[NodeId], parent: NodeId) {
        let mut inner = self.inner.borrow_mut();
        for &node in nodes {
            inner.link(parent, node, None);
        }
    }

    fn remove_element(&self, node: NodeId) {
        let mut inner = self.inner.borrow_mut();
        inner.detach(node);
        if matches!(inner.nodes.get(node), Some(NodeKind::Comment(_))) {
            inner.nodes.remove(node);
            inner.tree.remove(node);
        }
    }

    fn create_comment(&self, label: &str) -> NodeId {
        self.inner.borrow_mut().create(NodeKind::Comment(label.to_string()))
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let inner = self.inner.borrow();
        inner.nodes.iter().find_map(|(node, kind)| match kind {
            NodeKind::Element { id: Some(node_id), .. } if node_id == id => Some(node),
            _ => None,
        })
    }
}
