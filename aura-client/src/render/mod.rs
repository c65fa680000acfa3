//! Rendering context, collaborator interfaces and the headless document.
use crate::{Placement, ValueRef};
use aura_common::{GlobalId, RawValue};

mod document;
mod rendering;

pub use document::{Document, NodeKind};
pub use rendering::Rendering;

slotmap::new_key_type! {
    /// Identifies a platform node (element, text or comment).
    pub struct NodeId;
}

/// Live component, as seen by the value layer.
pub trait Component {
    fn global_id(&self) -> GlobalId;

    /// Returns false once the component has been destroyed.
    fn is_valid(&self) -> bool;

    fn is_rendered(&self) -> bool;

    /// First element produced by the last render of this component.
    fn element(&self) -> Option<NodeId>;
}

/// Creates and looks up components.
pub trait ComponentService {
    /// Instantiates a component from a raw config.
    ///
    /// The returned value must expose [`Component`] through `Value::as_component`.
    fn instantiate(&self, config: &RawValue, owner: Option<&ValueRef>) -> ValueRef;

    /// Looks up a live component by global id.
    fn get(&self, id: GlobalId) -> Option<ValueRef>;
}

/// Renders components to platform nodes.
pub trait Renderer {
    /// Renders a component, returning the produced top-level nodes (possibly none).
    ///
    /// The nodes are not inserted in the document.
    fn render(&self, component: &ValueRef) -> Vec<NodeId>;

    /// Rerenders a component in place.
    fn rerender(&self, component: &ValueRef);

    fn unrender(&self, component: &ValueRef);

    fn after_render(&self, component: &ValueRef);
}

/// Platform node tree operations.
pub trait Dom {
    fn insert_before(&self, nodes: &[NodeId], reference: NodeId);
    fn insert_after(&self, nodes: &[NodeId], reference: NodeId);
    fn insert_first(&self, nodes: &[NodeId], parent: NodeId);
    fn append_child(&self, nodes: &[NodeId], parent: NodeId);

    /// Detaches a node from its parent.
    fn remove_element(&self, node: NodeId);

    /// Creates a detached comment node.
    fn create_comment(&self, label: &str) -> NodeId;

    fn element_by_id(&self, id: &str) -> Option<NodeId>;

    /// Inserts nodes at the given placement.
    fn insert(&self, nodes: &[NodeId], placement: Placement) {
        if nodes.is_empty() {
            return;
        }
        match placement {
            Placement::AppendTo(parent) => self.append_child(nodes, parent),
            Placement::First(parent) => self.insert_first(nodes, parent),
            Placement::After(reference) => self.insert_after(nodes, reference),
            Placement::Before(reference) => self.insert_before(nodes, reference),
        }
    }
}
