//! Reconciliation of array values against the node tree.
use crate::{ArrayValue, NodeId, Value, ValueRef};
use aura_common::GlobalId;
use std::collections::{BTreeMap, HashSet};
use tracing::{trace, warn};

/// Where to insert nodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    /// At the end of the children of the given parent.
    AppendTo(NodeId),
    /// Before the first child of the given parent.
    First(NodeId),
    After(NodeId),
    Before(NodeId),
}

/// Render bookkeeping of an array value.
#[derive(Default)]
pub(crate) struct RenderState {
    /// Component -> anchor node (last node rendered for the component) of the last render.
    rendered: Option<BTreeMap<GlobalId, NodeId>>,
    /// Anchor of the whole array.
    reference_node: Option<NodeId>,
    has_been_rendered: bool,
}

impl ArrayValue {
    /// Renders every item, and returns the produced nodes in order.
    ///
    /// Items that render to nothing get a locator node. If the array is empty, the result is a
    /// single locator node. If `parent` is specified, the nodes are appended to it.
    pub fn render(&self, parent: Option<NodeId>) -> Vec<NodeId> {
        let rendering = self.rendering().clone();
        let mut rendered = BTreeMap::new();
        let mut nodes = Vec::new();

        for j in 0..self.len() {
            let Some(item) = self.component_at(j) else { continue };
            let Some(global_id) = item.as_component().map(|c| c.global_id()) else { continue };
            let item_nodes = rendering.renderer().render(&item);
            let anchor = match item_nodes.last() {
                Some(&last) => {
                    nodes.extend_from_slice(&item_nodes);
                    last
                }
                None => {
                    let locator = self.create_locator(|| format!(" item {global_id:?}"));
                    nodes.push(locator);
                    locator
                }
            };
            rendered.insert(global_id, anchor);
        }

        let reference = match nodes.first() {
            Some(&first) => first,
            None => {
                let owner = self.owner_label();
                let locator = self.create_locator(|| format!(" array locator {owner:?}"));
                nodes.push(locator);
                locator
            }
        };
        self.set_reference_node(Some(reference));

        if let Some(parent) = parent {
            rendering.dom().insert(&nodes, Placement::AppendTo(parent));
        }

        let mut state = self.render.borrow_mut();
        state.rendered = Some(rendered);
        state.has_been_rendered = true;
        nodes
    }

    /// Brings the rendered nodes in line with the current items.
    ///
    /// Does nothing if the array was never rendered.
    ///
    /// # Arguments
    /// * `supplied_reference` insertion point used if the array has no anchor yet, or if `append_child` is set
    /// * `append_child` whether `supplied_reference` is the parent element rather than a sibling
    ///
    /// # Details
    /// - items never rendered are rendered and inserted after the running reference node, then
    ///   `after_render` is called. A new first item goes before the anchor of the array instead (or
    ///   becomes the first child of the parent when `append_child` is set)
    /// - items already rendered are rerendered in place, and their anchor is looked up in the
    ///   previous render, falling back to the component element
    /// - items of the previous render that are gone are unrendered if their component is still valid
    /// - if the array is now empty and something was rendered before, a locator is inserted after
    ///   the previous anchor first, so that the array keeps a position in the tree
    pub fn rerender(&self, supplied_reference: Option<NodeId>, mut append_child: bool) {
        let (prev_rendered, start_reference) = {
            let state = self.render.borrow();
            if !state.has_been_rendered {
                return;
            }
            (state.rendered.clone().unwrap_or_default(), state.reference_node)
        };
        let rendering = self.rendering().clone();
        let dom = rendering.dom();

        let mut rendered = BTreeMap::new();
        let mut present = HashSet::new();
        let mut first_reference = None;
        let mut reference = if append_child || start_reference.is_none() {
            supplied_reference
        } else {
            start_reference
        };

        let len = self.len();
        for j in 0..len {
            let Some(item) = self.component_at(j) else { continue };
            let Some(component) = item.as_component() else { continue };
            let global_id = component.global_id();
            present.insert(global_id);

            let item_reference = if !component.is_rendered() {
                let mut nodes = rendering.renderer().render(&item);
                let anchor = match nodes.last() {
                    Some(&last) => last,
                    None => {
                        let locator =
                            self.create_locator(|| format!(" item {{rerendered, index:{j}}} {global_id:?}"));
                        nodes.push(locator);
                        locator
                    }
                };
                match reference {
                    Some(reference) => {
                        let placement = match (append_child, j == 0) {
                            (true, true) => Placement::First(reference),
                            (true, false) => Placement::AppendTo(reference),
                            (false, true) => Placement::Before(reference),
                            (false, false) => Placement::After(reference),
                        };
                        dom.insert(&nodes, placement);
                    }
                    None => warn!("rerender: no insertion point for item {j} of {:?}", self.id()),
                }
                rendering.renderer().after_render(&item);
                Some(anchor)
            } else {
                rendering.renderer().rerender(&item);
                prev_rendered.get(&global_id).copied().or_else(|| component.element())
            };

            if first_reference.is_none() {
                first_reference = item_reference;
            }
            if let Some(item_reference) = item_reference {
                // next item goes after this one
                reference = Some(item_reference);
                self.set_reference_node(Some(item_reference));
                rendered.insert(global_id, item_reference);
            }
            append_child = false;
        }

        if len == 0 && !prev_rendered.is_empty() {
            let owner = self.owner_label();
            let locator = self.create_locator(|| format!(" array locator {owner:?}"));
            match start_reference {
                Some(start) => dom.insert(&[locator], Placement::After(start)),
                None => warn!("rerender: {:?} has no anchor for its locator", self.id()),
            }
            first_reference = Some(locator);
        }

        for global_id in prev_rendered.keys() {
            if present.contains(global_id) {
                continue;
            }
            let Some(component) = rendering.components().get(*global_id) else { continue };
            if component.as_component().map_or(false, |c| c.is_valid()) {
                trace!("unrendering {global_id:?}");
                rendering.renderer().unrender(&component);
            }
        }

        self.set_reference_node(first_reference.or(start_reference));
        self.render.borrow_mut().rendered = Some(rendered);
    }

    /// Forgets the rendered nodes.
    pub fn unrender(&self) {
        self.set_reference_node(None);
        self.render.borrow_mut().rendered = None;
    }

    /// Anchor node of the array in the tree.
    pub fn reference_node(&self) -> Option<NodeId> {
        self.render.borrow().reference_node
    }

    pub fn has_been_rendered(&self) -> bool {
        self.render.borrow().has_been_rendered
    }

    /// Anchor of the given component in the last render.
    pub fn rendered_anchor(&self, component: GlobalId) -> Option<NodeId> {
        self.render.borrow().rendered.as_ref()?.get(&component).copied()
    }

    /// Replaces the anchor node. If the previous anchor is a locator created by this value, it is
    /// removed from the tree.
    pub(crate) fn set_reference_node(&self, node: Option<NodeId>) {
        let previous = self.render.borrow().reference_node;
        if previous == node {
            return;
        }
        if let Some(previous) = previous {
            let rendering = self.rendering();
            if rendering.release_locator(previous, self.id()) {
                rendering.dom().remove_element(previous);
            }
        }
        self.render.borrow_mut().reference_node = node;
    }

    pub(crate) fn create_locator(&self, label: impl FnOnce() -> String) -> NodeId {
        self.rendering().create_locator(self.id(), label)
    }

    pub(crate) fn forget_rendered(&self) {
        self.render.borrow_mut().rendered = None;
    }

    /// Returns the item at `index` as a component.
    ///
    /// Raw entries are instantiated and written back into the live content.
    fn component_at(&self, index: usize) -> Option<ValueRef> {
        let item = self.get(index)?;
        if item.as_component().is_some() {
            return Some(item);
        }
        warn!("item {index} of {:?} is not a component, instantiating it", self.id());
        let owner = self.owner();
        let component = self.rendering().components().instantiate(&item.to_raw(), owner.as_ref());
        self.replace_live(index, component.clone());
        Some(component)
    }
}
