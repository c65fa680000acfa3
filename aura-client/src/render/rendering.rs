use crate::{ClientConfig, ComponentService, Dom, NodeId, Placement, Renderer, ValueRef};
use aura_common::{GlobalId, ValueId};
use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap, HashSet},
    rc::Rc,
};
use tracing::{trace, trace_span, warn};

/// Rendering context of a UI root.
///
/// Owns the dirty-set of the root, and the side table mapping locator nodes to the value that
/// created them.
pub struct Rendering {
    config: ClientConfig,
    renderer: Rc<dyn Renderer>,
    dom: Rc<dyn Dom>,
    components: Rc<dyn ComponentService>,
    /// Dirty values, in creation order.
    dirty: RefCell<BTreeMap<ValueId, ValueRef>>,
    /// Locator node -> owning value.
    locators: RefCell<HashMap<NodeId, ValueId>>,
}

impl Rendering {
    pub fn new(
        config: ClientConfig,
        renderer: Rc<dyn Renderer>,
        dom: Rc<dyn Dom>,
        components: Rc<dyn ComponentService>,
    ) -> Rc<Rendering> {
        Rc::new(Rendering {
            config,
            renderer,
            dom,
            components,
            dirty: Default::default(),
            locators: Default::default(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn renderer(&self) -> &dyn Renderer {
        &*self.renderer
    }

    pub fn dom(&self) -> &dyn Dom {
        &*self.dom
    }

    pub fn components(&self) -> &dyn ComponentService {
        &*self.components
    }

    //----------------------------------------------------------------------------------------------
    // Dirty-set

    pub fn add_dirty_value(&self, value: ValueRef) {
        self.dirty.borrow_mut().insert(value.id(), value);
    }

    pub fn remove_dirty_value(&self, id: ValueId) {
        self.dirty.borrow_mut().remove(&id);
    }

    pub fn has_dirty_values(&self) -> bool {
        !self.dirty.borrow().is_empty()
    }

    pub fn is_dirty_registered(&self, id: ValueId) -> bool {
        self.dirty.borrow().contains_key(&id)
    }

    /// Rerenders the components owning dirty values, then commits those values.
    ///
    /// Each owning component is rerendered at most once per pass. Values dirtied during the pass
    /// are left for the next one.
    pub fn rerender_dirty(&self, label: &str) {
        let dirty = std::mem::take(&mut *self.dirty.borrow_mut());
        if dirty.is_empty() {
            return;
        }
        let _span = trace_span!("rerender_dirty", label).entered();
        trace!("{} dirty values", dirty.len());

        let mut visited = HashSet::<GlobalId>::new();
        for value in dirty.values() {
            let Some(owner) = value.owner() else { continue };
            let Some(component) = owner.as_component() else { continue };
            if !component.is_valid() || !component.is_rendered() {
                continue;
            }
            if visited.insert(component.global_id()) {
                trace!("rerendering {:?}", component.global_id());
                self.renderer.rerender(&owner);
            }
        }

        for value in dirty.values() {
            value.commit(true);
        }
    }

    //----------------------------------------------------------------------------------------------
    // Locators

    /// Creates a locator comment node owned by the given value.
    ///
    /// The label is only computed when `debug_labels` is set.
    pub fn create_locator(&self, owner: ValueId, label: impl FnOnce() -> String) -> NodeId {
        let label = if self.config.debug_labels { label() } else { String::new() };
        let node = self.dom.create_comment(&label);
        self.locators.borrow_mut().insert(node, owner);
        node
    }

    /// Returns the value that created the given locator node.
    pub fn locator_owner(&self, node: NodeId) -> Option<ValueId> {
        self.locators.borrow().get(&node).copied()
    }

    /// Forgets a locator if it is owned by `owner`. Returns whether it was.
    pub fn release_locator(&self, node: NodeId, owner: ValueId) -> bool {
        let mut locators = self.locators.borrow_mut();
        if locators.get(&node) == Some(&owner) {
            locators.remove(&node);
            true
        } else {
            false
        }
    }

    //----------------------------------------------------------------------------------------------

    /// Renders a component into the element with the given id.
    ///
    /// Returns the produced nodes. They are left detached if there is no such element.
    pub fn render_root(&self, component: &ValueRef, container_id: &str) -> Vec<NodeId> {
        let nodes = self.renderer.render(component);
        match self.dom.element_by_id(container_id) {
            Some(container) => self.dom.insert(&nodes, Placement::AppendTo(container)),
            None => warn!("render_root: no element with id `{container_id}`"),
        }
        self.renderer.after_render(component);
        nodes
    }
}
