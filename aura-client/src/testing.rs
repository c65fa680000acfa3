//! Fakes shared by the unit tests.
use crate::{
    action::ActionRef, ArrayValue, Channel, ClientConfig, ClientService, Component, ComponentService, Content,
    DestroyMode, Document, Dom, NodeId, RawValue, Renderer, Rendering, Transport, Value, ValueRef, Variant,
};
use aura_common::{ActionId, GlobalId, ValueId};
use serde_json::json;
use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A component rendering to a single text node (or to nothing), or to the items of its body.
pub(crate) struct TestComponent {
    id: ValueId,
    global_id: GlobalId,
    pub label: String,
    pub renders_nothing: bool,
    valid: Cell<bool>,
    rendered: Cell<bool>,
    element: Cell<Option<NodeId>>,
    nodes: RefCell<Vec<NodeId>>,
    pub body: RefCell<Option<Rc<ArrayValue>>>,
    pub destroy_count: Cell<usize>,
}

impl TestComponent {
    fn build(label: &str, renders_nothing: bool) -> Rc<TestComponent> {
        Rc::new(TestComponent {
            id: ValueId::next(),
            global_id: GlobalId::next(),
            label: label.to_string(),
            renders_nothing,
            valid: Cell::new(true),
            rendered: Cell::new(false),
            element: Cell::new(None),
            nodes: RefCell::new(Vec::new()),
            body: RefCell::new(None),
            destroy_count: Cell::new(0),
        })
    }

    pub fn new(label: &str) -> Rc<TestComponent> {
        TestComponent::build(label, false)
    }

    /// A component that renders to no nodes.
    pub fn empty(label: &str) -> Rc<TestComponent> {
        TestComponent::build(label, true)
    }

    pub fn as_value(self: &Rc<Self>) -> ValueRef {
        self.clone()
    }
}

impl Value for TestComponent {
    fn id(&self) -> ValueId {
        self.id
    }

    fn variant(&self) -> Variant {
        Variant::Component
    }

    fn to_raw(&self) -> RawValue {
        json!({ "component": self.label })
    }

    fn destroy(&self, _mode: DestroyMode) {
        self.destroy_count.set(self.destroy_count.get() + 1);
        self.valid.set(false);
    }

    fn as_component(&self) -> Option<&dyn Component> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Component for TestComponent {
    fn global_id(&self) -> GlobalId {
        self.global_id
    }

    fn is_valid(&self) -> bool {
        self.valid.get()
    }

    fn is_rendered(&self) -> bool {
        self.rendered.get()
    }

    fn element(&self) -> Option<NodeId> {
        self.element.get()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Renders [`TestComponent`]s into a [`Document`] and records every call.
pub(crate) struct TestRenderer {
    doc: Rc<Document>,
    pub log: RefCell<Vec<String>>,
}

impl TestRenderer {
    fn component<'a>(&self, value: &'a ValueRef) -> &'a TestComponent {
        value
            .as_any()
            .downcast_ref::<TestComponent>()
            .expect("TestRenderer only renders TestComponents")
    }

    pub fn take_log(&self) -> Vec<String> {
        self.log.take()
    }
}

impl Renderer for TestRenderer {
    fn render(&self, value: &ValueRef) -> Vec<NodeId> {
        let component = self.component(value);
        self.log.borrow_mut().push(format!("render {}", component.label));
        let body = component.body.borrow().clone();
        let nodes = match body {
            Some(body) => body.render(None),
            None if component.renders_nothing => Vec::new(),
            None => vec![self.doc.create_text(&component.label)],
        };
        component.element.set(nodes.first().copied());
        component.nodes.replace(nodes.clone());
        component.rendered.set(true);
        nodes
    }

    fn rerender(&self, value: &ValueRef) {
        let component = self.component(value);
        self.log.borrow_mut().push(format!("rerender {}", component.label));
        let body = component.body.borrow().clone();
        if let Some(body) = body {
            body.rerender(None, false);
        }
    }

    fn unrender(&self, value: &ValueRef) {
        let component = self.component(value);
        self.log.borrow_mut().push(format!("unrender {}", component.label));
        for node in component.nodes.take() {
            self.doc.remove_element(node);
        }
        component.element.set(None);
        component.rendered.set(false);
    }

    fn after_render(&self, value: &ValueRef) {
        let component = self.component(value);
        self.log.borrow_mut().push(format!("after_render {}", component.label));
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Creates [`TestComponent`]s from `{ "component": label }` configs, and keeps track of them.
#[derive(Default)]
pub(crate) struct TestComponentService {
    registry: RefCell<HashMap<GlobalId, Rc<TestComponent>>>,
}

impl TestComponentService {
    pub fn register(&self, component: &Rc<TestComponent>) {
        self.registry.borrow_mut().insert(component.global_id, component.clone());
    }
}

impl ComponentService for TestComponentService {
    fn instantiate(&self, config: &RawValue, _owner: Option<&ValueRef>) -> ValueRef {
        let label = match config {
            RawValue::String(label) => label.clone(),
            other => other["component"].as_str().unwrap_or("?").to_string(),
        };
        let component = TestComponent::new(&label);
        self.register(&component);
        component
    }

    fn get(&self, id: GlobalId) -> Option<ValueRef> {
        self.registry.borrow().get(&id).map(|c| c.as_value())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Records sent batches.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    pub sent: RefCell<Vec<(Channel, Vec<ActionRef>)>>,
}

impl RecordingTransport {
    /// Sent batches, as action ids.
    pub fn batches(&self) -> Vec<(Channel, Vec<ActionId>)> {
        self.sent
            .borrow()
            .iter()
            .map(|(channel, actions)| (*channel, actions.iter().map(|a| a.id()).collect()))
            .collect()
    }

    pub fn take(&self) -> Vec<(Channel, Vec<ActionRef>)> {
        self.sent.take()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, actions: Vec<ActionRef>, channel: Channel) {
        self.sent.borrow_mut().push((channel, actions));
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A UI root backed by the fakes above, with a `<div id="root">` container.
pub(crate) struct Harness {
    pub doc: Rc<Document>,
    pub renderer: Rc<TestRenderer>,
    pub components: Rc<TestComponentService>,
    pub rendering: Rc<Rendering>,
    pub root: NodeId,
}

impl Harness {
    pub fn new() -> Harness {
        Harness::with_config(ClientConfig::development())
    }

    pub fn with_config(config: ClientConfig) -> Harness {
        let doc = Rc::new(Document::new());
        let root = doc.create_element_with_id("div", "root");
        let renderer = Rc::new(TestRenderer {
            doc: doc.clone(),
            log: Default::default(),
        });
        let components = Rc::new(TestComponentService::default());
        let rendering = Rendering::new(config, renderer.clone(), doc.clone(), components.clone());
        Harness {
            doc,
            renderer,
            components,
            rendering,
            root,
        }
    }

    /// Creates and registers a component.
    pub fn component(&self, label: &str) -> Rc<TestComponent> {
        let component = TestComponent::new(label);
        self.components.register(&component);
        component
    }

    /// Creates a committed array value holding the given components.
    pub fn array_of(&self, items: &[&Rc<TestComponent>], owner: Option<&ValueRef>) -> Rc<ArrayValue> {
        let array = ArrayValue::new(RawValue::Array(Vec::new()), None, owner, &self.rendering);
        for item in items {
            array.push(Content::Value(item.as_value()));
        }
        array.commit(false);
        array
    }

    pub fn markup(&self) -> String {
        self.doc.markup(self.root)
    }

    pub fn client(&self, transport: &Rc<RecordingTransport>) -> ClientService {
        ClientService::new(self.rendering.config().clone(), self.rendering.clone(), transport.clone())
    }

    pub fn is_comment(&self, node: NodeId) -> bool {
        self.doc.is_comment(node)
    }
}
