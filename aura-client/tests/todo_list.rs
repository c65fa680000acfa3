//! Drives a small list UI through the client: server round-trips, rerenders on unwind, removal.
use aura_client::{
    Action, ActionResponse, ArrayValue, Atom, Channel, ClientConfig, ClientService, Component, ComponentService,
    DestroyMode, Document, Dom, GlobalId, NodeId, RawValue, Renderer, Rendering, Transport, Value, ValueId, ValueRef,
    Variant,
};
use serde_json::json;
use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

struct Item {
    id: ValueId,
    global_id: GlobalId,
    label: String,
    valid: Cell<bool>,
    li: Cell<Option<NodeId>>,
}

impl Value for Item {
    fn id(&self) -> ValueId {
        self.id
    }
    fn variant(&self) -> Variant {
        Variant::Component
    }
    fn to_raw(&self) -> RawValue {
        json!({ "label": self.label })
    }
    fn destroy(&self, _mode: DestroyMode) {
        self.valid.set(false);
    }
    fn as_component(&self) -> Option<&dyn Component> {
        Some(self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Component for Item {
    fn global_id(&self) -> GlobalId {
        self.global_id
    }
    fn is_valid(&self) -> bool {
        self.valid.get()
    }
    fn is_rendered(&self) -> bool {
        self.li.get().is_some()
    }
    fn element(&self) -> Option<NodeId> {
        self.li.get()
    }
}

/// Renders its `items` attribute.
struct List {
    id: ValueId,
    global_id: GlobalId,
    items: RefCell<Option<Rc<ArrayValue>>>,
    rendered: Cell<bool>,
}

impl Value for List {
    fn id(&self) -> ValueId {
        self.id
    }
    fn variant(&self) -> Variant {
        Variant::Component
    }
    fn to_raw(&self) -> RawValue {
        RawValue::Null
    }
    fn destroy(&self, mode: DestroyMode) {
        if let Some(items) = self.items.take() {
            items.destroy(mode);
        }
    }
    fn as_component(&self) -> Option<&dyn Component> {
        Some(self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Component for List {
    fn global_id(&self) -> GlobalId {
        self.global_id
    }
    fn is_valid(&self) -> bool {
        true
    }
    fn is_rendered(&self) -> bool {
        self.rendered.get()
    }
    fn element(&self) -> Option<NodeId> {
        None
    }
}

struct ListRenderer {
    doc: Rc<Document>,
}

impl Renderer for ListRenderer {
    fn render(&self, component: &ValueRef) -> Vec<NodeId> {
        if let Some(item) = component.as_any().downcast_ref::<Item>() {
            let li = self.doc.create_element("li");
            let text = self.doc.create_text(&item.label);
            self.doc.append_child(&[text], li);
            item.li.set(Some(li));
            vec![li]
        } else if let Some(list) = component.as_any().downcast_ref::<List>() {
            list.rendered.set(true);
            let items = list.items.borrow().clone();
            items.map(|items| items.render(None)).unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    fn rerender(&self, component: &ValueRef) {
        if let Some(list) = component.as_any().downcast_ref::<List>() {
            let items = list.items.borrow().clone();
            if let Some(items) = items {
                items.rerender(None, false);
            }
        }
    }

    fn unrender(&self, component: &ValueRef) {
        if let Some(item) = component.as_any().downcast_ref::<Item>() {
            if let Some(li) = item.li.take() {
                self.doc.remove_element(li);
            }
        }
    }

    fn after_render(&self, _component: &ValueRef) {}
}

#[derive(Default)]
struct Items {
    live: RefCell<HashMap<GlobalId, Rc<Item>>>,
}

impl ComponentService for Items {
    fn instantiate(&self, config: &RawValue, _owner: Option<&ValueRef>) -> ValueRef {
        let item = Rc::new(Item {
            id: ValueId::next(),
            global_id: GlobalId::next(),
            label: config["label"].as_str().unwrap_or_default().to_string(),
            valid: Cell::new(true),
            li: Cell::new(None),
        });
        self.live.borrow_mut().insert(item.global_id, item.clone());
        item
    }

    fn get(&self, id: GlobalId) -> Option<ValueRef> {
        let item = self.live.borrow().get(&id).cloned()?;
        Some(item)
    }
}

#[derive(Default)]
struct Server {
    requests: RefCell<Vec<(Channel, Vec<aura_client::ActionRef>)>>,
}

impl Transport for Server {
    fn send(&self, actions: Vec<aura_client::ActionRef>, channel: Channel) {
        self.requests.borrow_mut().push((channel, actions));
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[test]
fn todo_list() {
    init_tracing();

    let doc = Rc::new(Document::new());
    let ul = doc.create_element_with_id("ul", "list");
    let components = Rc::new(Items::default());
    let rendering = Rendering::new(
        ClientConfig::default(),
        Rc::new(ListRenderer { doc: doc.clone() }),
        doc.clone(),
        components.clone(),
    );
    let server = Rc::new(Server::default());
    let client = ClientService::new(ClientConfig::default(), rendering.clone(), server.clone());

    let list: Rc<List> = Rc::new(List {
        id: ValueId::next(),
        global_id: GlobalId::next(),
        items: RefCell::new(None),
        rendered: Cell::new(false),
    });
    let list_value: ValueRef = list.clone();
    let items = ArrayValue::new(
        json!([{ "label": "milk" }]),
        Some(Atom::from("items")),
        Some(&list_value),
        &rendering,
    );
    items.set_is_owner(true);
    list.items.replace(Some(items.clone()));

    rendering.render_root(&list_value, "list");
    client.set_initialized();
    assert_eq!(doc.markup(ul), r#"<ul id="list"><li>milk</li></ul>"#);
    let milk = items.get(0).unwrap();

    // add an item once the server has answered
    let add = Action::server("c.addItem")
        .with_callback({
            let items = items.clone();
            move |action: &Action| items.push(json!({ "label": action.return_value() }))
        })
        .into_ref();
    client.run("click", || client.enqueue_action(add.clone(), false));
    let (channel, batch) = server.requests.borrow_mut().remove(0);
    assert_eq!(channel, Channel::Foreground);
    assert_eq!(batch.len(), 1);
    client.receive(channel, vec![(add.clone(), ActionResponse::success(json!("eggs")))]);

    assert_eq!(doc.markup(ul), r#"<ul id="list"><li>milk</li><li>eggs</li></ul>"#);
    assert!(!items.is_dirty());
    assert!(client.idle());

    // removal unrenders the item, and the array destroys it on commit
    client.run("click", || {
        items.remove(0);
    });
    assert_eq!(doc.markup(ul), r#"<ul id="list"><li>eggs</li></ul>"#);
    assert!(!milk.as_component().unwrap().is_valid());

    // an empty list keeps a locator where the items were
    client.run("clear", || items.clear());
    assert_eq!(doc.markup(ul), r#"<ul id="list"><!----></ul>"#);
    assert!(items.is_empty());
    assert!(client.diagnostics().is_empty());
}
