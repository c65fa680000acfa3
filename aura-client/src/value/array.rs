use super::{
    create, downgrade_owner, upgrade_owner, Content, ContentRef, DestroyMode, Handler, HandlerMap, Value, ValueEvent,
    ValueRef, Variant,
};
use crate::{reconcile::RenderState, Placement, Rendering};
use aura_common::{Atom, GlobalId, RawValue, ValueId};
use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::HashSet,
    fmt,
    rc::{Rc, Weak},
};

////////////////////////////////////////////////////////////////////////////////////////////////////

struct ArrayState {
    /// Last committed content. `None` once destroyed.
    committed: Option<Rc<Vec<ValueRef>>>,
    /// Content being edited. Shares storage with `committed` until first modified.
    pending: Option<Rc<Vec<ValueRef>>>,
    dirty: bool,
    /// False if the committed value was set to null, as opposed to an empty array.
    has_real_value: bool,
    /// Same as `has_real_value`, for the pending content.
    pending_has_real_value: bool,
    /// Whether replaced children are destroyed on commit.
    is_owner: bool,
}

/// A value holding an ordered list of child values.
pub struct ArrayValue {
    id: ValueId,
    this: Weak<ArrayValue>,
    rendering: Rc<Rendering>,
    owner: Option<Weak<dyn Value>>,
    name: Option<Atom>,
    fire_events: Cell<bool>,
    initialized: Cell<bool>,
    state: RefCell<ArrayState>,
    handlers: RefCell<HandlerMap>,
    pub(crate) render: RefCell<RenderState>,
}

impl ArrayValue {
    /// Creates an array value from a raw config, an existing array value, or a single item.
    ///
    /// `def` is the name of the attribute definition, if any. `owner` is the component owning the value.
    pub fn new(
        config: impl Into<Content>,
        def: Option<Atom>,
        owner: Option<&ValueRef>,
        rendering: &Rc<Rendering>,
    ) -> Rc<ArrayValue> {
        let value = Rc::new_cyclic(|this| ArrayValue {
            id: ValueId::next(),
            this: this.clone(),
            rendering: rendering.clone(),
            owner: downgrade_owner(owner),
            name: def,
            fire_events: Cell::new(false),
            initialized: Cell::new(false),
            state: RefCell::new(ArrayState {
                committed: None,
                pending: None,
                dirty: false,
                has_real_value: true,
                pending_has_real_value: true,
                is_owner: false,
            }),
            handlers: Default::default(),
            render: Default::default(),
        });
        value.set_value(config, false);
        value.commit(false);
        value.fire_events.set(true);
        value.initialized.set(true);
        value
    }

    pub(crate) fn rendering(&self) -> &Rc<Rendering> {
        &self.rendering
    }

    /// Name of the attribute definition this value was created for.
    pub fn name(&self) -> Option<&Atom> {
        self.name.as_ref()
    }

    /// The live content: pending if dirty, committed otherwise.
    pub fn array(&self) -> Rc<Vec<ValueRef>> {
        let state = self.state.borrow();
        let live = if state.dirty { &state.pending } else { &state.committed };
        live.clone().unwrap_or_default()
    }

    pub fn get(&self, index: usize) -> Option<ValueRef> {
        self.array().get(index).cloned()
    }

    /// Returns the raw form of the item at `index`.
    pub fn get_raw(&self, index: usize) -> Option<RawValue> {
        self.get(index).map(|item| item.to_raw())
    }

    pub fn len(&self) -> usize {
        self.array().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the value was set to null.
    pub fn is_unset(&self) -> bool {
        let state = self.state.borrow();
        if state.dirty {
            !state.pending_has_real_value
        } else {
            !state.has_real_value
        }
    }

    pub fn set_is_owner(&self, is_owner: bool) {
        self.state.borrow_mut().is_owner = is_owner;
    }

    /// Whether the pending content has diverged from the committed one.
    pub fn is_different_array(&self) -> bool {
        let state = self.state.borrow();
        match (&state.pending, &state.committed) {
            (Some(pending), Some(committed)) => state.dirty && !Rc::ptr_eq(pending, committed),
            _ => state.dirty,
        }
    }

    /// Calls `f` with each item and its index, in order or in reverse.
    pub fn each(&self, mut f: impl FnMut(&ValueRef, usize), reverse: bool) {
        let items = self.array();
        if reverse {
            items.iter().enumerate().rev().for_each(|(i, item)| f(item, i));
        } else {
            items.iter().enumerate().for_each(|(i, item)| f(item, i));
        }
    }

    /// Replaces the content.
    ///
    /// Arrays and array values are unwrapped into their items, null empties the value and marks it
    /// unset, anything else becomes the single item.
    pub fn set_value(&self, content: impl Into<Content>, skip_change: bool) {
        let content = content.into();
        let is_null = matches!(content, Content::Raw(RawValue::Null));
        let items: Vec<Content> = match content {
            Content::Raw(RawValue::Null) => Vec::new(),
            Content::Raw(RawValue::Array(items)) => items.into_iter().map(Content::Raw).collect(),
            Content::Value(value) => {
                let unwrapped = value.as_array().map(|array| array.array());
                match unwrapped {
                    Some(items) => items.iter().cloned().map(Content::Value).collect(),
                    None => vec![Content::Value(value)],
                }
            }
            other => vec![other],
        };

        self.fire_events.set(false);
        {
            let mut state = self.state.borrow_mut();
            state.pending = Some(Rc::default());
            state.pending_has_real_value = !is_null;
        }
        self.make_dirty();
        for item in items {
            self.push(item);
        }
        self.fire_events.set(true);
        if !skip_change {
            self.fire("change");
        }
    }

    pub fn clear(&self) {
        self.set_value(RawValue::Array(Vec::new()), false);
    }

    /// Appends an item.
    pub fn push(&self, content: impl Into<Content>) {
        let value = self.create_child(content.into());
        value.make_dirty();
        self.make_dirty();
        self.modify(|items| items.push(value.clone()));
        self.state.borrow_mut().pending_has_real_value = true;
        self.add_value_handlers(&value);
    }

    /// Inserts an item at `index`. Does nothing if the index is negative or past the end.
    pub fn insert(&self, index: isize, content: impl Into<Content>) {
        let Ok(index) = usize::try_from(index) else { return };
        if index > self.len() {
            return;
        }
        let value = self.create_child(content.into());
        self.make_dirty();
        let shifted = self.modify(|items| {
            items.insert(index, value.clone());
            items[index..].to_vec()
        });
        self.state.borrow_mut().pending_has_real_value = true;
        for item in shifted {
            item.make_dirty();
        }
        self.add_value_handlers(&value);
    }

    /// Removes the item at `index` and returns it. Returns `None` if the index is out of range.
    pub fn remove(&self, index: isize) -> Option<ValueRef> {
        let index = usize::try_from(index).ok()?;
        if index >= self.len() {
            return None;
        }
        self.make_dirty();
        let (removed, shifted) = self.modify(|items| {
            let removed = items.remove(index);
            (removed, items[index..].to_vec())
        });
        for item in shifted {
            item.make_dirty();
        }
        let owners: Vec<GlobalId> = self.handlers.borrow().owners().collect();
        for owner in owners {
            removed.destroy_handlers(owner);
        }
        self.fire("change");
        Some(removed)
    }

    /// Applies `f` to the pending content, copying it first if it is shared.
    fn modify<R>(&self, f: impl FnOnce(&mut Vec<ValueRef>) -> R) -> R {
        let mut state = self.state.borrow_mut();
        let pending = state.pending.get_or_insert_with(Rc::default);
        f(Rc::make_mut(pending))
    }

    /// Replaces the live item at `index` without dirtying the value.
    pub(crate) fn replace_live(&self, index: usize, value: ValueRef) {
        let state = &mut *self.state.borrow_mut();
        let live = if state.dirty { &mut state.pending } else { &mut state.committed };
        if let Some(items) = live {
            if let Some(slot) = Rc::make_mut(items).get_mut(index) {
                *slot = value;
            }
        }
    }

    fn create_child(&self, content: Content) -> ValueRef {
        let owner = upgrade_owner(&self.owner);
        create(content, owner.as_ref(), &self.rendering)
    }

    fn add_value_handlers(&self, value: &ValueRef) {
        let handlers: Vec<Handler> = self.handlers.borrow().handlers().cloned().collect();
        if handlers.is_empty() {
            return;
        }
        for handler in &handlers {
            value.add_handler(handler);
        }
        self.fire("change");
    }

    fn fire(&self, name: &str) {
        if !(self.initialized.get() && self.fire_events.get()) {
            return;
        }
        let listeners = self.handlers.borrow().listeners(name);
        if listeners.is_empty() {
            return;
        }
        let Some(source) = self.this.upgrade() else { return };
        let event = ValueEvent {
            name: Atom::from(name),
            source,
        };
        for listener in listeners {
            listener(&event);
        }
    }

    fn destroy_mode(&self, requested: DestroyMode) -> DestroyMode {
        if self.rendering.config().force_sync_destroy {
            DestroyMode::Sync
        } else {
            requested
        }
    }

    /// Global id of the owning component, for locator labels.
    pub(crate) fn owner_label(&self) -> Option<GlobalId> {
        self.owner().and_then(|owner| owner.as_component().map(|c| c.global_id()))
    }
}

impl Value for ArrayValue {
    fn id(&self) -> ValueId {
        self.id
    }

    fn variant(&self) -> Variant {
        Variant::Array
    }

    fn to_raw(&self) -> RawValue {
        if self.is_unset() {
            return RawValue::Null;
        }
        RawValue::Array(self.array().iter().map(|item| item.to_raw()).collect())
    }

    fn compare(&self, other: ContentRef) -> bool {
        let mine = self.array();
        match other {
            ContentRef::Raw(RawValue::Array(theirs)) => {
                mine.len() == theirs.len() && mine.iter().zip(theirs).all(|(a, b)| a.compare(ContentRef::Raw(b)))
            }
            ContentRef::Value(other) => match other.as_array() {
                Some(other) => {
                    let theirs = other.array();
                    mine.len() == theirs.len()
                        && mine.iter().zip(theirs.iter()).all(|(a, b)| a.compare(ContentRef::Value(&**b)))
                }
                None => false,
            },
            ContentRef::Raw(_) => false,
        }
    }

    fn make_dirty(&self) {
        let registered = {
            let mut state = self.state.borrow_mut();
            if state.dirty {
                return;
            }
            if state.pending.is_none() {
                state.pending = state.committed.clone();
                state.pending_has_real_value = state.has_real_value;
            }
            state.dirty = true;
            self.initialized.get()
        };
        if registered {
            if let Some(this) = self.this.upgrade() {
                self.rendering.add_dirty_value(this);
            }
        }
    }

    fn is_dirty(&self) -> bool {
        self.state.borrow().dirty
    }

    fn commit(&self, internal: bool) {
        let orphans: Vec<ValueRef> = {
            let mut state = self.state.borrow_mut();
            if !state.dirty {
                return;
            }
            let pending = state.pending.clone().unwrap_or_default();
            let orphans = match &state.committed {
                Some(committed) if state.is_owner && !Rc::ptr_eq(committed, &pending) => {
                    let kept: HashSet<ValueId> = pending.iter().map(|item| item.id()).collect();
                    committed.iter().filter(|item| !kept.contains(&item.id())).cloned().collect()
                }
                _ => Vec::new(),
            };
            state.committed = Some(pending);
            state.has_real_value = state.pending_has_real_value;
            orphans
        };
        let mode = self.destroy_mode(DestroyMode::Deferred);
        for orphan in orphans {
            orphan.destroy(mode);
        }
        self.rollback(internal);
    }

    fn rollback(&self, internal: bool) {
        {
            let mut state = self.state.borrow_mut();
            if !state.dirty {
                return;
            }
            state.pending = None;
            state.dirty = false;
        }
        if !internal && self.owner.is_some() {
            self.rendering.remove_dirty_value(self.id);
        }
    }

    fn destroy(&self, mode: DestroyMode) {
        let mode = self.destroy_mode(mode);
        let pending = {
            let state = self.state.borrow();
            state.pending.clone().filter(|_| state.dirty)
        };
        if pending.is_some() {
            self.rollback(false);
        }
        let committed = self.state.borrow_mut().committed.take();

        if committed.as_ref().map_or(false, |items| !items.is_empty()) {
            if let Some(reference) = self.reference_node() {
                // keep an insertion point for whoever renders in our place
                let owner = self.owner_label();
                let locator = self.create_locator(|| format!(" array locator (from destroy) {owner:?}"));
                self.rendering.dom().insert(&[locator], Placement::Before(reference));
                self.set_reference_node(Some(locator));
            }
        }
        if committed.is_some() {
            self.forget_rendered();
        }

        let mut seen = HashSet::new();
        let children: Vec<ValueRef> = pending
            .iter()
            .chain(committed.iter())
            .flat_map(|items| items.iter())
            .filter(|item| seen.insert(item.id()))
            .cloned()
            .collect();
        for child in children {
            child.destroy(mode);
        }
        self.handlers.borrow_mut().clear();
    }

    fn add_handler(&self, handler: &Handler) {
        for item in self.array().iter() {
            item.add_handler(handler);
        }
        self.handlers.borrow_mut().add(handler.clone());
    }

    fn destroy_handlers(&self, owner: GlobalId) {
        self.handlers.borrow_mut().remove_owner(owner);
        for item in self.array().iter() {
            item.destroy_handlers(owner);
        }
    }

    fn owner(&self) -> Option<ValueRef> {
        upgrade_owner(&self.owner)
    }

    fn as_array(&self) -> Option<&ArrayValue> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayValue")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{testing::Harness, SimpleValue};
    use serde_json::json;

    #[test]
    fn mutations_then_commit() {
        let h = Harness::new();
        let array = ArrayValue::new(json!([1, 2]), None, None, &h.rendering);
        assert!(!array.is_dirty());
        assert_eq!(array.len(), 2);

        array.push(json!(3));
        array.insert(0, json!(0));
        let removed = array.remove(1).unwrap();
        assert_eq!(removed.to_raw(), json!(1));

        // out of range indices are ignored
        array.insert(-1, json!(9));
        array.insert(10, json!(9));
        assert!(array.remove(7).is_none());
        assert!(array.remove(-1).is_none());

        assert!(array.is_dirty());
        array.commit(false);
        assert!(!array.is_dirty());
        assert_eq!(array.len(), 3);
        assert_eq!(array.to_raw(), json!([0, 2, 3]));
    }

    #[test]
    fn rollback_restores_committed_content() {
        let h = Harness::new();
        let array = ArrayValue::new(json!(["a", "b"]), None, None, &h.rendering);
        let before = array.array();

        array.push(json!("c"));
        array.remove(0);
        assert!(array.is_different_array());
        assert_eq!(array.len(), 2);

        array.rollback(false);
        assert!(!array.is_dirty());
        assert!(Rc::ptr_eq(&before, &array.array()));
        assert_eq!(array.to_raw(), json!(["a", "b"]));
    }

    #[test]
    fn rollback_of_null_restores_items() {
        let h = Harness::new();
        let array = ArrayValue::new(json!([1, 2]), None, None, &h.rendering);
        array.set_value(RawValue::Null, false);
        assert!(array.is_unset());
        assert!(array.is_empty());

        array.rollback(false);
        assert!(!array.is_unset());
        assert_eq!(array.len(), 2);
        assert_eq!(array.to_raw(), json!([1, 2]));
    }

    #[test]
    fn commit_of_null_unsets() {
        let h = Harness::new();
        let array = ArrayValue::new(json!([1, 2]), None, None, &h.rendering);
        array.set_value(RawValue::Null, false);
        array.commit(false);
        assert!(!array.is_dirty());
        assert!(array.is_unset());
        assert!(array.is_empty());
        assert_eq!(array.to_raw(), RawValue::Null);

        // pushing onto an unset value gives it a real value again, but only once committed
        array.push(json!(3));
        assert!(!array.is_unset());
        array.rollback(false);
        assert!(array.is_unset());
    }

    #[test]
    fn shifted_children_are_marked_dirty() {
        let h = Harness::new();
        let owner = h.component("owner").as_value();
        let array = ArrayValue::new(json!([0, 1, 2]), None, Some(&owner), &h.rendering);
        let children: Vec<ValueRef> = array.array().iter().cloned().collect();
        for child in &children {
            child.commit(false);
        }
        h.rendering.rerender_dirty("setup");
        assert!(children.iter().all(|child| !child.is_dirty()));
        assert!(children.iter().all(|child| !h.rendering.is_dirty_registered(child.id())));

        array.insert(1, json!(9));
        assert!(!children[0].is_dirty());
        assert!(!h.rendering.is_dirty_registered(children[0].id()));
        for child in &children[1..] {
            assert!(child.is_dirty());
            assert!(h.rendering.is_dirty_registered(child.id()));
        }

        h.rendering.rerender_dirty("insert");
        assert!(children.iter().all(|child| !child.is_dirty()));

        array.remove(0);
        assert!(!children[0].is_dirty());
        for child in &children[1..] {
            assert!(child.is_dirty());
            assert!(h.rendering.is_dirty_registered(child.id()));
        }
    }

    #[test]
    fn commit_when_clean_does_nothing() {
        let h = Harness::new();
        let owner = h.component("owner").as_value();
        let a = h.component("a");
        let array = h.array_of(&[&a], Some(&owner));
        array.set_is_owner(true);
        let registered = h.rendering.is_dirty_registered(array.id());

        array.commit(false);
        assert_eq!(a.destroy_count.get(), 0);
        assert_eq!(h.rendering.is_dirty_registered(array.id()), registered);
        assert_eq!(array.len(), 1);
    }

    #[test]
    fn commit_destroys_replaced_children_of_owner() {
        let h = Harness::new();
        let a = h.component("a");
        let b = h.component("b");
        let array = h.array_of(&[&a, &b], None);
        array.set_is_owner(true);

        array.remove(1);
        array.commit(false);
        assert_eq!(a.destroy_count.get(), 0);
        assert_eq!(b.destroy_count.get(), 1);

        // not an owner: nothing is destroyed
        let c = h.component("c");
        let other = h.array_of(&[&c], None);
        other.clear();
        other.commit(false);
        assert_eq!(c.destroy_count.get(), 0);
        assert!(other.is_empty());
        assert!(!other.is_unset());
    }

    #[test]
    fn destroy_twice() {
        let h = Harness::new();
        let a = h.component("a");
        let b = h.component("b");
        let array = h.array_of(&[&a], None);
        array.push(Content::Value(b.as_value()));
        assert!(array.is_dirty());

        array.destroy(DestroyMode::Deferred);
        assert_eq!(a.destroy_count.get(), 1);
        assert_eq!(b.destroy_count.get(), 1);
        assert!(!array.is_dirty());

        array.destroy(DestroyMode::Sync);
        assert_eq!(a.destroy_count.get(), 1);
        assert_eq!(b.destroy_count.get(), 1);
        assert!(array.is_empty());
    }

    #[test]
    fn raw_round_trip() {
        let h = Harness::new();
        let array = ArrayValue::new(json!([]), None, None, &h.rendering);
        let raw = json!([1, "a", [2, 3]]);
        array.set_value(raw.clone(), false);
        array.commit(false);
        assert_eq!(array.to_raw(), raw);
        assert_eq!(array.get(2).map(|v| v.variant()), Some(Variant::Array));
        assert_eq!(array.get_raw(1), Some(json!("a")));
    }

    #[test]
    fn null_is_unset() {
        let h = Harness::new();
        let array = ArrayValue::new(RawValue::Null, Some(Atom::from("body")), None, &h.rendering);
        assert!(array.is_unset());
        assert!(array.is_empty());
        assert_eq!(array.to_raw(), RawValue::Null);
        assert_eq!(array.name().map(|n| n.as_str()), Some("body"));

        // a single non-array item is wrapped
        array.set_value(json!("x"), false);
        array.commit(false);
        assert!(!array.is_unset());
        assert_eq!(array.to_raw(), json!(["x"]));
    }

    #[test]
    fn set_value_unwraps_array_values() {
        let h = Harness::new();
        let source = ArrayValue::new(json!([1, 2]), None, None, &h.rendering);
        let array = ArrayValue::new(source.clone(), None, None, &h.rendering);
        assert_eq!(array.len(), 2);
        assert!(Rc::ptr_eq(&array.array()[0], &source.array()[0]));
    }

    #[test]
    fn change_handlers() {
        let h = Harness::new();
        let owner = GlobalId::next();
        let count = Rc::new(Cell::new(0));
        let array = ArrayValue::new(json!([]), None, None, &h.rendering);
        array.add_handler(&Handler::new(owner, "change", {
            let count = count.clone();
            move |_| count.set(count.get() + 1)
        }));

        let child = SimpleValue::new(json!(1), None, &h.rendering);
        array.push(Content::from(child.clone()));
        assert_eq!(count.get(), 1);

        // handlers are forwarded to children
        child.set_value(json!(2), false);
        assert_eq!(count.get(), 2);

        array.set_value(json!([1, 2]), true);
        assert_eq!(count.get(), 2);

        array.insert(0, Content::from(child.clone()));
        assert_eq!(count.get(), 3);
        array.remove(0);
        assert_eq!(count.get(), 4);
        // removed children lose the handlers of the array
        child.set_value(json!(3), false);
        assert_eq!(count.get(), 4);

        array.destroy_handlers(owner);
        array.push(json!(5));
        assert_eq!(count.get(), 4);
    }

    #[test]
    fn compare_structurally() {
        let h = Harness::new();
        let array = ArrayValue::new(json!([1, [2, 3]]), None, None, &h.rendering);
        assert!(array.compare(ContentRef::Raw(&json!([1, [2, 3]]))));
        assert!(!array.compare(ContentRef::Raw(&json!([1, [2, 4]]))));
        assert!(!array.compare(ContentRef::Raw(&json!([1]))));
        assert!(!array.compare(ContentRef::Raw(&json!(1))));

        let other = ArrayValue::new(json!([1, [2, 3]]), None, None, &h.rendering);
        assert!(array.compare(ContentRef::Value(&*other)));
    }

    #[test]
    fn dirty_set_membership() {
        let h = Harness::new();
        let owner = h.component("owner").as_value();
        let owned = ArrayValue::new(json!([]), None, Some(&owner), &h.rendering);
        assert!(!h.rendering.is_dirty_registered(owned.id()));

        owned.push(json!(1));
        assert!(h.rendering.is_dirty_registered(owned.id()));
        owned.rollback(false);
        assert!(!h.rendering.is_dirty_registered(owned.id()));

        owned.push(json!(1));
        owned.commit(true);
        // internal commits leave the bookkeeping to the rendering context
        assert!(h.rendering.is_dirty_registered(owned.id()));
    }

    #[test]
    fn each_in_both_directions() {
        let h = Harness::new();
        let array = ArrayValue::new(json!(["a", "b", "c"]), None, None, &h.rendering);
        let mut seen = Vec::new();
        array.each(|_, i| seen.push(i), false);
        array.each(|_, i| seen.push(i), true);
        assert_eq!(seen, vec![0, 1, 2, 2, 1, 0]);
    }
}
