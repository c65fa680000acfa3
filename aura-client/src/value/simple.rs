use super::{downgrade_owner, upgrade_owner, Content, ContentRef, DestroyMode, Handler, HandlerMap, Value, ValueEvent, ValueRef, Variant};
use crate::Rendering;
use aura_common::{Atom, GlobalId, RawValue, ValueId};
use std::{
    any::Any,
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};

struct SimpleState {
    committed: RawValue,
    pending: Option<RawValue>,
    dirty: bool,
}

/// A leaf value wrapping a scalar or object literal.
pub struct SimpleValue {
    id: ValueId,
    this: Weak<SimpleValue>,
    rendering: Rc<Rendering>,
    owner: Option<Weak<dyn Value>>,
    state: RefCell<SimpleState>,
    handlers: RefCell<HandlerMap>,
}

impl SimpleValue {
    pub fn new(raw: RawValue, owner: Option<&ValueRef>, rendering: &Rc<Rendering>) -> Rc<SimpleValue> {
        Rc::new_cyclic(|this| SimpleValue {
            id: ValueId::next(),
            this: this.clone(),
            rendering: rendering.clone(),
            owner: downgrade_owner(owner),
            state: RefCell::new(SimpleState {
                committed: raw,
                pending: None,
                dirty: false,
            }),
            handlers: Default::default(),
        })
    }

    /// The live content: pending if dirty, committed otherwise.
    pub fn get(&self) -> RawValue {
        let state = self.state.borrow();
        match (&state.pending, state.dirty) {
            (Some(pending), true) => pending.clone(),
            _ => state.committed.clone(),
        }
    }

    /// Replaces the content. Other values are unwrapped to their raw form.
    pub fn set_value(&self, content: impl Into<Content>, skip_change: bool) {
        let raw = match content.into() {
            Content::Raw(raw) => raw,
            Content::Value(value) => value.to_raw(),
        };
        self.make_dirty();
        self.state.borrow_mut().pending = Some(raw);
        if !skip_change {
            self.fire("change");
        }
    }

    fn fire(&self, name: &str) {
        let listeners = self.handlers.borrow().listeners(name);
        let Some(source) = self.this.upgrade() else { return };
        let event = ValueEvent {
            name: Atom::from(name),
            source,
        };
        for listener in listeners {
            listener(&event);
        }
    }
}

impl Value for SimpleValue {
    fn id(&self) -> ValueId {
        self.id
    }

    fn variant(&self) -> Variant {
        Variant::Simple
    }

    fn to_raw(&self) -> RawValue {
        self.get()
    }

    fn compare(&self, other: ContentRef) -> bool {
        match other {
            ContentRef::Raw(raw) => self.get() == *raw,
            ContentRef::Value(other) => other.variant() == Variant::Simple && other.to_raw() == self.get(),
        }
    }

    fn make_dirty(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.dirty {
                return;
            }
            if state.pending.is_none() {
                state.pending = Some(state.committed.clone());
            }
            state.dirty = true;
        }
        if let Some(this) = self.this.upgrade() {
            self.rendering.add_dirty_value(this);
        }
    }

    fn is_dirty(&self) -> bool {
        self.state.borrow().dirty
    }

    fn commit(&self, internal: bool) {
        {
            let mut state = self.state.borrow_mut();
            if !state.dirty {
                return;
            }
            if let Some(pending) = state.pending.take() {
                state.committed = pending;
            }
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

    fn destroy(&self, _mode: DestroyMode) {
        self.rollback(false);
        self.handlers.borrow_mut().clear();
    }

    fn add_handler(&self, handler: &Handler) {
        self.handlers.borrow_mut().add(handler.clone());
    }

    fn destroy_handlers(&self, owner: GlobalId) {
        self.handlers.borrow_mut().remove_owner(owner);
    }

    fn owner(&self) -> Option<ValueRef> {
        upgrade_owner(&self.owner)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for SimpleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SimpleValue").field(&self.get()).finish()
    }
}
