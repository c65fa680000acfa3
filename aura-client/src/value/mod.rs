//! Value objects: transactional wrappers around application data.
//!
//! A value keeps the last committed content and, while dirty, a pending content that mutations
//! apply to. `commit` promotes the pending content, `rollback` discards it. Dirty values register
//! with the [`Rendering`] context of their UI root, which rerenders their owners and commits them.
use crate::{render::Component, Rendering};
use aura_common::{GlobalId, RawValue, ValueId};
use std::{
    any::Any,
    rc::{Rc, Weak},
};

mod array;
mod handler;
mod simple;

pub use array::ArrayValue;
pub use handler::{Handler, HandlerMap, ValueEvent};
pub use simple::SimpleValue;

/// Shared handle to a value object.
pub type ValueRef = Rc<dyn Value>;

/// Kind of value object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    Array,
    Simple,
    /// A live component. Components are created by the [`ComponentService`](crate::ComponentService).
    Component,
}

/// How children are destroyed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DestroyMode {
    Sync,
    /// The destroyed object may defer the actual teardown.
    Deferred,
}

/// Content given to `set_value`, `push` or `insert`: raw data or an existing value object.
#[derive(Clone)]
pub enum Content {
    Raw(RawValue),
    Value(ValueRef),
}

impl Content {
    pub fn as_content_ref(&self) -> ContentRef {
        match self {
            Content::Raw(raw) => ContentRef::Raw(raw),
            Content::Value(value) => ContentRef::Value(&**value),
        }
    }
}

impl From<RawValue> for Content {
    fn from(raw: RawValue) -> Self {
        Content::Raw(raw)
    }
}

impl From<ValueRef> for Content {
    fn from(value: ValueRef) -> Self {
        Content::Value(value)
    }
}

impl From<Rc<ArrayValue>> for Content {
    fn from(value: Rc<ArrayValue>) -> Self {
        Content::Value(value)
    }
}

impl From<Rc<SimpleValue>> for Content {
    fn from(value: Rc<SimpleValue>) -> Self {
        Content::Value(value)
    }
}

/// Borrowed form of [`Content`], used for comparisons.
#[derive(Copy, Clone)]
pub enum ContentRef<'a> {
    Raw(&'a RawValue),
    Value(&'a dyn Value),
}

/// Interface shared by all value objects.
///
/// Operations that don't apply to a variant have no-op default implementations, so callers
/// never need to probe for a capability before invoking it.
pub trait Value: Any {
    fn id(&self) -> ValueId;

    fn variant(&self) -> Variant;

    /// Returns a deep copy of the content as raw data.
    fn to_raw(&self) -> RawValue;

    /// Structural equality against raw data or another value.
    ///
    /// The default compares identities.
    fn compare(&self, other: ContentRef) -> bool {
        match other {
            ContentRef::Value(other) => other.id() == self.id(),
            ContentRef::Raw(_) => false,
        }
    }

    /// Marks the value dirty and registers it with the dirty-set of its root.
    fn make_dirty(&self) {}

    fn is_dirty(&self) -> bool {
        false
    }

    /// Accepts the pending content as the new truth.
    ///
    /// `internal` is set when called by the rendering context, which manages the dirty-set itself.
    fn commit(&self, _internal: bool) {}

    /// Discards the pending content.
    fn rollback(&self, _internal: bool) {}

    /// Tears the value down. Must be safe to call more than once.
    fn destroy(&self, mode: DestroyMode);

    /// Registers a handler, and forwards it to children.
    fn add_handler(&self, _handler: &Handler) {}

    /// Removes all handlers registered by the given component, here and in children.
    fn destroy_handlers(&self, _owner: GlobalId) {}

    /// The component owning this value, if it is still alive.
    fn owner(&self) -> Option<ValueRef> {
        None
    }

    fn as_component(&self) -> Option<&dyn Component> {
        None
    }

    fn as_array(&self) -> Option<&ArrayValue> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Creates a value object from content.
///
/// Existing value objects are returned as is. Raw arrays become [`ArrayValue`]s, any other raw
/// data (including unconstructed component configs) becomes a [`SimpleValue`].
pub fn create(content: Content, owner: Option<&ValueRef>, rendering: &Rc<Rendering>) -> ValueRef {
    match content {
        Content::Value(value) => value,
        Content::Raw(raw @ RawValue::Array(_)) => ArrayValue::new(raw, None, owner, rendering),
        Content::Raw(raw) => SimpleValue::new(raw, owner, rendering),
    }
}

pub(crate) fn downgrade_owner(owner: Option<&ValueRef>) -> Option<Weak<dyn Value>> {
    owner.map(Rc::downgrade)
}

pub(crate) fn upgrade_owner(owner: &Option<Weak<dyn Value>>) -> Option<ValueRef> {
    owner.as_ref().and_then(Weak::upgrade)
}
