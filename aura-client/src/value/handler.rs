use aura_common::{Atom, GlobalId};
use smallvec::SmallVec;
use std::{collections::BTreeMap, fmt, rc::Rc};

use crate::ValueRef;

/// Event fired by a value, e.g. `"change"`.
pub struct ValueEvent {
    pub name: Atom,
    /// The value that fired the event.
    pub source: ValueRef,
}

/// An event handler registered by a component on a value.
#[derive(Clone)]
pub struct Handler {
    /// Component that registered the handler.
    pub owner: GlobalId,
    pub event: Atom,
    pub action: Rc<dyn Fn(&ValueEvent)>,
}

impl Handler {
    pub fn new(owner: GlobalId, event: impl Into<Atom>, action: impl Fn(&ValueEvent) + 'static) -> Handler {
        Handler {
            owner,
            event: event.into(),
            action: Rc::new(action),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("owner", &self.owner)
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Handlers of a value, grouped by owning component.
#[derive(Clone, Default, Debug)]
pub struct HandlerMap {
    by_owner: BTreeMap<GlobalId, SmallVec<[Handler; 1]>>,
}

impl HandlerMap {
    pub fn add(&mut self, handler: Handler) {
        self.by_owner.entry(handler.owner).or_default().push(handler);
    }

    /// Removes the handlers of `owner`. Returns whether any were registered.
    pub fn remove_owner(&mut self, owner: GlobalId) -> bool {
        self.by_owner.remove(&owner).is_some()
    }

    pub fn owners(&self) -> impl Iterator<Item = GlobalId> + '_ {
        self.by_owner.keys().copied()
    }

    pub fn handlers(&self) -> impl Iterator<Item = &Handler> {
        self.by_owner.values().flatten()
    }

    /// Collects the actions listening to the given event.
    ///
    /// The result is detached from the map so that handlers can mutate the value.
    pub fn listeners(&self, event: &str) -> Vec<Rc<dyn Fn(&ValueEvent)>> {
        self.handlers()
            .filter(|h| h.event == *event)
            .map(|h| h.action.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_owner.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_owner.clear();
    }
}
