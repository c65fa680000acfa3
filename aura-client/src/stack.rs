use aura_common::Atom;
use std::cell::RefCell;

/// Names of the nested scopes the client is currently running in.
#[derive(Default, Debug)]
pub struct LoopStack {
    names: RefCell<Vec<Atom>>,
}

impl LoopStack {
    pub fn new() -> LoopStack {
        LoopStack::default()
    }

    pub fn push(&self, name: Atom) {
        self.names.borrow_mut().push(name);
    }

    pub fn pop(&self) -> Option<Atom> {
        self.names.borrow_mut().pop()
    }

    pub fn top(&self) -> Option<Atom> {
        self.names.borrow().last().cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.names.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.names.borrow_mut().clear();
    }

    /// Copy of the scope names, outermost first.
    pub fn names(&self) -> Vec<Atom> {
        self.names.borrow().clone()
    }
}
