use crate::action::{Action, ActionError, ActionRef};
use std::{cell::RefCell, rc::Rc};
use tracing::trace;

/// Callback of an [`ActionCallbackGroup`], receiving the errors of all actions of the group.
pub type GroupCallback = Box<dyn FnOnce(&[ActionError])>;

struct GroupInner {
    remaining: usize,
    errors: Vec<ActionError>,
    callback: Option<GroupCallback>,
}

/// Runs a callback once every action of a set has completed.
#[derive(Clone)]
pub struct ActionCallbackGroup(Rc<RefCell<GroupInner>>);

impl ActionCallbackGroup {
    /// Creates a group over `actions`. If `actions` is empty the callback runs immediately.
    pub fn new(actions: &[ActionRef], callback: GroupCallback) -> ActionCallbackGroup {
        let group = ActionCallbackGroup(Rc::new(RefCell::new(GroupInner {
            remaining: actions.len(),
            errors: Vec::new(),
            callback: Some(callback),
        })));
        if actions.is_empty() {
            group.fire();
        }
        for action in actions {
            action.add_group(group.clone());
        }
        group
    }

    /// Number of actions not completed yet.
    pub fn remaining(&self) -> usize {
        self.0.borrow().remaining
    }

    pub(crate) fn complete(&self, action: &Action) {
        let done = {
            let mut inner = self.0.borrow_mut();
            inner.errors.extend(action.errors());
            inner.remaining = inner.remaining.saturating_sub(1);
            inner.remaining == 0
        };
        if done {
            trace!("action group complete");
            self.fire();
        }
    }

    fn fire(&self) {
        let (callback, errors) = {
            let mut inner = self.0.borrow_mut();
            (inner.callback.take(), std::mem::take(&mut inner.errors))
        };
        if let Some(callback) = callback {
            callback(&errors);
        }
    }
}
