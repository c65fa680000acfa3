use crate::action::ActionResponse;
use std::{cell::RefCell, collections::HashMap};
use tracing::warn;

/// Local cache of action responses, keyed by `Action::storage_key`.
pub trait ActionStorage {
    /// Looks up a stored response. The callback may be invoked later.
    fn get(&self, key: &str, callback: Box<dyn FnOnce(Option<ActionResponse>)>);

    fn put(&self, key: &str, response: &ActionResponse);
}

/// Storage keeping serialized responses in memory. The callback of `get` is invoked immediately.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl ActionStorage for MemoryStorage {
    fn get(&self, key: &str, callback: Box<dyn FnOnce(Option<ActionResponse>)>) {
        let entry = self.entries.borrow().get(key).cloned();
        let response = entry.and_then(|json| match serde_json::from_str(&json) {
            Ok(response) => Some(response),
            Err(err) => {
                warn!("discarding unreadable stored response for `{key}`: {err}");
                None
            }
        });
        callback(response)
    }

    fn put(&self, key: &str, response: &ActionResponse) {
        match serde_json::to_string(response) {
            Ok(json) => {
                self.entries.borrow_mut().insert(key.to_string(), json);
            }
            Err(err) => warn!("could not store response for `{key}`: {err}"),
        }
    }
}
