use crate::action::ActionRef;
use aura_common::ActionId;
use std::collections::VecDeque;
use tracing::trace;

/// Actions waiting to be run or dispatched.
///
/// Actions are partitioned into client actions (run locally), foreground server actions (sent
/// together in one request) and background server actions (sent one per request).
#[derive(Default)]
pub struct ActionQueue {
    client: Vec<ActionRef>,
    foreground: Vec<ActionRef>,
    background: VecDeque<ActionRef>,
    next_transaction_id: u64,
    last_abortable_transaction_id: Option<u64>,
}

impl ActionQueue {
    pub fn new() -> ActionQueue {
        ActionQueue::default()
    }

    /// Adds an action to the queue, tagging it with the current transaction id.
    ///
    /// If the action is abortable and the first abortable action of the current transaction, the
    /// abortable actions queued by earlier transactions are removed and returned. The caller is
    /// responsible for aborting them.
    #[must_use]
    pub fn enqueue(&mut self, action: ActionRef) -> Vec<ActionRef> {
        action.set_transaction_id(self.next_transaction_id);

        let mut aborted = Vec::new();
        if action.is_abortable() && self.last_abortable_transaction_id != Some(self.next_transaction_id) {
            let current = self.next_transaction_id;
            let stale = |a: &ActionRef| a.is_abortable() && a.transaction_id().map_or(false, |id| id < current);
            for partition in [&mut self.client, &mut self.foreground] {
                partition.retain(|a| {
                    if stale(a) {
                        aborted.push(a.clone());
                        false
                    } else {
                        true
                    }
                });
            }
            self.background.retain(|a| {
                if stale(a) {
                    aborted.push(a.clone());
                    false
                } else {
                    true
                }
            });
            if !aborted.is_empty() {
                trace!("aborting {} stale actions", aborted.len());
            }
            self.last_abortable_transaction_id = Some(current);
        }

        if action.is_client_action() {
            self.client.push(action);
        } else if action.is_background() {
            self.background.push_back(action);
        } else {
            self.foreground.push(action);
        }
        aborted
    }

    pub fn take_client_actions(&mut self) -> Vec<ActionRef> {
        std::mem::take(&mut self.client)
    }

    /// Whether there are foreground server actions to send.
    pub fn needs_dispatch(&self) -> bool {
        !self.foreground.is_empty()
    }

    /// Removes all foreground server actions, in enqueue order.
    pub fn take_server_actions(&mut self) -> Vec<ActionRef> {
        std::mem::take(&mut self.foreground)
    }

    pub fn next_background_action(&mut self) -> Option<ActionRef> {
        self.background.pop_front()
    }

    /// Transaction id given to actions enqueued from now on.
    pub fn next_transaction_id(&self) -> u64 {
        self.next_transaction_id
    }

    pub fn increment_next_transaction_id(&mut self) {
        self.next_transaction_id += 1;
    }

    pub fn contains(&self, id: ActionId) -> bool {
        self.client
            .iter()
            .chain(&self.foreground)
            .chain(&self.background)
            .any(|a| a.id() == id)
    }

    pub fn len(&self) -> usize {
        self.client.len() + self.foreground.len() + self.background.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
