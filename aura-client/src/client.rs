//! The stack coordinator: scope tracking, action dispatch and the flush loop.
use crate::{
    action::{
        ActionCallbackGroup, ActionError, ActionQueue, ActionRef, ActionResponse, ActionState, ActionStorage,
        GroupCallback,
    },
    Channel, ClientConfig, Diagnostics, Error, LoopStack, RequestSlot, Rendering, Transport,
};
use aura_common::Atom;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};
use tracing::{info, trace, warn};

/// Scope pushed by the flush loop while it runs.
const FLUSH_SCOPE: &str = "ClientService::pop_stack";
/// Scope pushed while applying responses.
const RECEIVE_SCOPE: &str = "ClientService::receive";

/// Client services of a UI root.
///
/// Work done by the application happens inside named scopes (`push_stack`/`pop_stack`, or
/// `scope`/`run`). When the outermost scope closes, queued actions are dispatched and dirty values
/// are rerendered, repeatedly, until nothing changes anymore.
pub struct ClientService {
    config: ClientConfig,
    stack: LoopStack,
    queue: RefCell<ActionQueue>,
    foreground: RequestSlot,
    background: RequestSlot,
    rendering: Rc<Rendering>,
    transport: Rc<dyn Transport>,
    storage: Option<Rc<dyn ActionStorage>>,
    diagnostics: Rc<Diagnostics>,
    finished_init: Cell<bool>,
    connected: Cell<bool>,
}

impl ClientService {
    pub fn new(config: ClientConfig, rendering: Rc<Rendering>, transport: Rc<dyn Transport>) -> ClientService {
        ClientService {
            config,
            stack: LoopStack::new(),
            queue: RefCell::new(ActionQueue::new()),
            foreground: RequestSlot::new(),
            background: RequestSlot::new(),
            rendering,
            transport,
            storage: None,
            diagnostics: Rc::new(Diagnostics::new()),
            finished_init: Cell::new(false),
            connected: Cell::new(true),
        }
    }

    /// Sets the cache used for storable actions.
    #[must_use]
    pub fn with_storage(mut self, storage: Rc<dyn ActionStorage>) -> ClientService {
        self.storage = Some(storage);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn rendering(&self) -> &Rc<Rendering> {
        &self.rendering
    }

    pub fn diagnostics(&self) -> &Rc<Diagnostics> {
        &self.diagnostics
    }

    /// Enables rerendering in the flush loop. Call once the application has finished loading.
    pub fn set_initialized(&self) {
        self.finished_init.set(true);
    }

    pub fn is_initialized(&self) -> bool {
        self.finished_init.get()
    }

    /// Whether the server was reachable at the last exchange.
    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    /// Switches between online and offline mode.
    ///
    /// Also updated by `receive`: an `INCOMPLETE` response means the server could not be reached,
    /// any other response means it could.
    pub fn set_connected(&self, connected: bool) {
        if self.connected.replace(connected) != connected {
            if connected {
                info!("connection resumed");
            } else {
                warn!("connection lost");
            }
        }
    }

    /// Transaction id given to actions enqueued now.
    pub fn transaction_id(&self) -> u64 {
        self.queue.borrow().next_transaction_id()
    }

    //----------------------------------------------------------------------------------------------
    // Stack

    pub fn push_stack(&self, name: impl Into<Atom>) {
        self.stack.push(name.into());
    }

    /// Closes the scope `name`. Closing the outermost scope flushes.
    pub fn pop_stack(&self, name: impl Into<Atom>) {
        let name = name.into();
        match self.stack.pop() {
            Some(popped) if popped != name => self.diagnostics.report(Error::BrokenStack {
                popped,
                expected: name.clone(),
                stack: self.stack.names(),
            }),
            Some(_) => {}
            None => self.diagnostics.report(Error::EmptyStackPop(name.clone())),
        }

        if self.stack.is_empty() {
            self.flush(&name);
        }
    }

    /// Opens a scope, closed when the returned guard is dropped.
    pub fn scope(&self, name: impl Into<Atom>) -> StackScope<'_> {
        let name = name.into();
        self.push_stack(name.clone());
        StackScope { client: self, name }
    }

    /// Runs `f` inside the scope `name`.
    pub fn run<R>(&self, name: impl Into<Atom>, f: impl FnOnce() -> R) -> R {
        let _scope = self.scope(name);
        f()
    }

    /// Whether a scope is open.
    pub fn in_loop(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Whether closing `name` from outside the client would be legal: `name` is the innermost scope,
    /// or no scope is open.
    pub fn check_public_pop(&self, name: &str) -> bool {
        match self.stack.top() {
            Some(top) => top == name,
            None => true,
        }
    }

    fn flush(&self, label: &Atom) {
        let sentinel = Atom::from(FLUSH_SCOPE);
        self.stack.push(sentinel.clone());

        self.process_actions();
        if self.finished_init.get() {
            let max = self.config.max_flush_iterations;
            let mut count = 0;
            loop {
                self.rendering.rerender_dirty(label);
                count += 1;
                if !self.process_actions() {
                    break;
                }
                if count >= max {
                    self.diagnostics.report(Error::FlushNotStable(count));
                    break;
                }
            }
            trace!("flush of `{label}` done after {count} rounds");
        }

        match self.stack.pop() {
            Some(popped) if popped == sentinel => {}
            popped => self.diagnostics.report(Error::BrokenStack {
                popped: popped.unwrap_or_default(),
                expected: sentinel,
                stack: self.stack.names(),
            }),
        }
        self.stack.clear();
        self.queue.borrow_mut().increment_next_transaction_id();
    }

    //----------------------------------------------------------------------------------------------
    // Actions

    /// Queues an action for the next dispatch.
    ///
    /// The action must be new and not already queued. If `background` is set, the action is moved
    /// to the background channel.
    pub fn enqueue_action(&self, action: ActionRef, background: bool) {
        let reason = if action.state() != ActionState::New {
            Some("action is not in the NEW state")
        } else if self.queue.borrow().contains(action.id()) {
            Some("action is already queued")
        } else {
            None
        };
        if let Some(reason) = reason {
            self.diagnostics.report(Error::MalformedAction {
                id: action.id(),
                descriptor: action.descriptor().clone(),
                reason,
            });
            return;
        }

        if background {
            action.set_background();
        }
        let aborted = self.queue.borrow_mut().enqueue(action);
        for action in aborted {
            action.abort();
        }
    }

    /// Runs client actions and dispatches server actions. Returns whether anything was done.
    ///
    /// All queued foreground actions go in one request, if no foreground request is in flight.
    /// At most one background action is sent, if no background request is in flight.
    pub fn process_actions(&self) -> bool {
        let mut processed = false;

        let client_actions = self.queue.borrow_mut().take_client_actions();
        if !client_actions.is_empty() {
            for action in client_actions {
                action.run_local();
            }
            processed = true;
        }

        let needs_dispatch = self.queue.borrow().needs_dispatch();
        if needs_dispatch && self.foreground.start() {
            let actions = self.queue.borrow_mut().take_server_actions();
            if actions.is_empty() {
                self.foreground.cancel();
            } else {
                self.send(actions, Channel::Foreground);
                processed = true;
            }
        }

        if self.background.start() {
            let action = self.queue.borrow_mut().next_background_action();
            match action {
                Some(action) => {
                    self.send(vec![action], Channel::Background);
                    processed = true;
                }
                None => self.background.cancel(),
            }
        }

        processed
    }

    fn send(&self, actions: Vec<ActionRef>, channel: Channel) {
        trace!("sending {} action(s) on {channel:?}", actions.len());
        for action in &actions {
            action.set_running();
        }
        self.transport.send(actions, channel);
    }

    /// Enqueues `actions` and processes the queue immediately, outside of the current transaction.
    ///
    /// `callback` runs once all of the actions have completed.
    pub fn run_actions(&self, actions: Vec<ActionRef>, callback: Option<GroupCallback>) {
        if let Some(callback) = callback {
            self.make_action_group(&actions, callback);
        }
        for action in actions {
            self.enqueue_action(action, false);
        }
        self.process_actions();
    }

    pub fn make_action_group(&self, actions: &[ActionRef], callback: GroupCallback) -> ActionCallbackGroup {
        ActionCallbackGroup::new(actions, callback)
    }

    /// Whether no action is queued or in flight.
    pub fn idle(&self) -> bool {
        self.queue.borrow().is_empty() && self.foreground.is_idle() && self.background.is_idle()
    }

    /// Applies the responses to a request sent on `channel`, then flushes.
    pub fn receive(&self, channel: Channel, responses: Vec<(ActionRef, ActionResponse)>) {
        self.push_stack(RECEIVE_SCOPE);
        match channel {
            Channel::Foreground => self.foreground.finish(),
            Channel::Background => self.background.finish(),
        }
        for (action, response) in responses {
            self.complete(&action, response);
        }
        self.pop_stack(RECEIVE_SCOPE);
    }

    fn complete(&self, action: &ActionRef, response: ActionResponse) {
        self.set_connected(response.state != ActionState::Incomplete);
        if response.state == ActionState::Incomplete && action.is_storable() {
            let Some(storage) = &self.storage else {
                self.diagnostics.report(Error::IncompleteNotStored(action.descriptor().clone()));
                action.update_from_response(&response);
                action.finish();
                return;
            };
            let key = action.storage_key();
            let action = action.clone();
            let diagnostics = self.diagnostics.clone();
            storage.get(
                &key,
                Box::new(move |stored: Option<ActionResponse>| match stored {
                    Some(stored) => {
                        trace!("{} was incomplete, using stored response", action.descriptor());
                        action.update_from_response(&stored);
                        action.finish();
                    }
                    None => {
                        diagnostics.report(Error::IncompleteNotStored(action.descriptor().clone()));
                        action.update_from_response(&response);
                        action.finish();
                    }
                }),
            );
            return;
        }

        action.update_from_response(&response);
        if response.state == ActionState::Success && action.is_storable() {
            if let Some(storage) = &self.storage {
                storage.put(&action.storage_key(), &action.to_response());
            }
        }
        if matches!(response.state, ActionState::Error | ActionState::Aborted) {
            warn!(
                "{} completed with state {:?}: {:?}",
                action.descriptor(),
                response.state,
                errors_text(&response.error)
            );
        }
        action.finish();
    }
}

fn errors_text(errors: &[ActionError]) -> Vec<&str> {
    errors.iter().map(|e| e.message.as_str()).collect()
}

/// Guard closing a scope of a [`ClientService`] when dropped.
pub struct StackScope<'a> {
    client: &'a ClientService,
    name: Atom,
}

impl<'a> StackScope<'a> {
    pub fn name(&self) -> &Atom {
        &self.name
    }
}

impl<'a> Drop for StackScope<'a> {
    fn drop(&mut self) {
        self.client.pop_stack(self.name.clone());
    }
}
