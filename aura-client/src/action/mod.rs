//! Actions: units of client or server work, and the queue holding them until dispatch.
use aura_common::{ActionId, Atom, RawValue};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

mod group;
mod queue;
mod storage;

pub use group::{ActionCallbackGroup, GroupCallback};
pub use queue::ActionQueue;
pub use storage::{ActionStorage, MemoryStorage};

/// Shared handle to an action.
pub type ActionRef = Rc<Action>;

/// Parameters of an action.
pub type Params = serde_json::Map<String, RawValue>;

/// Function run by client-side actions.
pub type LocalFn = Box<dyn Fn(&Action) -> Result<RawValue, ActionError>>;

/// Completion callback of an action.
pub type ActionCallback = Box<dyn FnOnce(&Action)>;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ActionFlags: u8 {
        /// Sent on the background channel, one action per request.
        const BACKGROUND = 1 << 0;
        /// Aborted if still queued when a newer transaction enqueues an abortable action.
        const ABORTABLE = 1 << 1;
        /// Successful responses are stored, and replayed when the server can't be reached.
        const STORABLE = 1 << 2;
    }
}

/// State of an action.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionState {
    New,
    Running,
    Success,
    Error,
    /// The server could not be reached.
    Incomplete,
    Aborted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionError {
    pub message: String,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> ActionError {
        ActionError {
            message: message.into(),
        }
    }
}

/// Result of an action, as delivered by the transport or replayed from storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub state: ActionState,
    #[serde(default)]
    pub return_value: RawValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error: Vec<ActionError>,
}

impl ActionResponse {
    pub fn success(return_value: RawValue) -> ActionResponse {
        ActionResponse {
            state: ActionState::Success,
            return_value,
            error: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> ActionResponse {
        ActionResponse {
            state: ActionState::Error,
            return_value: RawValue::Null,
            error: vec![ActionError::new(message)],
        }
    }

    pub fn incomplete() -> ActionResponse {
        ActionResponse {
            state: ActionState::Incomplete,
            return_value: RawValue::Null,
            error: Vec::new(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A unit of work, run locally or sent to the server.
///
/// Built with the `with_*` methods, then shared as an [`ActionRef`].
pub struct Action {
    id: ActionId,
    descriptor: Atom,
    params: Params,
    state: Cell<ActionState>,
    flags: Cell<ActionFlags>,
    transaction_id: Cell<Option<u64>>,
    return_value: RefCell<RawValue>,
    errors: RefCell<Vec<ActionError>>,
    local: Option<LocalFn>,
    callback: RefCell<Option<ActionCallback>>,
    groups: RefCell<Vec<ActionCallbackGroup>>,
}

impl Action {
    fn with_local(descriptor: Atom, local: Option<LocalFn>) -> Action {
        Action {
            id: ActionId::next(),
            descriptor,
            params: Params::new(),
            state: Cell::new(ActionState::New),
            flags: Cell::new(ActionFlags::empty()),
            transaction_id: Cell::new(None),
            return_value: RefCell::new(RawValue::Null),
            errors: RefCell::new(Vec::new()),
            local,
            callback: RefCell::new(None),
            groups: RefCell::new(Vec::new()),
        }
    }

    /// Creates a server action, e.g. `Action::server("java://ui.Controller/ACTION$getItems")`.
    pub fn server(descriptor: impl Into<Atom>) -> Action {
        Action::with_local(descriptor.into(), None)
    }

    /// Creates a client action, run synchronously by the client when the queue is processed.
    pub fn client(descriptor: impl Into<Atom>, f: impl Fn(&Action) -> Result<RawValue, ActionError> + 'static) -> Action {
        Action::with_local(descriptor.into(), Some(Box::new(f)))
    }

    #[must_use]
    pub fn with_params(mut self, params: Params) -> Action {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_callback(self, callback: impl FnOnce(&Action) + 'static) -> Action {
        self.set_callback(callback);
        self
    }

    #[must_use]
    pub fn with_background(self, background: bool) -> Action {
        self.set_flag(ActionFlags::BACKGROUND, background);
        self
    }

    #[must_use]
    pub fn with_abortable(self, abortable: bool) -> Action {
        self.set_flag(ActionFlags::ABORTABLE, abortable);
        self
    }

    /// Marks the action storable. Storable actions are also abortable.
    #[must_use]
    pub fn with_storable(self, storable: bool) -> Action {
        self.set_flag(ActionFlags::STORABLE, storable);
        if storable {
            self.set_flag(ActionFlags::ABORTABLE, true);
        }
        self
    }

    pub fn into_ref(self) -> ActionRef {
        Rc::new(self)
    }

    fn set_flag(&self, flag: ActionFlags, value: bool) {
        let mut flags = self.flags.get();
        flags.set(flag, value);
        self.flags.set(flags);
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn descriptor(&self) -> &Atom {
        &self.descriptor
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn state(&self) -> ActionState {
        self.state.get()
    }

    pub fn flags(&self) -> ActionFlags {
        self.flags.get()
    }

    pub fn is_background(&self) -> bool {
        self.flags.get().contains(ActionFlags::BACKGROUND)
    }

    pub fn is_abortable(&self) -> bool {
        self.flags.get().contains(ActionFlags::ABORTABLE)
    }

    pub fn is_storable(&self) -> bool {
        self.flags.get().contains(ActionFlags::STORABLE)
    }

    pub fn is_client_action(&self) -> bool {
        self.local.is_some()
    }

    pub fn set_background(&self) {
        self.set_flag(ActionFlags::BACKGROUND, true);
    }

    pub fn set_callback(&self, callback: impl FnOnce(&Action) + 'static) {
        self.callback.replace(Some(Box::new(callback)));
    }

    /// Transaction the action was enqueued in.
    pub fn transaction_id(&self) -> Option<u64> {
        self.transaction_id.get()
    }

    pub(crate) fn set_transaction_id(&self, id: u64) {
        self.transaction_id.set(Some(id));
    }

    pub fn return_value(&self) -> RawValue {
        self.return_value.borrow().clone()
    }

    pub fn errors(&self) -> Vec<ActionError> {
        self.errors.borrow().clone()
    }

    /// Key of the stored response of this action.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.descriptor, RawValue::Object(self.params.clone()))
    }

    pub fn to_response(&self) -> ActionResponse {
        ActionResponse {
            state: self.state(),
            return_value: self.return_value(),
            error: self.errors(),
        }
    }

    pub(crate) fn set_running(&self) {
        self.state.set(ActionState::Running);
    }

    pub fn update_from_response(&self, response: &ActionResponse) {
        self.state.set(response.state);
        self.return_value.replace(response.return_value.clone());
        self.errors.replace(response.error.clone());
    }

    /// Runs a client action and finishes it.
    pub(crate) fn run_local(&self) {
        let Some(local) = &self.local else { return };
        self.set_running();
        match local(self) {
            Ok(value) => self.update_from_response(&ActionResponse::success(value)),
            Err(err) => self.update_from_response(&ActionResponse {
                state: ActionState::Error,
                return_value: RawValue::Null,
                error: vec![err],
            }),
        }
        self.finish();
    }

    pub(crate) fn abort(&self) {
        self.state.set(ActionState::Aborted);
        self.finish();
    }

    pub(crate) fn add_group(&self, group: ActionCallbackGroup) {
        self.groups.borrow_mut().push(group);
    }

    /// Invokes the callback, then notifies the groups of this action.
    pub(crate) fn finish(&self) {
        let callback = self.callback.take();
        if let Some(callback) = callback {
            callback(self);
        }
        let groups = self.groups.take();
        for group in groups {
            group.complete(self);
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("state", &self.state.get())
            .field("flags", &self.flags.get())
            .finish_non_exhaustive()
    }
}
