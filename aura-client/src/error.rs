use crate::ActionId;
use aura_common::Atom;
use std::cell::RefCell;
use tracing::{error, warn};

/// Errors and integrity violations observed by the client runtime.
///
/// Except for `Config`, none of these are returned to the caller: they are reported through
/// [`Diagnostics`] and execution continues.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("broken stack: popped {popped} expected {expected}, stack = {stack:?}")]
    BrokenStack {
        popped: Atom,
        expected: Atom,
        stack: Vec<Atom>,
    },
    #[error("pop from empty stack (expected {0})")]
    EmptyStackPop(Atom),
    #[error("cannot enqueue action {id:?} ({descriptor}): {reason}")]
    MalformedAction {
        id: ActionId,
        descriptor: Atom,
        reason: &'static str,
    },
    #[error("flush has not completed after {0} loops")]
    FlushNotStable(usize),
    #[error("action {0} was incomplete and no stored response is available")]
    IncompleteNotStored(Atom),
    #[error("invalid client configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    fn is_warning(&self) -> bool {
        matches!(self, Error::EmptyStackPop(_))
    }
}

/// Non-fatal diagnostic channel.
///
/// Everything reported here is also logged.
#[derive(Default)]
pub struct Diagnostics {
    reported: RefCell<Vec<Error>>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    /// Logs and records a diagnostic.
    pub fn report(&self, err: Error) {
        if err.is_warning() {
            warn!("{err}");
        } else {
            error!("{err}");
        }
        self.reported.borrow_mut().push(err);
    }

    /// Number of diagnostics recorded since the last `take`.
    pub fn len(&self) -> usize {
        self.reported.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reported.borrow().is_empty()
    }

    /// Removes and returns the recorded diagnostics.
    pub fn take(&self) -> Vec<Error> {
        self.reported.take()
    }
}
