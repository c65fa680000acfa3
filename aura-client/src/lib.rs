//! Client runtime of the aura component framework.
//!
//! This crate holds the parts of the client that decide *when* work happens:
//! - the value model ([`ArrayValue`], [`SimpleValue`]): transactional wrappers around application data,
//!   with dirty tracking, commit and rollback;
//! - the rendering context ([`Rendering`]): the per-root dirty-set and the coarse-grained
//!   reconciliation of array values against the DOM;
//! - the action queue and the stack coordinator ([`ClientService`]): batching of server-bound
//!   actions, foreground/background dispatch, and the flush-and-rerender loop that runs when the
//!   outermost scope unwinds.
//!
//! Component definitions, the concrete renderer, the DOM and the network transport are
//! collaborators, consumed through the traits in [`render`], [`transport`] and [`action`].
//!
//! Everything here is single-threaded: values and services are `Rc`-shared and use interior
//! mutability. Confine a UI root to one thread.

extern crate self as aura_client;

// public modules
pub mod action;
pub mod render;
pub mod transport;
pub mod value;

// internal modules
mod client;
mod config;
mod error;
mod reconcile;
mod stack;
#[cfg(test)]
mod testing;

// public exports
pub use action::{Action, ActionCallbackGroup, ActionFlags, ActionRef, ActionResponse, ActionState};
pub use client::{ClientService, StackScope};
pub use config::ClientConfig;
pub use error::{Diagnostics, Error};
pub use reconcile::Placement;
pub use render::{Component, ComponentService, Document, Dom, NodeId, Renderer, Rendering};
pub use stack::LoopStack;
pub use transport::{Channel, RequestSlot, Transport};
pub use value::{ArrayValue, Content, ContentRef, DestroyMode, SimpleValue, Value, ValueEvent, ValueRef, Variant};

// aura-common reexports
pub use aura_common::{ActionId, Atom, GlobalId, RawValue, ValueId};
