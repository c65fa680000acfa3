//! Basic types shared by the aura client crates.

mod atom;
pub mod counter;

pub use crate::atom::Atom;

/// Raw, JSON-compatible application data.
///
/// This is what component configs, attribute literals and server responses look like before they
/// are wrapped into value objects.
pub type RawValue = serde_json::Value;

crate::define_id! {
    /// Identifies a value object for the lifetime of the process.
    pub struct ValueId;
}

crate::define_id! {
    /// Global identifier of a component.
    ///
    /// Also used to key handlers registered on a value by the component that owns them.
    pub struct GlobalId;
}

crate::define_id! {
    /// Identifies an action.
    pub struct ActionId;
}
