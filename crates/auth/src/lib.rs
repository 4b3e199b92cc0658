//! `supplyhub-auth` — pure authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP, sessions and storage.
//! Callers resolve an [`Actor`] however they authenticate; the gate here only
//! answers whether that actor may perform a given action.

pub mod actor;
pub mod gate;
pub mod roles;

pub use actor::Actor;
pub use gate::{
    authorize, check_cancel_department, check_return_reference, permits, AuthzError, GatedAction,
};
pub use roles::Role;
