//! Role- and ownership-based access control.

pub mod policy;

pub use policy::{AccessPolicy, Action};
