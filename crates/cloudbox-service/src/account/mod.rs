//! Account registration, usage and removal.

pub mod service;

pub use service::{AccountService, Registration};
