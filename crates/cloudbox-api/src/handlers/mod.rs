//! Request handlers, grouped by resource.

pub mod admin;
pub mod directory;
pub mod file;
pub mod health;
pub mod user;
