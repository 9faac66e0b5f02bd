//! User entities and role enumeration.

pub mod model;
pub mod role;

pub use model::{CreateUser, StorageUsage, User};
pub use role::UserRole;
