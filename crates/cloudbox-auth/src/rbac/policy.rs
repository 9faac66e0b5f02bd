//! Ownership and role checks for file, directory and account operations.
//!
//! Every service operation on a user-owned resource calls
//! [`AccessPolicy::authorize`] before touching storage or the database.

use std::fmt;

use uuid::Uuid;

use cloudbox_core::error::AppError;
use cloudbox_entity::user::{User, UserRole};

/// What the actor wants to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// List, stream or download.
    Read,
    /// Create files or directories inside the resource.
    Upload,
    /// Rename.
    Modify,
    /// Remove.
    Delete,
}

impl Action {
    /// Minimum role needed to perform this action on someone else's resource.
    pub fn required_role(&self) -> UserRole {
        match self {
            Self::Read => UserRole::Admin,
            Self::Upload | Self::Modify | Self::Delete => UserRole::Owner,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Upload => write!(f, "upload"),
            Self::Modify => write!(f, "modify"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Stateless access decisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    /// Allow `actor` to perform `action` on a resource owned by `owner_id`.
    pub fn authorize(actor: &User, owner_id: Uuid, action: Action) -> Result<(), AppError> {
        if actor.id == owner_id || actor.role.has_at_least(&action.required_role()) {
            return Ok(());
        }
        tracing::debug!(
            actor_id = %actor.id,
            owner_id = %owner_id,
            action = %action,
            "Access denied"
        );
        Err(AppError::authorization(format!(
            "Role '{}' may not {action} another user's resources",
            actor.role
        )))
    }

    /// Allow `actor` to administer the `target` account.
    ///
    /// Nobody administers themselves, and the actor must strictly outrank
    /// the target.
    pub fn authorize_user_admin(actor: &User, target: &User) -> Result<(), AppError> {
        if actor.id == target.id {
            return Err(AppError::authorization(
                "This action cannot be performed on your own account",
            ));
        }
        if !actor.role.outranks(&target.role) {
            return Err(AppError::authorization(format!(
                "Role '{}' does not outrank '{}'",
                actor.role, target.role
            )));
        }
        Ok(())
    }
}
