//! Request context carrying the authenticated actor.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cloudbox_entity::user::{User, UserRole};

/// Context for the current authenticated request.
///
/// Built by the API extractor after the bearer token is verified and the
/// user record is loaded, then passed into every service method so each
/// operation knows who is acting.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The authenticated user, as currently stored.
    pub actor: User,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(actor: User) -> Self {
        Self {
            actor,
            request_time: Utc::now(),
        }
    }

    /// The authenticated user's ID.
    pub fn user_id(&self) -> Uuid {
        self.actor.id
    }

    /// The authenticated user's role.
    pub fn role(&self) -> UserRole {
        self.actor.role
    }
}
