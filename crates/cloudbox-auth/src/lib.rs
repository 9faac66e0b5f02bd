//! # cloudbox-auth
//!
//! Authentication and authorization for Cloudbox.
//!
//! ## Modules
//!
//! - `jwt`: bearer token claims, verification, and minting
//! - `rbac`: the single ownership/role check every service operation uses

pub mod jwt;
pub mod rbac;

pub use jwt::{Claims, JwtDecoder, JwtEncoder, REGISTER_SCOPE, ServiceClaims};
pub use rbac::{AccessPolicy, Action};
