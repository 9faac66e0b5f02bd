//! # cloudbox-database
//!
//! PostgreSQL connection management, embedded migrations, and the
//! repository traits with their PostgreSQL and in-memory implementations.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::Repositories;
