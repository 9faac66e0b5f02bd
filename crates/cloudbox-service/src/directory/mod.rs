//! Directory tree services.

pub mod service;
pub mod tree;

pub use service::DirectoryService;
pub use tree::{MAX_TREE_DEPTH, Subtree, collect_subtree};
