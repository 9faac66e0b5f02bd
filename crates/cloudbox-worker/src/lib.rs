//! Scheduled maintenance for Cloudbox.
//!
//! This crate provides:
//! - A cron scheduler that owns the periodic jobs
//! - The pending-upload reaper, which removes uploads that were started
//!   but never completed

pub mod jobs;
pub mod scheduler;

pub use jobs::UploadReaper;
pub use scheduler::CronScheduler;
