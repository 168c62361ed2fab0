//! Batch drivers.

pub mod sync;

pub use sync::{SyncError, SyncReport, SyncRunner};
