//! lifecycle_demo
//!
//! Composes a server and its child services on top of `lifecycle_core` and
//! drives them through start, stop and destroy, journaling every event.

pub mod config;
pub mod scenario;
