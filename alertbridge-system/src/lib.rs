//! Foundational system components for alertbridge's services.
//!
//! Services own a bounded inbox and run as a single task on the Tokio runtime. Their addresses are
//! handed out to producers, which are suspended while the inbox is full. The [`Controller`]
//! listens for process signals and notifies services about shutdowns.
#![warn(missing_docs)]

mod controller;
mod service;

pub use self::controller::*;
pub use self::service::*;
