//! # Linkbridge
//!
//! Runs pre-registered tasks on a dedicated worker thread, reusing the link
//! protocol for the hop. The caller picks a task by id and hands over a
//! snapshot of named parameters; the worker looks the task up in its
//! registry, runs it, and sends the result back.
//!
//! ## Philosophy
//!
//! - **No Code Shipping**: Only ids and data cross the boundary. Tasks are
//!   plain Rust closures registered before the bridge exists.
//! - **Same Protocol Everywhere**: The hop is an ordinary pair of peers, so a
//!   parameter can be an object the task calls back into.

mod bridge;
mod error;
mod registry;
mod worker;


pub use crate::bridge::ThreadBridge;
pub use crate::error::Error;
pub use crate::error::Result;
pub use crate::registry::Params;
pub use crate::registry::Task;
pub use crate::registry::TaskFuture;
pub use crate::registry::TaskRegistry;
