//! Timing primitives for a room's actor loop.
//!
//! - [`TickScheduler`]: the fixed-rate simulation tick (60 Hz by default)
//!   that flushes replication deltas.
//! - [`Periodic`]: low-frequency maintenance timers such as the boundary
//!   check and the inactivity sweep.
//! - [`DeadlineQueue`]: keyed, cancelable one-shot deadlines, used for
//!   reconnect grace periods.
//!
//! All three are plain owned values meant to sit inside one
//! `tokio::select!`. Their async methods are cancel-safe, so losing a
//! race to another branch never drops a tick or a deadline:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* handle commands */ }
//!         _ = scheduler.wait_for_tick() => { /* flush deltas */ }
//!         _ = boundary.tick() => { /* correct stray shapes */ }
//!         _ = grace.wait_next() => { /* expire players */ }
//!     }
//! }
//! ```

mod deadline;
mod periodic;
mod scheduler;

pub use deadline::DeadlineQueue;
pub use periodic::Periodic;
pub use scheduler::{TickConfig, TickInfo, TickPolicy, TickScheduler};
