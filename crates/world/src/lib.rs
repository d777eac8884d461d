//! Bulk-synchronous parallel superstep runtime.
//!
//! A fixed group of peers advances through *supersteps*: between two calls to
//! [`World::sync`] every peer computes on local state and stages one-sided
//! writes ([`Var::put`], [`Coarray::put`]), one-sided reads ([`Var::get`]),
//! and point-to-point messages ([`Queue::send`]). The sync at the end of the
//! superstep delivers all of them at once: a value put in superstep `n` is
//! readable at its target from superstep `n + 1`, a get issued in `n`
//! resolves its [`Future`] at `n + 1`, and messages sent in `n` iterate in
//! `n + 1`.
//!
//! The crate is split into the engine (region registry, wire frames, pending
//! gets, queue buffers, the barrier protocol) and the typed facade above it.
//! The engine is typed only by byte layout; the facade translates any
//! [`bytemuck::Pod`] element type to raw bytes at the boundary, so the wire
//! carries no runtime type information.
//!
//! Peers communicate through anything that implements
//! [`transport::Transport`]; the in-process [`transport::Mesh`] backs
//! [`Environment::spawn`], which is how the test suite runs a group.

mod coarray;
mod engine;
mod env;
mod error;
mod frame;
mod future;
mod pending;
mod queue;
mod registry;
mod var;
mod world;

pub use coarray::Coarray;
pub use env::Environment;
pub use error::{WorldError, WorldResult};
pub use future::Future;
pub use queue::{Message, Queue};
pub use transport::Pid;
pub use var::Var;
pub use world::{gather_all, World};

/// Identifier of a registered region, unique within one peer's run.
pub type VarId = u64;

/// Identifier of a queue, agreed across peers by collective creation order.
pub type QueueId = u64;
