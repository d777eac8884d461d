//! Threaded environment: runs a group of peers as OS threads over an
//! in-process mesh.

use std::sync::Arc;
use std::thread;

use transport::{Mesh, Transport};

use crate::error::WorldResult;
use crate::world::World;

/// Default group size when `BSP_PROCS` is unset.
const DEFAULT_PEERS: usize = 4;

/// Launch configuration for an in-process group.
pub struct Environment {
    size: usize,
}

impl Environment {
    /// An environment of exactly `size` peers.
    pub fn new(size: usize) -> Environment {
        Environment { size }
    }

    /// Reads the group size from the `BSP_PROCS` environment variable,
    /// falling back to 4.
    pub fn from_env() -> Environment {
        let size = std::env::var("BSP_PROCS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_PEERS);
        Environment::new(size)
    }

    /// Number of peers `spawn` will run.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs `f` once per peer, each on its own thread with its own
    /// [`World`], and joins them all. A panicking peer is re-raised on the
    /// caller's thread after the others were joined.
    pub fn spawn<F>(&self, f: F) -> WorldResult<()>
    where
        F: Fn(World) + Send + Sync + 'static,
    {
        let endpoints = Mesh::endpoints(self.size)?;
        let f = Arc::new(f);
        let peers: Vec<_> = endpoints
            .into_iter()
            .map(|endpoint| {
                let f = Arc::clone(&f);
                thread::Builder::new()
                    .name(format!("peer-{}", endpoint.rank()))
                    .spawn(move || f(World::new(Box::new(endpoint))))
            })
            .collect::<Result<_, _>>()
            .expect("spawning a peer thread failed");
        let mut panic: Option<Box<dyn std::any::Any + Send>> = None;
        for peer in peers {
            if let Err(payload) = peer.join() {
                panic.get_or_insert(payload);
            }
        }
        if let Some(payload) = panic {
            std::panic::resume_unwind(payload);
        }
        Ok(())
    }
}
