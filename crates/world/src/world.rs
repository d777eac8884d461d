//! World handle: the per-peer entry point to the superstep runtime.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use bytemuck::Pod;
use transport::{Pid, Transport};

use crate::coarray::Coarray;
use crate::engine::Engine;
use crate::error::WorldResult;

/// One peer's view of the group.
///
/// A `World` is a cheap handle; facade objects clone it to reach the engine.
/// It is deliberately not `Send`: the engine runs on the single thread of
/// its peer, and parallelism lives across peers.
pub struct World {
    engine: Rc<RefCell<Engine>>,
}

impl World {
    /// Wraps a transport endpoint into a peer of the group.
    pub fn new(transport: Box<dyn Transport>) -> World {
        World {
            engine: Rc::new(RefCell::new(Engine::new(transport))),
        }
    }

    /// This peer's rank, in `[0, size)`.
    pub fn rank(&self) -> Pid {
        self.engine.borrow().rank()
    }

    /// Number of peers in the group.
    pub fn size(&self) -> usize {
        self.engine.borrow().size()
    }

    /// Rank of the cyclic successor of this peer.
    pub fn next_rank(&self) -> Pid {
        (self.rank() + 1) % self.size()
    }

    /// Rank of the cyclic predecessor of this peer.
    pub fn prev_rank(&self) -> Pid {
        (self.rank() + self.size() - 1) % self.size()
    }

    /// Plain collective rendezvous, without any delivery.
    pub fn barrier(&self) -> WorldResult<()> {
        self.engine.borrow().barrier()
    }

    /// Ends the current superstep; see the crate docs for the visibility
    /// contract this enforces.
    pub fn sync(&self) -> WorldResult<()> {
        self.engine.borrow_mut().sync()
    }

    pub(crate) fn engine(&self) -> Ref<'_, Engine> {
        self.engine.borrow()
    }

    pub(crate) fn engine_mut(&self) -> RefMut<'_, Engine> {
        self.engine.borrow_mut()
    }
}

impl Clone for World {
    fn clone(&self) -> World {
        World {
            engine: Rc::clone(&self.engine),
        }
    }
}

/// Collects one value from every peer: afterwards, slot `i` of the result
/// holds the value contributed by rank `i`, on every peer. Performs one
/// sync.
pub fn gather_all<T: Pod>(world: &World, value: T) -> WorldResult<Coarray<T>> {
    let gathered = Coarray::new(world, world.size())?;
    let slot = world.rank();
    for target in 0..world.size() {
        gathered.put(target, slot, value)?;
    }
    world.sync()?;
    Ok(gathered)
}
