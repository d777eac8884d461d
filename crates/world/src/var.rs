//! Distributed variables: one image of `T` per peer, readable and writable
//! from remote peers.

use std::marker::PhantomData;
use std::mem;
use std::rc::Rc;

use bytemuck::Pod;
use transport::Pid;

use crate::error::WorldResult;
use crate::future::Future;
use crate::registry::RegionCell;
use crate::world::World;
use crate::VarId;

/// A value with one image per peer.
///
/// Construction is collective: every peer must create its vars in the same
/// order, so that the id a peer uses for a remote image matches what the
/// remote peer registered. The local image starts zeroed.
///
/// Remote effects follow the superstep contract: a [`Var::put`] lands at its
/// target at the next [`World::sync`], a [`Var::get`] resolves its
/// [`Future`] there. Self-addressed operations are applied immediately.
pub struct Var<T: Pod> {
    world: World,
    id: VarId,
    cell: Rc<RegionCell>,
    _marker: PhantomData<T>,
}

impl<T: Pod> Var<T> {
    /// Creates and registers the local image, initialized to zero bytes.
    pub fn new(world: &World) -> WorldResult<Var<T>> {
        let cell = RegionCell::zeroed(mem::size_of::<T>(), 1);
        let id = world.engine_mut().register_region(&cell)?;
        Ok(Var {
            world: world.clone(),
            id,
            cell,
            _marker: PhantomData,
        })
    }

    /// Creates the variable and sets the local image to `value`.
    pub fn with_value(world: &World, value: T) -> WorldResult<Var<T>> {
        let var = Var::new(world)?;
        var.set(value);
        Ok(var)
    }

    /// Reads the local image.
    pub fn value(&self) -> T {
        let mut bytes = vec![0u8; mem::size_of::<T>()];
        self.cell.read(0, &mut bytes);
        bytemuck::pod_read_unaligned(&bytes)
    }

    /// Writes the local image. Plain local assignment, visible immediately.
    pub fn set(&self, value: T) {
        self.cell.write(0, bytemuck::bytes_of(&value));
    }

    /// Stages a write of `value` into the image at `dst`.
    pub fn put(&self, dst: Pid, value: T) -> WorldResult<()> {
        self.world
            .engine_mut()
            .put(dst, self.id, 0, bytemuck::bytes_of(&value))
    }

    /// Stages a read of the image at `src`; the returned future resolves at
    /// the next sync.
    pub fn get(&self, src: Pid) -> WorldResult<Future<T>> {
        let slot = self
            .world
            .engine_mut()
            .get(src, self.id, mem::size_of::<T>(), 0, 1)?;
        Ok(Future::new(slot))
    }

    /// Stages a write of `value` into every peer's image, own included.
    pub fn broadcast(&self, value: T) -> WorldResult<()> {
        for target in 0..self.world.size() {
            self.put(target, value)?;
        }
        Ok(())
    }

    /// The world this variable is registered with.
    pub fn world(&self) -> &World {
        &self.world
    }
}

impl<T: Pod> Drop for Var<T> {
    fn drop(&mut self) {
        // A peer may still have this image in flight during the current
        // superstep; meet all of them before the id disappears.
        let _ = self.world.barrier();
        let _ = self.world.engine_mut().unregister_region(self.id);
    }
}
