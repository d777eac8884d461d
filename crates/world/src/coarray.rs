//! Coarrays: one array image per peer, element-addressable from remote
//! peers.

use std::marker::PhantomData;
use std::mem;
use std::rc::Rc;

use bytemuck::Pod;
use transport::Pid;

use crate::error::{WorldError, WorldResult};
use crate::future::Future;
use crate::registry::RegionCell;
use crate::world::World;
use crate::VarId;

/// A distributed array: every peer owns an image of `len` elements.
///
/// Like [`crate::Var`], construction is collective and images start zeroed.
/// Remote writes address single elements ([`Coarray::put`]) or contiguous
/// runs ([`Coarray::put_slice`]); all follow the superstep visibility
/// contract.
pub struct Coarray<T: Pod> {
    world: World,
    id: VarId,
    cell: Rc<RegionCell>,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> Coarray<T> {
    /// Creates and registers a zeroed local image of `len` elements.
    pub fn new(world: &World, len: usize) -> WorldResult<Coarray<T>> {
        let cell = RegionCell::zeroed(mem::size_of::<T>(), len);
        let id = world.engine_mut().register_region(&cell)?;
        Ok(Coarray {
            world: world.clone(),
            id,
            cell,
            len,
            _marker: PhantomData,
        })
    }

    /// Number of elements in each image.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads element `index` of the local image.
    pub fn local(&self, index: usize) -> T {
        let mut bytes = vec![0u8; mem::size_of::<T>()];
        self.cell.read(index * mem::size_of::<T>(), &mut bytes);
        bytemuck::pod_read_unaligned(&bytes)
    }

    /// Writes element `index` of the local image, visible immediately.
    pub fn set_local(&self, index: usize, value: T) {
        self.cell
            .write(index * mem::size_of::<T>(), bytemuck::bytes_of(&value));
    }

    /// Copies the local image out.
    pub fn to_vec(&self) -> Vec<T> {
        (0..self.len).map(|index| self.local(index)).collect()
    }

    /// Stages a write of `value` into element `index` of the image at `dst`.
    pub fn put(&self, dst: Pid, index: usize, value: T) -> WorldResult<()> {
        self.check_run(index, 1)?;
        self.world.engine_mut().put(
            dst,
            self.id,
            index * mem::size_of::<T>(),
            bytemuck::bytes_of(&value),
        )
    }

    /// Stages a write of `values` into the image at `dst`, starting at
    /// element `offset`.
    pub fn put_slice(&self, dst: Pid, offset: usize, values: &[T]) -> WorldResult<()> {
        self.check_run(offset, values.len())?;
        self.world.engine_mut().put(
            dst,
            self.id,
            offset * mem::size_of::<T>(),
            bytemuck::cast_slice(values),
        )
    }

    /// Stages a read of element `index` of the image at `src`.
    pub fn get(&self, src: Pid, index: usize) -> WorldResult<Future<T>> {
        self.check_run(index, 1)?;
        let slot = self.world.engine_mut().get(
            src,
            self.id,
            mem::size_of::<T>(),
            index * mem::size_of::<T>(),
            1,
        )?;
        Ok(Future::new(slot))
    }

    /// The world this coarray is registered with.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Images are built symmetrically, so this image's bounds stand in for
    /// the remote one's when staging.
    fn check_run(&self, offset: usize, count: usize) -> WorldResult<()> {
        if offset + count > self.len {
            return Err(WorldError::OffsetOutOfRange {
                rank: self.world.rank(),
                var: self.id,
                offset: offset * mem::size_of::<T>(),
                len: count * mem::size_of::<T>(),
                size: self.len * mem::size_of::<T>(),
            });
        }
        Ok(())
    }
}

impl<T: Pod> Drop for Coarray<T> {
    fn drop(&mut self) {
        let _ = self.world.barrier();
        let _ = self.world.engine_mut().unregister_region(self.id);
    }
}
