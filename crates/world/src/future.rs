//! Futures: destinations for one-sided reads.

use std::marker::PhantomData;

use bytemuck::Pod;

use crate::pending::DestSlot;

/// The eventual result of a [`crate::Var::get`] or [`crate::Coarray::get`].
///
/// The slot is filled during the sync that ends the superstep the get was
/// issued in; [`Future::value`] reads zeroes before that. This is not an
/// async future: there is nothing to poll, the superstep boundary is the
/// only completion point.
pub struct Future<T: Pod> {
    slot: DestSlot,
    _marker: PhantomData<T>,
}

impl<T: Pod> Future<T> {
    pub(crate) fn new(slot: DestSlot) -> Future<T> {
        Future {
            slot,
            _marker: PhantomData,
        }
    }

    /// Reads the delivered value.
    pub fn value(&self) -> T {
        bytemuck::pod_read_unaligned(&self.slot.borrow())
    }
}
