//! The superstep engine: outbound staging, inbound dispatch, and the
//! barrier protocol that gives puts, gets, and messages their visibility
//! guarantees.
//!
//! The engine runs on its peer's single thread and is typed only by byte
//! layout; the facade translates element types at the boundary. Everything
//! staged between two syncs is counted per destination, and the sync
//! exchanges those counters so every peer knows exactly how many frames of
//! each category it must drain before it may proceed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::mem;
use std::rc::Rc;

use log::{debug, trace};
use transport::{Category, Pid, Transport};

use crate::error::{WorldError, WorldResult};
use crate::frame::{
    decode_get, decode_get_response, decode_message, decode_put, encode_get, encode_get_response,
    encode_message, encode_put, GetFrame,
};
use crate::pending::{DestSlot, PendingGets};
use crate::registry::{RegionCell, Registry};
use crate::{QueueId, VarId};

/// Per-queue receive state. Records land in `incoming` during sync and are
/// readable from `delivered` throughout the following superstep.
struct QueueState {
    tag_size: usize,
    content_size: usize,
    incoming: Vec<u8>,
    delivered: Vec<u8>,
}

pub(crate) struct Engine {
    transport: Box<dyn Transport>,
    registry: Registry,
    pending: PendingGets,
    queues: HashMap<QueueId, QueueState>,
    next_queue_id: QueueId,
    put_counts: Vec<u64>,
    get_counts: Vec<u64>,
    msg_counts: Vec<u64>,
    local_gets: u64,
    /// Staging buffer reused for every outbound frame.
    scratch: Vec<u8>,
}

impl Engine {
    pub(crate) fn new(transport: Box<dyn Transport>) -> Engine {
        let size = transport.size();
        let rank = transport.rank();
        Engine {
            transport,
            registry: Registry::new(rank),
            pending: PendingGets::new(rank),
            queues: HashMap::new(),
            next_queue_id: 0,
            put_counts: vec![0; size],
            get_counts: vec![0; size],
            msg_counts: vec![0; size],
            local_gets: 0,
            scratch: Vec::new(),
        }
    }

    pub(crate) fn rank(&self) -> Pid {
        self.transport.rank()
    }

    pub(crate) fn size(&self) -> usize {
        self.transport.size()
    }

    pub(crate) fn barrier(&self) -> WorldResult<()> {
        self.transport.barrier()?;
        Ok(())
    }

    // ---- registration -----------------------------------------------------

    pub(crate) fn register_region(&mut self, region: &Rc<RegionCell>) -> WorldResult<VarId> {
        self.registry.register(region)
    }

    pub(crate) fn unregister_region(&mut self, id: VarId) -> WorldResult<()> {
        self.registry.unregister(id)
    }

    pub(crate) fn create_queue(&mut self, tag_size: usize, content_size: usize) -> QueueId {
        let id = self.next_queue_id;
        self.next_queue_id += 1;
        self.queues.insert(
            id,
            QueueState {
                tag_size,
                content_size,
                incoming: Vec::new(),
                delivered: Vec::new(),
            },
        );
        id
    }

    pub(crate) fn destroy_queue(&mut self, id: QueueId) -> WorldResult<()> {
        self.queues
            .remove(&id)
            .map(|_| ())
            .ok_or(WorldError::UnknownQueue {
                rank: self.rank(),
                queue: id,
            })
    }

    // ---- outbound staging -------------------------------------------------

    /// Stages a one-sided write of `payload` into image `dst` of the region
    /// registered under `var`, starting `offset` bytes into it.
    ///
    /// A self-addressed put is applied immediately instead of being
    /// buffered: the value is visible before the next sync.
    pub(crate) fn put(
        &mut self,
        dst: Pid,
        var: VarId,
        offset: usize,
        payload: &[u8],
    ) -> WorldResult<()> {
        if dst == self.rank() {
            let region = self.registry.resolve(var)?;
            check_range(self.transport.rank(), var, offset, payload.len(), region)?;
            region.write(offset, payload);
            return Ok(());
        }
        encode_put(&mut self.scratch, var, offset, payload);
        self.transport.send(dst, Category::Put, &self.scratch)?;
        self.put_counts[dst] += 1;
        trace!(
            "rank {} staged put of {} bytes to var {} at rank {}",
            self.rank(),
            payload.len(),
            var,
            dst
        );
        Ok(())
    }

    /// Stages a one-sided read of `count` elements from image `src` of the
    /// region registered under `var` and returns the slot the bytes will be
    /// delivered into at the next sync.
    ///
    /// A self-addressed get is satisfied immediately from local memory.
    pub(crate) fn get(
        &mut self,
        src: Pid,
        var: VarId,
        element_size: usize,
        offset: usize,
        count: usize,
    ) -> WorldResult<DestSlot> {
        let len = element_size * count;
        let slot: DestSlot = Rc::new(RefCell::new(vec![0u8; len].into_boxed_slice()));
        if src == self.rank() {
            let region = self.registry.resolve(var)?;
            check_range(self.transport.rank(), var, offset, len, region)?;
            region.read(offset, &mut slot.borrow_mut());
            return Ok(slot);
        }
        let cookie = self.pending.allocate();
        encode_get(
            &mut self.scratch,
            &GetFrame {
                var,
                offset,
                element_size,
                count,
                cookie,
            },
        );
        self.transport.send(src, Category::Get, &self.scratch)?;
        self.pending.register(cookie, Rc::clone(&slot), len);
        self.get_counts[src] += 1;
        self.local_gets += 1;
        trace!(
            "rank {} staged get {} of {} bytes from var {} at rank {}",
            self.rank(),
            cookie,
            len,
            var,
            src
        );
        Ok(slot)
    }

    /// Stages a message for queue `queue` at `dst`. Messages are never
    /// short-circuited: even a self-addressed send becomes readable only in
    /// the next superstep.
    pub(crate) fn send(
        &mut self,
        dst: Pid,
        queue: QueueId,
        tag: &[u8],
        content: &[u8],
    ) -> WorldResult<()> {
        encode_message(&mut self.scratch, queue, tag, content);
        self.transport.send(dst, Category::Message, &self.scratch)?;
        self.msg_counts[dst] += 1;
        Ok(())
    }

    /// Copies the records delivered to `queue` in the last sync.
    pub(crate) fn delivered(&self, queue: QueueId) -> WorldResult<(usize, usize, Vec<u8>)> {
        let state = self.queues.get(&queue).ok_or(WorldError::UnknownQueue {
            rank: self.transport.rank(),
            queue,
        })?;
        Ok((state.tag_size, state.content_size, state.delivered.clone()))
    }

    // ---- the superstep barrier --------------------------------------------

    /// Ends the current superstep: delivers every staged put, answers every
    /// remote get, files every message, resolves every local get, and
    /// resets the counters for the next superstep.
    pub(crate) fn sync(&mut self) -> WorldResult<()> {
        // No peer may still be staging operations for this superstep.
        self.transport.barrier()?;

        let remote_puts = self.transport.reduce_scatter_sum(&self.put_counts)?;
        let remote_gets = self.transport.reduce_scatter_sum(&self.get_counts)?;
        let remote_msgs = self.transport.reduce_scatter_sum(&self.msg_counts)?;
        debug!(
            "rank {} sync: {} puts, {} gets, {} messages inbound, {} gets pending",
            self.rank(),
            remote_puts,
            remote_gets,
            remote_msgs,
            self.local_gets
        );

        for _ in 0..remote_puts {
            let (src, _) = self.transport.probe(Category::Put)?;
            let frame = self.transport.recv(src, Category::Put)?;
            self.apply_put(src, &frame)?;
        }

        for _ in 0..remote_gets {
            let (src, _) = self.transport.probe(Category::Get)?;
            let frame = self.transport.recv(src, Category::Get)?;
            self.answer_get(src, &frame)?;
        }

        for _ in 0..remote_msgs {
            let (src, _) = self.transport.probe(Category::Message)?;
            let frame = self.transport.recv(src, Category::Message)?;
            self.file_message(src, &frame)?;
        }

        // Every response this peer is owed has now been sent by its origin.
        self.transport.barrier()?;

        for _ in 0..self.local_gets {
            let (src, _) = self.transport.probe(Category::GetResponse)?;
            let frame = self.transport.recv(src, Category::GetResponse)?;
            let response = decode_get_response(self.transport.rank(), &frame)?;
            self.pending.resolve(response.cookie, response.payload)?;
            trace!(
                "rank {} resolved get {} from rank {}",
                self.rank(),
                response.cookie,
                src
            );
        }
        if !self.pending.is_empty() {
            return Err(WorldError::DanglingGets {
                rank: self.rank(),
                remaining: self.pending.len(),
            });
        }

        self.put_counts.fill(0);
        self.get_counts.fill(0);
        self.msg_counts.fill(0);
        self.local_gets = 0;
        for state in self.queues.values_mut() {
            mem::swap(&mut state.incoming, &mut state.delivered);
            state.incoming.clear();
        }

        // No peer starts staging the next superstep until every peer has
        // finished reading delivered state.
        self.transport.barrier()?;
        Ok(())
    }

    // ---- inbound dispatch -------------------------------------------------

    fn apply_put(&mut self, src: Pid, frame: &[u8]) -> WorldResult<()> {
        let rank = self.transport.rank();
        let put = decode_put(rank, frame)?;
        let region = self.registry.resolve(put.var)?;
        check_range(rank, put.var, put.offset, put.payload.len(), region)?;
        region.write(put.offset, put.payload);
        trace!(
            "rank {} applied put of {} bytes from rank {} to var {}",
            rank,
            put.payload.len(),
            src,
            put.var
        );
        Ok(())
    }

    fn answer_get(&mut self, src: Pid, frame: &[u8]) -> WorldResult<()> {
        let rank = self.transport.rank();
        let get = decode_get(rank, frame)?;
        let len = get
            .element_size
            .checked_mul(get.count)
            .ok_or(WorldError::MalformedFrame {
                rank,
                category: "get",
                len: frame.len(),
            })?;
        let mut payload = Vec::with_capacity(len);
        {
            let region = self.registry.resolve(get.var)?;
            check_range(rank, get.var, get.offset, len, region)?;
            region.read_into(get.offset, len, &mut payload);
        }
        encode_get_response(&mut self.scratch, get.cookie, &payload);
        self.transport
            .send(src, Category::GetResponse, &self.scratch)?;
        trace!(
            "rank {} answered get {} from rank {} with {} bytes of var {}",
            rank,
            get.cookie,
            src,
            len,
            get.var
        );
        Ok(())
    }

    fn file_message(&mut self, src: Pid, frame: &[u8]) -> WorldResult<()> {
        let rank = self.transport.rank();
        let message = decode_message(rank, frame)?;
        let state = self
            .queues
            .get_mut(&message.queue)
            .ok_or(WorldError::UnknownQueue {
                rank,
                queue: message.queue,
            })?;
        if message.tag.len() != state.tag_size || message.content.len() != state.content_size {
            return Err(WorldError::QueueTypeMismatch {
                rank,
                queue: message.queue,
                tag_size: state.tag_size,
                content_size: state.content_size,
                tag_len: message.tag.len(),
                content_len: message.content.len(),
            });
        }
        state.incoming.extend_from_slice(message.tag);
        state.incoming.extend_from_slice(message.content);
        trace!(
            "rank {} filed message from rank {} into queue {}",
            rank,
            src,
            message.queue
        );
        Ok(())
    }
}

fn check_range(
    rank: Pid,
    var: VarId,
    offset: usize,
    len: usize,
    region: &Rc<RegionCell>,
) -> WorldResult<()> {
    let size = region.len_bytes();
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(WorldError::OffsetOutOfRange {
            rank,
            var,
            offset,
            len,
            size,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport::Mesh;

    fn solo_engine() -> Engine {
        let mut endpoints = Mesh::endpoints(1).unwrap();
        Engine::new(Box::new(endpoints.remove(0)))
    }

    #[test]
    fn put_beyond_the_region_is_a_protocol_violation() {
        let mut engine = solo_engine();
        let region = RegionCell::zeroed(4, 1);
        let id = engine.register_region(&region).unwrap();

        // A frame written against a larger remote image, as happens when
        // peers register regions of different sizes under the same id.
        let mut frame = Vec::new();
        encode_put(&mut frame, id, 4, &[0xAB; 4]);
        assert!(matches!(
            engine.apply_put(0, &frame),
            Err(WorldError::OffsetOutOfRange {
                rank: 0,
                var,
                offset: 4,
                len: 4,
                size: 4,
            }) if var == id
        ));
    }

    #[test]
    fn get_beyond_the_region_is_a_protocol_violation() {
        let mut engine = solo_engine();
        let region = RegionCell::zeroed(4, 1);
        let id = engine.register_region(&region).unwrap();

        let mut frame = Vec::new();
        encode_get(
            &mut frame,
            &GetFrame {
                var: id,
                offset: 0,
                element_size: 4,
                count: 2,
                cookie: 0,
            },
        );
        assert!(matches!(
            engine.answer_get(0, &frame),
            Err(WorldError::OffsetOutOfRange {
                rank: 0,
                var,
                offset: 0,
                len: 8,
                size: 4,
            }) if var == id
        ));
    }

    #[test]
    fn mistyped_message_is_a_protocol_violation() {
        let mut engine = solo_engine();
        let queue = engine.create_queue(4, 4);

        // A sender whose queue at this position has a 2-byte tag type.
        let mut frame = Vec::new();
        encode_message(&mut frame, queue, &[0; 2], &[0; 4]);
        assert!(matches!(
            engine.file_message(0, &frame),
            Err(WorldError::QueueTypeMismatch {
                rank: 0,
                queue: q,
                tag_size: 4,
                content_size: 4,
                tag_len: 2,
                content_len: 4,
            }) if q == queue
        ));
    }

    #[test]
    fn pending_gets_surviving_the_drain_fail_sync() {
        let mut engine = solo_engine();

        // An entry the response drain will never see, as if the local get
        // counter and the table had desynced.
        let slot: DestSlot = Rc::new(RefCell::new(vec![0u8; 4].into_boxed_slice()));
        let cookie = engine.pending.allocate();
        engine.pending.register(cookie, slot, 4);

        assert!(matches!(
            engine.sync(),
            Err(WorldError::DanglingGets {
                rank: 0,
                remaining: 1,
            })
        ));
    }
}
