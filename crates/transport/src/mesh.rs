//! In-process mesh backend: one endpoint per peer over shared inboxes.
//!
//! Every peer owns a [`MeshEndpoint`]; all endpoints of a group share the
//! inbox table and the collective cells behind an `Arc`. A send is a single
//! lock-push into the receiver's per-category inbox, so delivery is FIFO per
//! `(src, dst, category)` by construction. Probes and receives park on a
//! condvar until a matching frame arrives; there is no polling loop.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::collective::{Barrier, ReduceScatter};
use crate::{Category, Pid, Transport, TransportError, TransportResult};

/// One FIFO of framed messages for a single `(receiver, category)` pair.
#[derive(Default)]
struct Inbox {
    queue: Mutex<VecDeque<(Pid, Vec<u8>)>>,
    arrived: Condvar,
}

impl Inbox {
    fn push(&self, src: Pid, frame: Vec<u8>) {
        self.queue.lock().push_back((src, frame));
        self.arrived.notify_all();
    }

    /// Blocks until a frame is queued; reports the oldest without removing it.
    fn probe(&self) -> (Pid, usize) {
        let mut queue = self.queue.lock();
        loop {
            if let Some((src, frame)) = queue.front() {
                return (*src, frame.len());
            }
            self.arrived.wait(&mut queue);
        }
    }

    /// Blocks until a frame from `src` is queued and removes the oldest one.
    ///
    /// Skipping over frames from other sources keeps per-source order intact
    /// while letting the caller pair a `probe` result with its `recv`.
    fn pop_from(&self, src: Pid) -> Vec<u8> {
        let mut queue = self.queue.lock();
        loop {
            if let Some(at) = queue.iter().position(|(from, _)| *from == src) {
                // The index came from the scan above, so the entry exists.
                let (_, frame) = queue.remove(at).expect("scanned index in range");
                return frame;
            }
            self.arrived.wait(&mut queue);
        }
    }
}

/// State shared by all endpoints of one group.
struct Shared {
    /// Indexed by receiver rank, then category.
    inboxes: Vec<[Inbox; Category::COUNT]>,
    barrier: Barrier,
    reduce: ReduceScatter,
}

/// Builder for in-process groups.
pub struct Mesh;

impl Mesh {
    /// Creates the endpoints of a fully connected group of `size` peers.
    ///
    /// The returned endpoints are meant to be moved onto one thread each;
    /// the group stays alive until the last endpoint is dropped.
    pub fn endpoints(size: usize) -> TransportResult<Vec<MeshEndpoint>> {
        if size == 0 {
            return Err(TransportError::EmptyGroup);
        }
        let inboxes = (0..size)
            .map(|_| std::array::from_fn(|_| Inbox::default()))
            .collect();
        let shared = Arc::new(Shared {
            inboxes,
            barrier: Barrier::new(size),
            reduce: ReduceScatter::new(size),
        });
        Ok((0..size)
            .map(|rank| MeshEndpoint {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect())
    }
}

/// One peer's handle on an in-process group.
pub struct MeshEndpoint {
    rank: Pid,
    shared: Arc<Shared>,
}

impl MeshEndpoint {
    fn check_rank(&self, target: Pid) -> TransportResult<()> {
        if target >= self.shared.inboxes.len() {
            return Err(TransportError::RankOutOfRange {
                rank: self.rank,
                target,
                size: self.shared.inboxes.len(),
            });
        }
        Ok(())
    }
}

impl Transport for MeshEndpoint {
    fn rank(&self) -> Pid {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.inboxes.len()
    }

    fn send(&self, dst: Pid, category: Category, frame: &[u8]) -> TransportResult<()> {
        self.check_rank(dst)?;
        self.shared.inboxes[dst][category.index()].push(self.rank, frame.to_vec());
        Ok(())
    }

    fn probe(&self, category: Category) -> TransportResult<(Pid, usize)> {
        Ok(self.shared.inboxes[self.rank][category.index()].probe())
    }

    fn recv(&self, src: Pid, category: Category) -> TransportResult<Vec<u8>> {
        self.check_rank(src)?;
        Ok(self.shared.inboxes[self.rank][category.index()].pop_from(src))
    }

    fn barrier(&self) -> TransportResult<()> {
        self.shared.barrier.wait();
        Ok(())
    }

    fn reduce_scatter_sum(&self, contributions: &[u64]) -> TransportResult<u64> {
        if contributions.len() != self.size() {
            return Err(TransportError::ContributionMismatch {
                rank: self.rank,
                got: contributions.len(),
                size: self.size(),
            });
        }
        Ok(self.shared.reduce.accumulate(self.rank, contributions))
    }
}
