//! Collectives shared by the endpoints of an in-process group.
//!
//! Both cells are generation-stamped so they can be reused round after round
//! without reallocation: a waiter watches the generation counter instead of
//! its own arrival flag, which makes the cells safe against a fast peer
//! re-entering the next round while stragglers are still waking up.

use parking_lot::{Condvar, Mutex};

use crate::Pid;

struct BarrierState {
    arrived: usize,
    generation: u64,
}

/// Sense-reversing rendezvous for a fixed number of participants.
pub(crate) struct Barrier {
    state: Mutex<BarrierState>,
    released: Condvar,
    participants: usize,
}

impl Barrier {
    pub(crate) fn new(participants: usize) -> Barrier {
        Barrier {
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
            }),
            released: Condvar::new(),
            participants,
        }
    }

    /// Blocks until every participant of the current round has entered.
    pub(crate) fn wait(&self) {
        let mut state = self.state.lock();
        state.arrived += 1;
        if state.arrived == self.participants {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.released.notify_all();
        } else {
            let generation = state.generation;
            while state.generation == generation {
                self.released.wait(&mut state);
            }
        }
    }
}

struct ReduceState {
    /// Running element-wise sums of the current round.
    sums: Vec<u64>,
    /// Snapshot of the last completed round, indexed by reader rank.
    results: Vec<u64>,
    contributed: usize,
    generation: u64,
}

/// Element-wise sum with the result scattered by rank.
///
/// The completing peer snapshots the sums before clearing them, so a reader
/// of round `n` never observes accumulation for round `n + 1`: that round
/// cannot complete until the reader itself has contributed to it.
pub(crate) struct ReduceScatter {
    state: Mutex<ReduceState>,
    complete: Condvar,
    participants: usize,
}

impl ReduceScatter {
    pub(crate) fn new(participants: usize) -> ReduceScatter {
        ReduceScatter {
            state: Mutex::new(ReduceState {
                sums: vec![0; participants],
                results: vec![0; participants],
                contributed: 0,
                generation: 0,
            }),
            complete: Condvar::new(),
            participants,
        }
    }

    /// Adds this peer's per-target contributions and blocks until the round
    /// completes; returns the total contributed toward `rank` by all peers.
    pub(crate) fn accumulate(&self, rank: Pid, contributions: &[u64]) -> u64 {
        let mut guard = self.state.lock();
        {
            let state = &mut *guard;
            for (slot, value) in state.sums.iter_mut().zip(contributions) {
                *slot += *value;
            }
        }
        guard.contributed += 1;
        if guard.contributed == self.participants {
            let state = &mut *guard;
            state.contributed = 0;
            state.results.copy_from_slice(&state.sums);
            state.sums.fill(0);
            state.generation = state.generation.wrapping_add(1);
            self.complete.notify_all();
        } else {
            let generation = guard.generation;
            while guard.generation == generation {
                self.complete.wait(&mut guard);
            }
        }
        guard.results[rank]
    }
}
