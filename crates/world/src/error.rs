//! Error surface of the superstep runtime.
//!
//! Everything here is fatal: a variant either flags a broken program
//! (registration misuse, mismatched queue types), a transport failure, or a
//! protocol violation between peers (frames that do not match the exchanged
//! counters). The engine never attempts recovery; variants carry the peer id
//! and the offending id/cookie so the failing superstep can be reconstructed
//! from a log.

use thiserror::Error;
use transport::{Pid, TransportError};

use crate::{QueueId, VarId};

/// Convenience result alias for fallible runtime operations.
pub type WorldResult<T, E = WorldError> = Result<T, E>;

/// Errors surfaced by the superstep engine and its facade.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The underlying transport failed; the group cannot continue.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A region was registered while already present in the registry.
    #[error("rank {rank}: region is already registered as variable {var}")]
    AlreadyRegistered {
        /// The peer whose registry was misused.
        rank: Pid,
        /// The id the region is already known under.
        var: VarId,
    },

    /// An operation named a variable id with no registered region.
    #[error("rank {rank}: unknown variable id {var}")]
    UnknownVar {
        /// The peer that failed to resolve the id.
        rank: Pid,
        /// The unresolved id.
        var: VarId,
    },

    /// A put or get addressed bytes outside the registered region.
    #[error(
        "rank {rank}: variable {var} is {size} bytes, operation wants \
         [{offset}, {offset} + {len})"
    )]
    OffsetOutOfRange {
        /// The peer applying the operation.
        rank: Pid,
        /// The target region.
        var: VarId,
        /// Requested byte offset.
        offset: usize,
        /// Requested byte length.
        len: usize,
        /// Actual region size in bytes.
        size: usize,
    },

    /// A get response arrived for a cookie with no pending entry.
    #[error("rank {rank}: get response for unknown cookie {cookie}")]
    UnknownCookie {
        /// The peer that received the response.
        rank: Pid,
        /// The unmatched cookie.
        cookie: u64,
    },

    /// A get response payload does not fit the destination it was issued for.
    #[error("rank {rank}: cookie {cookie} expected {expected} bytes, got {got}")]
    ResponseLengthMismatch {
        /// The peer that received the response.
        rank: Pid,
        /// The cookie the response answered.
        cookie: u64,
        /// Length the issuing get asked for.
        expected: usize,
        /// Length the response carried.
        got: usize,
    },

    /// A message frame named a queue this peer never created.
    #[error("rank {rank}: unknown queue id {queue}")]
    UnknownQueue {
        /// The peer that failed to resolve the id.
        rank: Pid,
        /// The unresolved id.
        queue: QueueId,
    },

    /// A message frame does not match the queue's element layout, meaning
    /// the peers constructed queues of different types under the same id.
    #[error(
        "rank {rank}: queue {queue} expects {tag_size}+{content_size} byte \
         records, message carries {tag_len}+{content_len}"
    )]
    QueueTypeMismatch {
        /// The receiving peer.
        rank: Pid,
        /// The addressed queue.
        queue: QueueId,
        /// Tag size the queue was created with.
        tag_size: usize,
        /// Content size the queue was created with.
        content_size: usize,
        /// Tag length the frame carried.
        tag_len: usize,
        /// Content length the frame carried.
        content_len: usize,
    },

    /// An inbound frame was too short or internally inconsistent.
    #[error("rank {rank}: malformed {category} frame of {len} bytes")]
    MalformedFrame {
        /// The receiving peer.
        rank: Pid,
        /// Frame category as written on the wire.
        category: &'static str,
        /// Received frame length.
        len: usize,
    },

    /// Pending gets survived the response drain: the counters and the
    /// received frames disagree.
    #[error("rank {rank}: {remaining} gets still pending after sync drained all responses")]
    DanglingGets {
        /// The peer whose table is non-empty.
        rank: Pid,
        /// Number of unresolved entries.
        remaining: usize,
    },
}
