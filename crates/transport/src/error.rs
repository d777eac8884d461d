//! Error surface of the transport crate.
//!
//! Every variant is fatal to the group: there is no recoverable transport
//! failure in the superstep model. Variants carry enough context (ranks,
//! sizes) to identify the offending peer in a log.

use thiserror::Error;

use crate::Pid;

/// Convenience result alias for fallible transport operations.
pub type TransportResult<T, E = TransportError> = Result<T, E>;

/// Errors surfaced by transport backends.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A group must contain at least one peer.
    #[error("cannot build a peer group of size 0")]
    EmptyGroup,

    /// A peer addressed a rank outside the group.
    #[error("rank {rank} addressed rank {target} outside the group of {size}")]
    RankOutOfRange {
        /// The offending peer.
        rank: Pid,
        /// The rank it tried to reach.
        target: Pid,
        /// Size of the group.
        size: usize,
    },

    /// A reduce-scatter contribution did not provide one value per peer.
    #[error("rank {rank} contributed {got} reduce-scatter values to a group of {size}")]
    ContributionMismatch {
        /// The offending peer.
        rank: Pid,
        /// Number of values it contributed.
        got: usize,
        /// Size of the group.
        size: usize,
    },
}
