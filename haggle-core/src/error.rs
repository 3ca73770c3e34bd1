//! Errors shared across the workspace.
use thiserror::Error;

/// Error variants raised by trainers and replay buffers.
///
/// Two conditions are deliberately *not* errors: an update call before the
/// replay buffer has reached its warm-up occupancy, and an update call off
/// the configured update period. Both are designed gates and make the update
/// a silent no-op. Numerical instability (NaN/Inf losses) is likewise not
/// detected; corrupted parameters propagate into subsequent steps.
#[derive(Debug, Error)]
pub enum HaggleError {
    /// The observation-space and action-space lists passed at construction
    /// disagree on the roster size. Fatal, no recovery.
    #[error("roster mismatch: {obs} observation spaces but {act} action spaces")]
    RosterMismatch {
        /// Number of observation-space entries.
        obs: usize,
        /// Number of action-space entries.
        act: usize,
    },

    /// An update cycle received a peer view list whose size disagrees with
    /// the roster the trainer was built for.
    #[error("expected {expected} peer views, got {got}")]
    PeerCount {
        /// Roster size minus one (the trainer itself is not a peer).
        expected: usize,
        /// Number of peer views received.
        got: usize,
    },

    /// Sampling was attempted on a buffer holding no transitions.
    #[error("replay buffer is empty")]
    EmptyBuffer,

    /// A sampling index points beyond the stored entries. Indices never
    /// wrap; requesting more than is stored fails fast.
    #[error("sample index {ix} out of range ({len} stored)")]
    IndexOutOfRange {
        /// The offending index.
        ix: usize,
        /// Number of stored entries.
        len: usize,
    },

    /// A record value was read with a kind it does not hold.
    #[error("record key {0} does not hold the requested kind")]
    RecordValueType(String),

    /// A record key is absent.
    #[error("record key {0} not found")]
    RecordKeyNotFound(String),
}
