//! Record model for the mudmux pipeline.
//!
//! Every byte of text moving between the mud and clients is wrapped in
//! a [`LineRecord`] carrying its origin, mutable payload, frozen
//! original, delivery flags, and an append-only update log. Records
//! travel in [`RecordContainer`]s owned by the pipeline's processing
//! stages.
//!
//! # Audit trail
//!
//! Each mutation, lock attempt, send, or drop appends an
//! [`UpdateEntry`] with the acting party and the event stack at the
//! time, so a post-mortem can explain how any delivered line came to
//! have its final form.
//!
//! # Locking
//!
//! A record is locked before it is written to a socket. Mutating a
//! locked record appends a rejected-mutation entry to the log but
//! changes no state - the caller gets an error, the audit trail gets
//! the attempt.

mod container;
mod line;
mod update;

pub use container::RecordContainer;
pub use line::{LineRecord, SharedLine};
pub use update::{UpdateAction, UpdateContext, UpdateEntry};

use mudmux_types::{ErrorCode, RecordId};
use thiserror::Error;

/// Errors from record operations.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A mutation was attempted on a locked record.
    #[error("record {0} is locked")]
    Locked(RecordId),

    /// A container index was out of range.
    #[error("container index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Container length at the time.
        len: usize,
    },
}

impl ErrorCode for RecordError {
    fn code(&self) -> &'static str {
        match self {
            Self::Locked(_) => "RECORD_LOCKED",
            Self::IndexOutOfRange { .. } => "RECORD_INDEX_OUT_OF_RANGE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
