// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Error types for graph input and allocation state

use thiserror::Error;

/// Result alias used across the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the library.
///
/// Cycle detection only ever raises [`Error::InvalidInput`]; the remaining
/// variants belong to the allocation manager.
#[derive(Debug, Error)]
pub enum Error {
    /// Graph input is absent or not a mapping of id to successor ids
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No process with this ID
    #[error("process not found: {0}")]
    ProcessNotFound(String),

    /// No resource with this ID
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// A name matched more than one entry
    #[error("ambiguous name '{0}', use the full ID")]
    AmbiguousName(String),

    /// Blank process or resource name
    #[error("{0} name is required")]
    EmptyName(&'static str),

    /// Zero units given where at least one is needed
    #[error("units must be greater than 0")]
    InvalidUnits,

    /// Allocation asks for more than is free
    #[error("not enough units available. requested: {requested}, available: {available}")]
    InsufficientUnits {
        /// Units asked for
        requested: u32,
        /// Units currently free
        available: u32,
    },

    /// Release of a resource the process does not hold
    #[error("resource {resource} not allocated to process {process}")]
    NotAllocated {
        /// Process ID
        process: String,
        /// Resource ID
        resource: String,
    },

    /// Cancel of a request that was never made
    #[error("no pending request for resource {resource} from process {process}")]
    NoPendingRequest {
        /// Process ID
        process: String,
        /// Resource ID
        resource: String,
    },

    /// A unit count would exceed `u32::MAX`
    #[error("unit count overflow on resource {0}")]
    UnitOverflow(String),

    /// Persisted state breaks the unit bookkeeping
    #[error("inconsistent state: {0}")]
    CorruptState(String),

    /// Delete of a resource that still has units out
    #[error("cannot delete resource {0} while it is allocated")]
    ResourceInUse(String),
}

impl Error {
    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(err.to_string())
    }
}
