// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Kernel error kinds.
//!
//! `SysError` is what user code sees. `Violation` marks states that must be
//! unreachable; observing one terminates the offending process.

use core::fmt;

use axon_abi::{EnvId, SysError};

/// Result alias used throughout the kernel.
pub type KResult<T> = Result<T, Error>;

/// Impossible states detected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Reference count would drop below zero.
    RefcountUnderflow { frame: u32 },
    /// Operation on a frame that sits on the free list.
    FrameNotAllocated { frame: u32 },
    /// Reference count disagrees with the number of mappings found.
    RefcountMismatch { frame: u32, refs: u32, mappings: u32 },
    /// Allocated frame referenced by nothing.
    LeakedFrame { frame: u32 },
    /// Process marked `recving` while runnable.
    RecvingWhileRunnable { env: EnvId },
    /// Mapping carries both writable and copy-on-write.
    WritableCow { env: EnvId, va: usize },
}

/// Kernel-internal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Recoverable error returned to the caller.
    Sys(SysError),
    /// Invariant violation.
    Violation(Violation),
    /// Caller blocked; no return value is written until it is woken.
    Blocked,
}

impl From<SysError> for Error {
    fn from(value: SysError) -> Self {
        Self::Sys(value)
    }
}

impl From<Violation> for Error {
    fn from(value: Violation) -> Self {
        Self::Violation(value)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sys(err) => write!(f, "{err}"),
            Self::Violation(v) => write!(f, "invariant violated: {v}"),
            Self::Blocked => f.write_str("blocked"),
        }
    }
}
