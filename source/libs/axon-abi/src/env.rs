// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Process handles and lifecycle states.

use core::fmt;

/// Number of low bits of an [`EnvId`] holding the slot index.
pub const ENV_GEN_SHIFT: u32 = 12;
/// Upper bound on process table slots representable in an [`EnvId`].
pub const MAX_ENV_SLOTS: usize = 1 << ENV_GEN_SHIFT;
const SLOT_MASK: u32 = (1 << ENV_GEN_SHIFT) - 1;

/// Opaque process handle: generation in the high bits, table slot in the low bits.
///
/// The raw value `0` never names a live process; it is the "caller" alias
/// accepted by every syscall taking a target handle.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct EnvId(u32);

impl EnvId {
    /// Alias for the calling process.
    pub const CURRENT: Self = Self(0);

    /// Builds a handle from a slot index and a non-zero generation.
    pub const fn new(slot: usize, generation: u32) -> Self {
        Self((generation << ENV_GEN_SHIFT) | (slot as u32 & SLOT_MASK))
    }

    /// Reinterprets a register value as a handle.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u32 {
        self.0
    }

    /// Table slot this handle refers to.
    pub const fn slot(self) -> usize {
        (self.0 & SLOT_MASK) as usize
    }

    pub const fn generation(self) -> u32 {
        self.0 >> ENV_GEN_SHIFT
    }

    pub const fn is_current(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnvId({:08x})", self.0)
    }
}

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Lifecycle state of a process record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum EnvStatus {
    /// Slot is unused and may be handed out again.
    Free = 0,
    /// Process is being torn down; reaped at the next scheduling decision.
    Dying = 1,
    /// Eligible to be scheduled.
    Runnable = 2,
    /// Created but not started, or blocked in `recv`.
    NotRunnable = 3,
}

impl EnvStatus {
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Free),
            1 => Some(Self::Dying),
            2 => Some(Self::Runnable),
            3 => Some(Self::NotRunnable),
            _ => None,
        }
    }

    pub const fn to_raw(self) -> u32 {
        self as u32
    }
}
