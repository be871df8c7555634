// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Page permission bits accepted across the syscall boundary.

use bitflags::bitflags;

bitflags! {
    /// Permission bits of a user mapping.
    ///
    /// Only these bits may be requested by user code; any other hardware
    /// bit in a raw permission word is rejected.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    pub struct Perm: u32 {
        const PRESENT = 0x001;
        const WRITABLE = 0x002;
        const USER = 0x004;
        /// Bits left to user software.
        const AVAIL = 0x600;
        /// Copy-on-write marker (user software bit).
        const COW = 0x800;
    }
}

impl Perm {
    /// Bits every user mapping must carry.
    pub const REQUIRED: Self = Self::PRESENT.union(Self::USER);
    /// `PRESENT | USER | WRITABLE`, the usual private data page.
    pub const RW: Self = Self::REQUIRED.union(Self::WRITABLE);

    /// Validates a raw permission word supplied by user code.
    ///
    /// Rejects unknown bits, words missing `PRESENT | USER`, and words
    /// asking for both `WRITABLE` and `COW`.
    pub fn from_user(raw: u32) -> Option<Self> {
        let perm = Self::from_bits(raw)?;
        if !perm.contains(Self::REQUIRED) {
            return None;
        }
        if perm.contains(Self::WRITABLE | Self::COW) {
            return None;
        }
        Some(perm)
    }

    /// Writable now, or writable after a copy-on-write fault.
    pub fn is_write_eligible(self) -> bool {
        self.intersects(Self::WRITABLE | Self::COW)
    }
}

bitflags! {
    /// Error code recorded with a page fault.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct FaultCode: u32 {
        /// Set for a protection violation, clear for a non-present page.
        const PROTECTION = 0x1;
        /// Faulting access was a write.
        const WRITE = 0x2;
        /// Fault raised from user mode.
        const USER = 0x4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_perm_requires_present_and_user() {
        assert_eq!(Perm::from_user(0x5), Some(Perm::REQUIRED));
        assert_eq!(Perm::from_user(0x1), None);
        assert_eq!(Perm::from_user(0x4), None);
    }

    #[test]
    fn user_perm_rejects_hardware_bits() {
        // write-through, cache-disable, accessed, dirty, large page, global
        for bit in [0x8, 0x10, 0x20, 0x40, 0x80, 0x100] {
            assert_eq!(Perm::from_user(0x7 | bit), None, "bit {bit:#x}");
        }
    }

    #[test]
    fn user_perm_rejects_writable_cow() {
        assert_eq!(Perm::from_user((Perm::RW | Perm::COW).bits()), None);
        assert!(Perm::from_user((Perm::REQUIRED | Perm::COW).bits()).is_some());
        assert!(Perm::from_user((Perm::RW | Perm::AVAIL).bits()).is_some());
    }

    #[test]
    fn write_eligibility() {
        assert!(Perm::RW.is_write_eligible());
        assert!((Perm::REQUIRED | Perm::COW).is_write_eligible());
        assert!(!Perm::REQUIRED.is_write_eligible());
    }
}
