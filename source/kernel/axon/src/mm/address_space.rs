// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-process address space with refcount-correct insert/remove.

use core::fmt;

use axon_abi::layout::page_round_down;
use axon_abi::Perm;

use super::frame::{FrameId, FrameTable};
use super::page_table::{PageTable, Pte};
use crate::error::KResult;
use crate::types::UserPage;

/// A present user mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mapping {
    pub frame: FrameId,
    pub perm: Perm,
}

impl From<Pte> for Mapping {
    fn from(pte: Pte) -> Self {
        Self { frame: pte.frame(), perm: pte.perm() }
    }
}

/// Page table owned by exactly one process.
#[derive(Default)]
pub struct AddressSpace {
    table: PageTable,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self { table: PageTable::new() }
    }

    pub fn lookup(&self, page: UserPage) -> Option<Mapping> {
        self.table.lookup(page.addr()).map(Mapping::from)
    }

    /// Mapping covering any byte address below `UTOP`.
    pub fn lookup_va(&self, va: usize) -> Option<Mapping> {
        UserPage::new(page_round_down(va)).and_then(|page| self.lookup(page))
    }

    /// Maps `frame` at `page`, replacing any previous mapping.
    ///
    /// The new frame is referenced before the old one is released, so
    /// re-inserting the same frame with other permissions never frees it.
    /// On `OutOfMemory` from table growth nothing changes.
    pub fn insert(&mut self, frames: &mut FrameTable, page: UserPage, frame: FrameId, perm: Perm) -> KResult<()> {
        let slot = self.table.entry_or_grow(frames, page.addr())?;
        frames.incref(frame)?;
        let old = *slot;
        *slot = Pte::new(frame, perm | Perm::PRESENT);
        if old.is_present() {
            frames.decref(old.frame())?;
        }
        Ok(())
    }

    /// Unmaps `page`; absence of a mapping is not an error.
    pub fn remove(&mut self, frames: &mut FrameTable, page: UserPage) -> KResult<Option<Mapping>> {
        let Some(slot) = self.table.entry(page.addr()) else {
            return Ok(None);
        };
        let old = core::mem::replace(slot, Pte::EMPTY);
        if !old.is_present() {
            return Ok(None);
        }
        frames.decref(old.frame())?;
        Ok(Some(old.into()))
    }

    /// Rewrites the permissions of an existing mapping in place.
    pub fn protect(&mut self, page: UserPage, perm: Perm) -> Option<Mapping> {
        let slot = self.table.entry(page.addr())?;
        if !slot.is_present() {
            return None;
        }
        let old = *slot;
        *slot = old.with_perm(perm | Perm::PRESENT);
        Some(old.into())
    }

    /// Present mappings in ascending address order.
    pub fn mappings(&self) -> impl Iterator<Item = (UserPage, Mapping)> + '_ {
        self.table
            .present()
            .filter_map(|(va, pte)| UserPage::new(va).map(|page| (page, Mapping::from(pte))))
    }

    pub fn table_frames(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.table.table_frames()
    }

    /// Releases every mapping and page-table frame.
    pub fn teardown(&mut self, frames: &mut FrameTable) -> KResult<()> {
        let pages: alloc::vec::Vec<UserPage> = self.mappings().map(|(page, _)| page).collect();
        for page in pages {
            self.remove(frames, page)?;
        }
        self.table.release(frames)
    }

    /// Single-line listing for diagnostics.
    pub fn dump(&self) -> MappingDump<'_> {
        MappingDump { space: self }
    }
}

/// `Display` adapter listing an address space's mappings.
pub struct MappingDump<'a> {
    space: &'a AddressSpace,
}

impl fmt::Display for MappingDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (page, mapping) in self.space.mappings() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{:#010x}->{:#x}", page.addr(), mapping.frame.paddr())?;
            for (flag, tag) in [
                (Perm::USER, 'u'),
                (Perm::WRITABLE, 'w'),
                (Perm::COW, 'c'),
            ] {
                if mapping.perm.contains(flag) {
                    write!(f, "{tag}")?;
                }
            }
        }
        if first {
            f.write_str("<empty>")?;
        }
        Ok(())
    }
}
