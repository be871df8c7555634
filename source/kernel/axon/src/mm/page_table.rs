// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Two-level page table covering user space.
//!
//! The directory has one slot per 4 MiB below `UTOP`; leaf tables are
//! allocated on demand and each claims one frame from the registry.

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use axon_abi::layout::{PAGE_SHIFT, PT_ENTRIES, PT_SPAN, UTOP};
use axon_abi::Perm;

use super::frame::{FrameId, FrameTable};
use crate::error::KResult;

const DIR_ENTRIES: usize = UTOP / PT_SPAN;
const PERM_MASK: u32 = (1 << PAGE_SHIFT) - 1;

/// Page-table entry: frame number in the high bits, permission bits below.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Pte(u32);

impl Pte {
    pub const EMPTY: Self = Self(0);

    pub fn new(frame: FrameId, perm: Perm) -> Self {
        Self((frame.to_raw() << PAGE_SHIFT) | (perm.bits() & PERM_MASK))
    }

    pub fn is_present(self) -> bool {
        self.perm().contains(Perm::PRESENT)
    }

    pub fn frame(self) -> FrameId {
        FrameId::from_index((self.0 >> PAGE_SHIFT) as usize)
    }

    pub fn perm(self) -> Perm {
        Perm::from_bits_truncate(self.0 & PERM_MASK)
    }

    pub fn with_perm(self, perm: Perm) -> Self {
        Self::new(self.frame(), perm)
    }
}

impl fmt::Debug for Pte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_present() {
            write!(f, "Pte({:?}, {:?})", self.frame(), self.perm())
        } else {
            f.write_str("Pte(empty)")
        }
    }
}

struct LeafTable {
    frame: FrameId,
    entries: Box<[Pte; PT_ENTRIES]>,
}

/// User half of a two-level page table.
pub struct PageTable {
    dir: Vec<Option<LeafTable>>,
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

const fn split(va: usize) -> (usize, usize) {
    (va / PT_SPAN, (va >> PAGE_SHIFT) % PT_ENTRIES)
}

impl PageTable {
    pub fn new() -> Self {
        let mut dir = Vec::with_capacity(DIR_ENTRIES);
        dir.resize_with(DIR_ENTRIES, || None);
        Self { dir }
    }

    /// Entry mapping `va`, if present.
    pub fn lookup(&self, va: usize) -> Option<Pte> {
        let (pdx, ptx) = split(va);
        let leaf = self.dir.get(pdx)?.as_ref()?;
        let pte = leaf.entries[ptx];
        pte.is_present().then_some(pte)
    }

    /// Existing entry slot for `va`, without growing the table.
    pub fn entry(&mut self, va: usize) -> Option<&mut Pte> {
        let (pdx, ptx) = split(va);
        let leaf = self.dir.get_mut(pdx)?.as_mut()?;
        Some(&mut leaf.entries[ptx])
    }

    /// Entry slot for `va`, allocating its leaf table if needed.
    ///
    /// Fails with `OutOfMemory` when the leaf table cannot be allocated;
    /// nothing changes in that case.
    pub fn entry_or_grow(&mut self, frames: &mut FrameTable, va: usize) -> KResult<&mut Pte> {
        let (pdx, ptx) = split(va);
        let slot = &mut self.dir[pdx];
        let leaf = match slot.take() {
            Some(leaf) => slot.insert(leaf),
            None => {
                let frame = frames.alloc_zeroed()?;
                frames.incref(frame)?;
                slot.insert(LeafTable { frame, entries: Box::new([Pte::EMPTY; PT_ENTRIES]) })
            }
        };
        Ok(&mut leaf.entries[ptx])
    }

    /// Present entries in ascending address order.
    pub fn present(&self) -> impl Iterator<Item = (usize, Pte)> + '_ {
        self.dir.iter().enumerate().flat_map(|(pdx, leaf)| {
            leaf.iter().flat_map(move |leaf| {
                leaf.entries
                    .iter()
                    .enumerate()
                    .filter(|(_, pte)| pte.is_present())
                    .map(move |(ptx, pte)| (pdx * PT_SPAN + (ptx << PAGE_SHIFT), *pte))
            })
        })
    }

    /// Frames holding leaf tables.
    pub fn table_frames(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.dir.iter().flatten().map(|leaf| leaf.frame)
    }

    /// Drops every leaf table and its frame reference. Entries must already be cleared.
    pub fn release(&mut self, frames: &mut FrameTable) -> KResult<()> {
        for slot in self.dir.iter_mut() {
            if let Some(leaf) = slot.take() {
                frames.decref(leaf.frame)?;
            }
        }
        Ok(())
    }
}
