// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Capability-checked access to a process's own memory
//! OWNERS: @kernel-mm-team
//! PUBLIC API: AddressSpaceView (query/mappings/read/check), AddressSpaceViewMut (write), PageFault
//! INVARIANTS:
//! - Reads need PRESENT|USER, writes additionally WRITABLE; COW pages are not writable.
//! - Every user-memory access by the kernel or the runtime goes through these types.

extern crate alloc;

use alloc::vec::Vec;

use axon_abi::layout::{PAGE_SIZE, UTOP};
use axon_abi::{FaultCode, Perm};

use super::address_space::{AddressSpace, Mapping};
use super::frame::FrameTable;
use crate::log_error;
use crate::types::UserPage;

/// Fault raised by a denied access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageFault {
    pub va: usize,
    pub code: FaultCode,
}

fn fault(va: usize, present: bool, write: bool) -> PageFault {
    let mut code = FaultCode::USER;
    code.set(FaultCode::PROTECTION, present);
    code.set(FaultCode::WRITE, write);
    PageFault { va, code }
}

fn required(write: bool) -> Perm {
    if write {
        Perm::RW
    } else {
        Perm::REQUIRED
    }
}

/// Checks every page of `[va, va + len)` and hands each chunk to `visit`.
fn walk(
    space: &AddressSpace,
    va: usize,
    len: usize,
    write: bool,
    mut visit: impl FnMut(Mapping, usize, core::ops::Range<usize>) -> Result<(), PageFault>,
) -> Result<(), PageFault> {
    let end = match va.checked_add(len) {
        Some(end) if end <= UTOP => end,
        _ => return Err(fault(va, false, write)),
    };
    let mut cursor = va;
    while cursor < end {
        let offset = cursor % PAGE_SIZE;
        let chunk = (PAGE_SIZE - offset).min(end - cursor);
        let mapping = space.lookup_va(cursor).ok_or_else(|| fault(cursor, false, write))?;
        if !mapping.perm.contains(required(write)) {
            return Err(fault(cursor, true, write));
        }
        let done = cursor - va;
        visit(mapping, offset, done..done + chunk)?;
        cursor += chunk;
    }
    Ok(())
}

fn lost_frame(va: usize, write: bool) -> PageFault {
    log_error!(target: "mm", "mapped frame missing from registry at {:#x}", va);
    fault(va, true, write)
}

/// Read-only view of one address space.
pub struct AddressSpaceView<'a> {
    space: &'a AddressSpace,
    frames: &'a FrameTable,
}

impl<'a> AddressSpaceView<'a> {
    pub fn new(space: &'a AddressSpace, frames: &'a FrameTable) -> Self {
        Self { space, frames }
    }

    /// Mapping covering `va`, if any.
    pub fn query(&self, va: usize) -> Option<Mapping> {
        self.space.lookup_va(va)
    }

    /// Present pages and their permissions.
    pub fn mappings(&self) -> Vec<(UserPage, Perm)> {
        self.space.mappings().map(|(page, mapping)| (page, mapping.perm)).collect()
    }

    /// Verifies `[va, va + len)` is accessible without touching it.
    pub fn check(&self, va: usize, len: usize, write: bool) -> Result<(), PageFault> {
        walk(self.space, va, len, write, |_, _, _| Ok(()))
    }

    pub fn read(&self, va: usize, buf: &mut [u8]) -> Result<(), PageFault> {
        let frames = self.frames;
        walk(self.space, va, buf.len(), false, |mapping, offset, range| {
            let bytes = frames.bytes(mapping.frame).map_err(|_| lost_frame(va + range.start, false))?;
            let len = range.len();
            buf[range].copy_from_slice(&bytes[offset..offset + len]);
            Ok(())
        })
    }
}

/// Mutable view of one address space.
pub struct AddressSpaceViewMut<'a> {
    space: &'a AddressSpace,
    frames: &'a mut FrameTable,
}

impl<'a> AddressSpaceViewMut<'a> {
    pub fn new(space: &'a AddressSpace, frames: &'a mut FrameTable) -> Self {
        Self { space, frames }
    }

    pub fn as_view(&self) -> AddressSpaceView<'_> {
        AddressSpaceView::new(self.space, self.frames)
    }

    pub fn read(&self, va: usize, buf: &mut [u8]) -> Result<(), PageFault> {
        self.as_view().read(va, buf)
    }

    /// Writes `data` at `va`. Stops at the first denied page; earlier pages
    /// keep what was written.
    pub fn write(&mut self, va: usize, data: &[u8]) -> Result<(), PageFault> {
        let frames = &mut *self.frames;
        walk(self.space, va, data.len(), true, |mapping, offset, range| {
            let bytes = frames.bytes_mut(mapping.frame).map_err(|_| lost_frame(va + range.start, true))?;
            let len = range.len();
            bytes[offset..offset + len].copy_from_slice(&data[range]);
            Ok(())
        })
    }
}
