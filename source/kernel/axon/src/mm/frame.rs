// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Page ownership registry
//! OWNERS: @kernel-mm-team
//! PUBLIC API: FrameTable (alloc_zeroed/incref/decref/release_unmapped), FrameId
//! INVARIANTS:
//! - A frame on the free list has refcount 0 and appears in no page table.
//! - A frame returns to the free list exactly when its refcount drops to 0.
//! - A freshly allocated frame has refcount 0 until the first mapping takes it.

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use axon_abi::layout::PAGE_SIZE;
use axon_abi::SysError;

use crate::error::{KResult, Violation};

/// Physical address of frame 0.
pub const PHYS_BASE: usize = 0x0010_0000;

/// Index of a physical frame in the registry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(u32);

impl FrameId {
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn to_raw(self) -> u32 {
        self.0
    }

    /// Physical address of the first byte of the frame.
    pub const fn paddr(self) -> usize {
        PHYS_BASE + self.index() * PAGE_SIZE
    }
}

impl fmt::Debug for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:#x})", self.paddr())
    }
}

struct Frame {
    refs: u32,
    allocated: bool,
    bytes: Option<Box<[u8; PAGE_SIZE]>>,
}

/// Fixed arena of physical frames with reference counts.
pub struct FrameTable {
    frames: Vec<Frame>,
    free: Vec<FrameId>,
    #[cfg(feature = "failpoints")]
    deny_next: bool,
}

impl FrameTable {
    /// Creates a registry of `count` free frames. Backing storage is
    /// materialised on first allocation of each frame.
    pub fn new(count: usize) -> Self {
        let frames = (0..count).map(|_| Frame { refs: 0, allocated: false, bytes: None }).collect();
        // Pop order hands out low frames first.
        let free = (0..count).rev().map(FrameId::from_index).collect();
        Self {
            frames,
            free,
            #[cfg(feature = "failpoints")]
            deny_next: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Makes the next allocation fail with `OutOfMemory`.
    #[cfg(feature = "failpoints")]
    pub fn fail_next_alloc(&mut self) {
        self.deny_next = true;
    }

    /// Takes a zero-filled frame off the free list with refcount 0.
    pub fn alloc_zeroed(&mut self) -> KResult<FrameId> {
        #[cfg(feature = "failpoints")]
        if core::mem::take(&mut self.deny_next) {
            return Err(SysError::OutOfMemory.into());
        }
        let id = self.free.pop().ok_or(SysError::OutOfMemory)?;
        let frame = &mut self.frames[id.index()];
        match frame.bytes.as_mut() {
            Some(bytes) => bytes.fill(0),
            None => frame.bytes = Some(Box::new([0u8; PAGE_SIZE])),
        }
        frame.allocated = true;
        frame.refs = 0;
        Ok(id)
    }

    fn live(&self, id: FrameId) -> Result<&Frame, Violation> {
        match self.frames.get(id.index()) {
            Some(frame) if frame.allocated => Ok(frame),
            _ => Err(Violation::FrameNotAllocated { frame: id.to_raw() }),
        }
    }

    fn live_mut(&mut self, id: FrameId) -> Result<&mut Frame, Violation> {
        match self.frames.get_mut(id.index()) {
            Some(frame) if frame.allocated => Ok(frame),
            _ => Err(Violation::FrameNotAllocated { frame: id.to_raw() }),
        }
    }

    pub fn incref(&mut self, id: FrameId) -> Result<(), Violation> {
        let frame = self.live_mut(id)?;
        frame.refs += 1;
        Ok(())
    }

    /// Drops one reference; returns `true` if the frame was freed.
    pub fn decref(&mut self, id: FrameId) -> Result<bool, Violation> {
        let frame = self.live_mut(id)?;
        if frame.refs == 0 {
            return Err(Violation::RefcountUnderflow { frame: id.to_raw() });
        }
        frame.refs -= 1;
        if frame.refs > 0 {
            return Ok(false);
        }
        frame.allocated = false;
        self.free.push(id);
        Ok(true)
    }

    /// Returns a frame that never got mapped.
    pub fn release_unmapped(&mut self, id: FrameId) -> Result<(), Violation> {
        let frame = self.live_mut(id)?;
        if frame.refs != 0 {
            return Err(Violation::RefcountMismatch { frame: id.to_raw(), refs: frame.refs, mappings: 0 });
        }
        frame.allocated = false;
        self.free.push(id);
        Ok(())
    }

    /// Reference count, or `None` for a free frame.
    pub fn refcount(&self, id: FrameId) -> Option<u32> {
        self.live(id).ok().map(|frame| frame.refs)
    }

    pub fn is_allocated(&self, id: FrameId) -> bool {
        self.live(id).is_ok()
    }

    pub fn bytes(&self, id: FrameId) -> Result<&[u8; PAGE_SIZE], Violation> {
        self.live(id)?
            .bytes
            .as_deref()
            .ok_or(Violation::FrameNotAllocated { frame: id.to_raw() })
    }

    pub fn bytes_mut(&mut self, id: FrameId) -> Result<&mut [u8; PAGE_SIZE], Violation> {
        self.live_mut(id)?
            .bytes
            .as_deref_mut()
            .ok_or(Violation::FrameNotAllocated { frame: id.to_raw() })
    }

    /// Allocated frames with their refcounts.
    pub fn allocated(&self) -> impl Iterator<Item = (FrameId, u32)> + '_ {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.allocated)
            .map(|(index, frame)| (FrameId::from_index(index), frame.refs))
    }
}
