// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed descriptor rings paired 1:1 with packet buffers.

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec::Vec;

use axon_hal::DmaBuffer;

use crate::desc::Descriptor;

/// Bytes per packet buffer (matches the 2048-byte receive buffer size).
pub const BUFFER_SIZE: usize = 2048;

/// One DMA packet buffer.
pub struct PacketBuffer {
    bus_addr: u64,
    bytes: Box<[u8; BUFFER_SIZE]>,
}

impl DmaBuffer for PacketBuffer {
    fn bus_addr(&self) -> u64 {
        self.bus_addr
    }

    fn as_slice(&self) -> &[u8] {
        &self.bytes[..]
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..]
    }
}

/// Descriptor ring and its buffer pool.
///
/// Sized once at attach time; never grows afterwards.
pub struct Ring<D: Descriptor> {
    base: u64,
    buffer_base: u64,
    desc: Vec<D>,
    buffers: Vec<PacketBuffer>,
}

impl<D: Descriptor> Ring<D> {
    /// Allocates `count` descriptors and buffers, buffer `i` at
    /// `buffer_base + i * BUFFER_SIZE` on the bus.
    pub(crate) fn new(base: u64, buffer_base: u64, count: usize) -> Self {
        let buffers = (0..count)
            .map(|i| PacketBuffer {
                bus_addr: buffer_base + (i * BUFFER_SIZE) as u64,
                bytes: Box::new([0u8; BUFFER_SIZE]),
            })
            .collect::<Vec<_>>();
        Self { base, buffer_base, desc: alloc::vec![D::default(); count], buffers }
    }

    /// Bus address of descriptor 0.
    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.desc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.desc.is_empty()
    }

    /// Value programmed into the ring length register.
    pub fn byte_len(&self) -> u32 {
        (self.desc.len() * crate::desc::DESC_SIZE) as u32
    }

    pub fn desc(&self, index: usize) -> &D {
        &self.desc[index % self.desc.len()]
    }

    pub fn desc_mut(&mut self, index: usize) -> &mut D {
        let len = self.desc.len();
        &mut self.desc[index % len]
    }

    pub(crate) fn buffer(&self, index: usize) -> &PacketBuffer {
        &self.buffers[index % self.buffers.len()]
    }

    pub(crate) fn buffer_mut(&mut self, index: usize) -> &mut PacketBuffer {
        let len = self.buffers.len();
        &mut self.buffers[index % len]
    }

    /// Resolves a bus address written into a descriptor back to its buffer.
    pub(crate) fn buffer_at(&mut self, bus_addr: u64) -> Option<&mut PacketBuffer> {
        let offset = bus_addr.checked_sub(self.buffer_base)?;
        if offset % BUFFER_SIZE as u64 != 0 {
            return None;
        }
        self.buffers.get_mut((offset / BUFFER_SIZE as u64) as usize)
    }

    pub(crate) fn next(&self, index: usize) -> usize {
        (index + 1) % self.desc.len()
    }
}
