// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), no_std)]

//! Register access and DMA buffer traits shared by drivers.

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec;
use core::cell::Cell;

/// Basic bus access trait shared by drivers.
///
/// Addresses are byte offsets into the device's register window.
pub trait Bus {
    fn read(&self, addr: usize) -> u32;
    fn write(&self, addr: usize, value: u32);
}

impl<B: Bus + ?Sized> Bus for &B {
    fn read(&self, addr: usize) -> u32 {
        (**self).read(addr)
    }

    fn write(&self, addr: usize, value: u32) {
        (**self).write(addr, value)
    }
}

/// Fixed DMA buffer visible to a device at a bus address.
pub trait DmaBuffer {
    /// Address the device uses to reach the buffer.
    fn bus_addr(&self) -> u64;
    fn as_slice(&self) -> &[u8];
    fn as_mut_slice(&mut self) -> &mut [u8];

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory register window of 32-bit registers.
///
/// Stands in for an MMIO region: the driver side goes through [`Bus`],
/// the device model uses [`RegisterFile::peek`]/[`RegisterFile::poke`].
/// Accesses outside the window read as zero and drop writes, like an
/// unclaimed bus address.
pub struct RegisterFile {
    regs: Box<[Cell<u32>]>,
}

impl RegisterFile {
    /// Creates a zeroed window spanning `bytes` bytes.
    pub fn new(bytes: usize) -> Self {
        Self { regs: vec![Cell::new(0); bytes / 4].into_boxed_slice() }
    }

    /// Size of the window in bytes.
    pub fn span(&self) -> usize {
        self.regs.len() * 4
    }

    /// Device-side read.
    pub fn peek(&self, addr: usize) -> u32 {
        self.slot(addr).map_or(0, Cell::get)
    }

    /// Device-side write.
    pub fn poke(&self, addr: usize, value: u32) {
        if let Some(cell) = self.slot(addr) {
            cell.set(value);
        }
    }

    fn slot(&self, addr: usize) -> Option<&Cell<u32>> {
        if addr % 4 != 0 {
            return None;
        }
        self.regs.get(addr / 4)
    }
}

impl Bus for RegisterFile {
    fn read(&self, addr: usize) -> u32 {
        self.peek(addr)
    }

    fn write(&self, addr: usize, value: u32) {
        self.poke(addr, value)
    }
}
