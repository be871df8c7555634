// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Register-level model of the device side of both rings.
//!
//! Transmit walks from TDH over every descriptor software has handed over
//! (DD clear), so a completely filled ring where TDT has caught up with TDH
//! still drains. Receive fills RDH while RDH != RDT. Ring bases and lengths
//! are taken from the registers, so an unprogrammed device does nothing.

extern crate alloc;

use alloc::vec::Vec;

use axon_hal::{Bus, DmaBuffer};

use crate::desc::{DescStatus, Descriptor, RxDesc, TxDesc, DESC_SIZE};
use crate::regs::{self, Rctl, Tctl};
use crate::ring::{Ring, BUFFER_SIZE};
use crate::MAX_FRAME_LEN;

/// Reasons the device drops an incoming frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RxDrop {
    /// Receiver not enabled or ring not programmed.
    Disabled,
    /// Frame exceeds the Ethernet maximum.
    Oversize,
    /// No descriptor owned by the device; counted in MPC.
    RingFull,
}

/// Device view over the driver's rings.
pub struct DeviceModel<'a, B: Bus> {
    bus: &'a B,
    tx: &'a mut Ring<TxDesc>,
    rx: &'a mut Ring<RxDesc>,
}

impl<'a, B: Bus> DeviceModel<'a, B> {
    pub(crate) fn new(bus: &'a B, tx: &'a mut Ring<TxDesc>, rx: &'a mut Ring<RxDesc>) -> Self {
        Self { bus, tx, rx }
    }

    fn ring_programmed(&self, bal: usize, bah: usize, len: usize, base: u64, count: usize) -> bool {
        let programmed = u64::from(self.bus.read(bal)) | (u64::from(self.bus.read(bah)) << 32);
        programmed == base && self.bus.read(len) as usize == count * DESC_SIZE
    }

    /// Descriptors queued by software but not yet consumed.
    pub fn pending_tx(&self) -> usize {
        (0..self.tx.len()).filter(|&i| !self.tx.desc(i).is_done()).count()
    }

    /// Consumes up to `budget` transmit descriptors and returns their frames.
    pub fn complete_tx(&mut self, budget: usize) -> Vec<Vec<u8>> {
        let mut sent = Vec::new();
        let tctl = Tctl::from_bits_truncate(self.bus.read(regs::TCTL));
        if !tctl.contains(Tctl::EN)
            || !self.ring_programmed(regs::TDBAL, regs::TDBAH, regs::TDLEN, self.tx.base(), self.tx.len())
        {
            return sent;
        }
        let mut head = self.bus.read(regs::TDH) as usize % self.tx.len();
        while sent.len() < budget {
            let desc = *self.tx.desc(head);
            if desc.is_done() {
                break;
            }
            let len = (desc.length as usize).min(BUFFER_SIZE);
            if let Some(buf) = self.tx.buffer_at(desc.addr) {
                sent.push(buf.as_slice()[..len].to_vec());
            }
            // The driver always requests status (RS), so every descriptor reports back.
            self.tx.desc_mut(head).set_status(DescStatus::DD);
            head = self.tx.next(head);
            self.bus.write(regs::TDH, head as u32);
        }
        sent
    }

    /// DMA-writes `frame` into the descriptor at the receive head.
    pub fn deliver_rx(&mut self, frame: &[u8]) -> Result<(), RxDrop> {
        let rctl = Rctl::from_bits_truncate(self.bus.read(regs::RCTL));
        if !rctl.contains(Rctl::EN)
            || !self.ring_programmed(regs::RDBAL, regs::RDBAH, regs::RDLEN, self.rx.base(), self.rx.len())
        {
            return Err(RxDrop::Disabled);
        }
        if frame.len() > MAX_FRAME_LEN {
            return Err(RxDrop::Oversize);
        }
        let head = self.bus.read(regs::RDH) as usize % self.rx.len();
        let tail = self.bus.read(regs::RDT) as usize % self.rx.len();
        if head == tail {
            let missed = self.bus.read(regs::MPC);
            self.bus.write(regs::MPC, missed.wrapping_add(1));
            return Err(RxDrop::RingFull);
        }
        let addr = self.rx.desc(head).buffer_addr();
        let Some(buf) = self.rx.buffer_at(addr) else {
            return Err(RxDrop::Disabled);
        };
        buf.as_mut_slice()[..frame.len()].copy_from_slice(frame);
        let desc = self.rx.desc_mut(head);
        desc.length = frame.len() as u16;
        desc.errors = 0;
        desc.set_status(DescStatus::DD | DescStatus::EOP);
        self.bus.write(regs::RDH, self.rx.next(head) as u32);
        Ok(())
    }

    /// Transmits up to `budget` frames and feeds each back into the receive ring.
    ///
    /// Returns the number of frames looped back; frames the receive side
    /// drops are still consumed from the transmit ring.
    pub fn loopback(&mut self, budget: usize) -> usize {
        let frames = self.complete_tx(budget);
        frames.iter().filter(|frame| self.deliver_rx(frame).is_ok()).count()
    }
}
