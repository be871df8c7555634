// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), no_std)]

//! CONTEXT: 8254x-style (e1000) polled descriptor-ring NIC driver
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: unit tests + tests/basic.rs (register programming, ring full/empty, wraparound)
//!
//! PUBLIC API:
//! - `E1000`: attach + `try_transmit` / `try_receive`
//! - `DeviceModel`: device side of the rings (consumes TX, produces RX)
//!
//! INVARIANTS:
//! - Software owns the tail registers, the device owns the heads.
//! - A descriptor is recycled by software only once its DD bit is set.
//! - Rings and buffers are sized at attach and never reallocated.
//! - The driver never blocks or retries; QueueFull/QueueEmpty go back to the caller.

extern crate alloc;

pub mod desc;
pub mod model;
pub mod regs;
pub mod ring;

use core::fmt;

use axon_hal::{Bus, DmaBuffer, RegisterFile};

use desc::{DescStatus, Descriptor, RxDesc, TxCmd, TxDesc};
use regs::{Rctl, Status, Tctl};
use ring::{Ring, BUFFER_SIZE};

pub use model::{DeviceModel, RxDrop};

/// Largest frame accepted for transmission.
pub const MAX_FRAME_LEN: usize = 1518;
/// Default transmit ring size.
pub const DEFAULT_TX_DESCRIPTORS: usize = 64;
/// Default receive ring size.
pub const DEFAULT_RX_DESCRIPTORS: usize = 128;
/// Upper bound for either ring.
pub const MAX_DESCRIPTORS: usize = 4096;

// Bus addresses of the rings and buffer pools.
const TX_RING_BUS: u64 = 0x0010_0000;
const RX_RING_BUS: u64 = 0x0011_0000;
const TX_BUF_BUS: u64 = 0x0020_0000;
const RX_BUF_BUS: u64 = 0x0080_0000;

/// MAC address QEMU assigns to its default e1000.
pub const DEFAULT_MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];

/// Driver errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NicError {
    /// Device does not report link up at attach.
    LinkDown,
    /// Ring size is zero, above [`MAX_DESCRIPTORS`] or not a multiple of 8.
    BadRingSize,
    /// Frame is larger than [`MAX_FRAME_LEN`].
    FrameTooLarge { len: usize },
    /// No recyclable transmit descriptor.
    QueueFull,
    /// No completed receive descriptor.
    QueueEmpty,
    /// Caller buffer cannot hold the pending frame of `len` bytes; nothing was consumed.
    BufferTooSmall { len: usize },
}

impl fmt::Display for NicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Ring sizing and station address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NicConfig {
    pub tx_descriptors: usize,
    pub rx_descriptors: usize,
    pub mac: [u8; 6],
}

impl Default for NicConfig {
    fn default() -> Self {
        Self {
            tx_descriptors: DEFAULT_TX_DESCRIPTORS,
            rx_descriptors: DEFAULT_RX_DESCRIPTORS,
            mac: DEFAULT_MAC,
        }
    }
}

impl NicConfig {
    pub fn validate(&self) -> Result<(), NicError> {
        let ok = |n: usize| n != 0 && n <= MAX_DESCRIPTORS && n % 8 == 0;
        if ok(self.tx_descriptors) && ok(self.rx_descriptors) {
            Ok(())
        } else {
            Err(NicError::BadRingSize)
        }
    }
}

/// Packet counters kept by the driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NicStats {
    pub tx_queued: u64,
    pub tx_full: u64,
    pub rx_delivered: u64,
    pub rx_empty: u64,
}

/// Polled e1000 driver.
pub struct E1000<B: Bus> {
    bus: B,
    tx: Ring<TxDesc>,
    rx: Ring<RxDesc>,
    mac: [u8; 6],
    stats: NicStats,
}

impl E1000<RegisterFile> {
    /// Attaches to an in-memory register window that reports link up.
    pub fn simulated(config: NicConfig) -> Result<Self, NicError> {
        let regs = RegisterFile::new(regs::REG_WINDOW);
        regs.poke(regs::STATUS, regs::STATUS_RESET_VALUE);
        Self::attach(regs, config)
    }
}

impl<B: Bus> E1000<B> {
    /// Checks the link and programs both rings.
    pub fn attach(bus: B, config: NicConfig) -> Result<Self, NicError> {
        config.validate()?;
        let status = Status::from_bits_truncate(bus.read(regs::STATUS));
        if !status.contains(Status::LINK_UP) {
            return Err(NicError::LinkDown);
        }
        let mut nic = Self {
            bus,
            tx: Ring::new(TX_RING_BUS, TX_BUF_BUS, config.tx_descriptors),
            rx: Ring::new(RX_RING_BUS, RX_BUF_BUS, config.rx_descriptors),
            mac: config.mac,
            stats: NicStats::default(),
        };
        nic.init_tx();
        nic.init_rx();
        Ok(nic)
    }

    fn init_tx(&mut self) {
        for i in 0..self.tx.len() {
            let addr = self.tx.buffer(i).bus_addr();
            let desc = self.tx.desc_mut(i);
            *desc = TxDesc { addr, cmd: (TxCmd::RS | TxCmd::EOP).bits(), ..TxDesc::default() };
            // Every descriptor starts out recyclable.
            desc.set_status(DescStatus::DD);
        }
        write_base(&self.bus, regs::TDBAL, regs::TDBAH, self.tx.base());
        self.bus.write(regs::TDLEN, self.tx.byte_len());
        self.bus.write(regs::TDH, 0);
        self.bus.write(regs::TDT, 0);
        self.bus.write(regs::TCTL, Tctl::full_duplex().bits());
        self.bus.write(regs::TIPG, regs::TIPG_DEFAULT);
    }

    fn init_rx(&mut self) {
        let mac = self.mac;
        self.bus.write(regs::RAL0, u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]]));
        self.bus.write(regs::RAH0, u32::from(u16::from_le_bytes([mac[4], mac[5]])) | regs::RAH_AV);
        for i in 0..regs::MTA_LEN {
            self.bus.write(regs::MTA + 4 * i, 0);
        }
        for i in 0..self.rx.len() {
            let addr = self.rx.buffer(i).bus_addr();
            *self.rx.desc_mut(i) = RxDesc { addr, ..RxDesc::default() };
        }
        write_base(&self.bus, regs::RDBAL, regs::RDBAH, self.rx.base());
        self.bus.write(regs::RDLEN, self.rx.byte_len());
        self.bus.write(regs::RDH, 0);
        // The device may fill everything up to, not including, the tail.
        self.bus.write(regs::RDT, (self.rx.len() - 1) as u32);
        self.bus.write(regs::RCTL, (Rctl::EN | Rctl::BAM | Rctl::SECRC).bits());
    }

    /// Queues `frame` on the descriptor at the transmit tail.
    pub fn try_transmit(&mut self, frame: &[u8]) -> Result<(), NicError> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(NicError::FrameTooLarge { len: frame.len() });
        }
        let tail = self.bus.read(regs::TDT) as usize % self.tx.len();
        if !self.tx.desc(tail).is_done() {
            self.stats.tx_full += 1;
            return Err(NicError::QueueFull);
        }
        self.tx.buffer_mut(tail).as_mut_slice()[..frame.len()].copy_from_slice(frame);
        let desc = self.tx.desc_mut(tail);
        desc.length = frame.len() as u16;
        desc.cmd = (TxCmd::RS | TxCmd::EOP).bits();
        desc.set_status(DescStatus::empty());
        self.bus.write(regs::TDT, self.tx.next(tail) as u32);
        self.stats.tx_queued += 1;
        Ok(())
    }

    /// Copies the next received frame into `buf` and returns its length.
    ///
    /// When `buf` is too short the descriptor stays with software and the
    /// error carries the real frame length.
    pub fn try_receive(&mut self, buf: &mut [u8]) -> Result<usize, NicError> {
        let index = self.rx.next(self.bus.read(regs::RDT) as usize % self.rx.len());
        let desc = *self.rx.desc(index);
        if !desc.is_done() {
            self.stats.rx_empty += 1;
            return Err(NicError::QueueEmpty);
        }
        let len = desc.length as usize;
        if len > buf.len() {
            return Err(NicError::BufferTooSmall { len });
        }
        buf[..len].copy_from_slice(&self.rx.buffer(index).as_slice()[..len]);
        self.rx.desc_mut(index).set_status(DescStatus::empty());
        self.bus.write(regs::RDT, index as u32);
        self.stats.rx_delivered += 1;
        Ok(len)
    }

    /// Device side of the rings.
    pub fn device(&mut self) -> DeviceModel<'_, B> {
        DeviceModel::new(&self.bus, &mut self.tx, &mut self.rx)
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn mac(&self) -> [u8; 6] {
        self.mac
    }

    pub fn tx_capacity(&self) -> usize {
        self.tx.len()
    }

    pub fn rx_capacity(&self) -> usize {
        self.rx.len()
    }

    pub fn stats(&self) -> NicStats {
        self.stats
    }

    /// Frames dropped by the device because the receive ring was exhausted.
    pub fn missed_packets(&self) -> u32 {
        self.bus.read(regs::MPC)
    }

    /// Transmit descriptor at `index`, for diagnostics.
    pub fn tx_desc(&self, index: usize) -> TxDesc {
        *self.tx.desc(index)
    }
}

fn write_base<B: Bus>(bus: &B, lo: usize, hi: usize, addr: u64) {
    bus.write(lo, addr as u32);
    bus.write(hi, (addr >> 32) as u32);
}

/// Largest frame a single receive buffer can hold.
pub const RX_BUFFER_SIZE: usize = BUFFER_SIZE;
