// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Register offsets (bytes) and control bits of the 8254x register window.

use bitflags::bitflags;

/// Size of the register window.
pub const REG_WINDOW: usize = 0x2_0000;

pub const STATUS: usize = 0x0008;
pub const RCTL: usize = 0x0100;
pub const TCTL: usize = 0x0400;
pub const TIPG: usize = 0x0410;
pub const RDBAL: usize = 0x2800;
pub const RDBAH: usize = 0x2804;
pub const RDLEN: usize = 0x2808;
pub const RDH: usize = 0x2810;
pub const RDT: usize = 0x2818;
pub const TDBAL: usize = 0x3800;
pub const TDBAH: usize = 0x3804;
pub const TDLEN: usize = 0x3808;
pub const TDH: usize = 0x3810;
pub const TDT: usize = 0x3818;
/// Missed packets count (receive ring exhausted).
pub const MPC: usize = 0x4010;
/// Multicast table array, 128 registers.
pub const MTA: usize = 0x5200;
pub const MTA_LEN: usize = 128;
/// Receive address low/high, entry 0.
pub const RAL0: usize = 0x5400;
pub const RAH0: usize = 0x5404;
/// Address-valid bit in RAH.
pub const RAH_AV: u32 = 1 << 31;

/// Status value reported by a link-up, full-duplex 1000 Mb/s device after reset.
pub const STATUS_RESET_VALUE: u32 = 0x8008_0783;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Status: u32 {
        const FULL_DUPLEX = 1 << 0;
        const LINK_UP = 1 << 1;
    }
}

bitflags! {
    /// Transmit control.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Tctl: u32 {
        const EN = 1 << 1;
        /// Pad short packets.
        const PSP = 1 << 3;
        const CT = 0xff << 4;
        const COLD = 0x3ff << 12;
    }
}

impl Tctl {
    /// Enabled, padding, collision threshold 0x10, full-duplex collision distance 0x40.
    pub fn full_duplex() -> Self {
        Self::EN | Self::PSP | Self::from_bits_retain(0x10 << 4) | Self::from_bits_retain(0x40 << 12)
    }
}

/// Inter-packet gap values for IEEE 802.3 (IPGT 10, IPGR1 4, IPGR2 6).
pub const TIPG_DEFAULT: u32 = 10 | (4 << 10) | (6 << 20);

bitflags! {
    /// Receive control.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Rctl: u32 {
        const EN = 1 << 1;
        /// Long packet enable; left clear so frames over 1522 bytes are dropped.
        const LPE = 1 << 5;
        /// Loopback mode bits; left clear for normal operation.
        const LBM = 0x3 << 6;
        /// Broadcast accept.
        const BAM = 1 << 15;
        /// Buffer size bits; zero selects 2048-byte buffers.
        const BSIZE = 0x3 << 16;
        /// Strip Ethernet CRC.
        const SECRC = 1 << 26;
    }
}
