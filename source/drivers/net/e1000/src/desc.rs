// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Legacy transmit/receive descriptor layouts.

use bitflags::bitflags;
use static_assertions::const_assert_eq;

bitflags! {
    /// Transmit command bits.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct TxCmd: u8 {
        /// End of packet.
        const EOP = 0x01;
        /// Report status: device sets DD once the descriptor is consumed.
        const RS = 0x08;
    }
}

bitflags! {
    /// Descriptor status bits shared by both rings.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct DescStatus: u8 {
        /// Descriptor done.
        const DD = 0x01;
        /// End of packet (receive).
        const EOP = 0x02;
    }
}

/// Legacy transmit descriptor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct TxDesc {
    pub addr: u64,
    pub length: u16,
    pub cso: u8,
    pub cmd: u8,
    pub status: u8,
    pub css: u8,
    pub special: u16,
}

/// Legacy receive descriptor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct RxDesc {
    pub addr: u64,
    pub length: u16,
    pub checksum: u16,
    pub status: u8,
    pub errors: u8,
    pub special: u16,
}

/// Bytes per descriptor; ring length registers count bytes.
pub const DESC_SIZE: usize = 16;

const_assert_eq!(core::mem::size_of::<TxDesc>(), DESC_SIZE);
const_assert_eq!(core::mem::size_of::<RxDesc>(), DESC_SIZE);

/// Access to the done flag common to both descriptor kinds.
pub trait Descriptor: Copy + Default {
    fn buffer_addr(&self) -> u64;
    fn status(&self) -> DescStatus;
    fn set_status(&mut self, status: DescStatus);

    fn is_done(&self) -> bool {
        self.status().contains(DescStatus::DD)
    }
}

impl TxDesc {
    pub fn command(&self) -> TxCmd {
        TxCmd::from_bits_truncate(self.cmd)
    }
}

impl Descriptor for TxDesc {
    fn buffer_addr(&self) -> u64 {
        self.addr
    }

    fn status(&self) -> DescStatus {
        DescStatus::from_bits_truncate(self.status)
    }

    fn set_status(&mut self, status: DescStatus) {
        self.status = status.bits();
    }
}

impl Descriptor for RxDesc {
    fn buffer_addr(&self) -> u64 {
        self.addr
    }

    fn status(&self) -> DescStatus {
        DescStatus::from_bits_truncate(self.status)
    }

    fn set_status(&mut self, status: DescStatus) {
        self.status = status.bits();
    }
}
