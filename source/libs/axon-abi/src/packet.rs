// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Packet page contract between the packet loops and the protocol engine.
//!
//! A packet travels in a single page: a little-endian `u32` length followed
//! by the raw Ethernet frame bytes.

use crate::layout::PAGE_SIZE;

/// Largest Ethernet frame carried through the rings.
pub const MAX_FRAME_LEN: usize = 1518;
/// Bytes occupied by the length header.
pub const PACKET_HEADER_LEN: usize = 4;
/// Room for frame bytes after the header.
pub const PACKET_DATA_CAPACITY: usize = PAGE_SIZE - PACKET_HEADER_LEN;

/// IPC request values exchanged with the protocol engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum NetRequest {
    /// Received frame handed from the input loop to the engine.
    Input = 10,
    /// Frame handed from the engine to the output loop for transmission.
    Output = 11,
}

impl NetRequest {
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            10 => Some(Self::Input),
            11 => Some(Self::Output),
            _ => None,
        }
    }
}

/// Header at offset 0 of a packet page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacketHeader {
    pub len: u32,
}

impl PacketHeader {
    pub const fn new(len: u32) -> Self {
        Self { len }
    }

    pub fn to_le_bytes(self) -> [u8; PACKET_HEADER_LEN] {
        self.len.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; PACKET_HEADER_LEN]) -> Self {
        Self { len: u32::from_le_bytes(bytes) }
    }

    /// Frame length, if it fits an Ethernet frame.
    pub fn frame_len(self) -> Option<usize> {
        let len = self.len as usize;
        (len <= MAX_FRAME_LEN).then_some(len)
    }
}
