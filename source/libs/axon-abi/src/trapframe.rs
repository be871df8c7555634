// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Frame the kernel pushes on the user exception stack before entering
//! the page-fault upcall.

use static_assertions::const_assert_eq;

/// Number of general-purpose registers saved per frame.
pub const GP_REGS: usize = 8;
/// Index of the register carrying syscall return values.
pub const REG_RET: usize = 7;

/// User-visible fault frame, little-endian on the exception stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct UTrapFrame {
    pub fault_va: u32,
    pub err: u32,
    pub regs: [u32; GP_REGS],
    pub pc: u32,
    pub flags: u32,
    pub sp: u32,
}

const_assert_eq!(core::mem::size_of::<UTrapFrame>(), UTrapFrame::SIZE);

impl UTrapFrame {
    pub const SIZE: usize = 52;

    pub fn to_le_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        let words = self.words();
        for (chunk, word) in out.chunks_exact_mut(4).zip(words.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    pub fn from_le_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut words = [0u32; Self::SIZE / 4];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        let mut regs = [0u32; GP_REGS];
        regs.copy_from_slice(&words[2..2 + GP_REGS]);
        Self {
            fault_va: words[0],
            err: words[1],
            regs,
            pc: words[10],
            flags: words[11],
            sp: words[12],
        }
    }

    fn words(&self) -> [u32; Self::SIZE / 4] {
        let mut words = [0u32; Self::SIZE / 4];
        words[0] = self.fault_va;
        words[1] = self.err;
        words[2..2 + GP_REGS].copy_from_slice(&self.regs);
        words[10] = self.pc;
        words[11] = self.flags;
        words[12] = self.sp;
        words
    }
}
