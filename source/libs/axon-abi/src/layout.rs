// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! User virtual memory layout.
//!
//! ```text
//!  UTOP, UXSTACKTOP ->  +------------------------+ 0xeec0_0000
//!                       | user exception stack   | one page, never shared
//!                       +------------------------+
//!                       | guard                  |
//!  USTACKTOP        ->  +------------------------+
//!                       | normal user stack      |
//!                       |          ...           |
//!  UTEXT            ->  +------------------------+ 0x0080_0000
//!  PFTEMP           ->  | fault-handler scratch  | 0x007f_f000
//!  UTEMP            ->  +------------------------+ 0x0040_0000
//! ```

/// Size of a page in bytes.
pub const PAGE_SIZE: usize = 4096;
pub const PAGE_SHIFT: u32 = 12;
/// Entries per page-table level.
pub const PT_ENTRIES: usize = 1024;
/// Bytes mapped by one leaf page table.
pub const PT_SPAN: usize = PAGE_SIZE * PT_ENTRIES;

/// Ceiling of the user-controlled part of the address space.
pub const UTOP: usize = 0xeec0_0000;
/// Top of the one-page user exception stack.
pub const UXSTACKTOP: usize = UTOP;
/// Base of the user exception stack page.
pub const UXSTACK: usize = UXSTACKTOP - PAGE_SIZE;
/// Top of the normal user stack (one guard page below the exception stack).
pub const USTACKTOP: usize = UTOP - 2 * PAGE_SIZE;
/// Start of program text.
pub const UTEXT: usize = 2 * PT_SPAN;
/// Temporary user mappings.
pub const UTEMP: usize = PT_SPAN;
/// Scratch page used by the copy-on-write fault handler.
pub const PFTEMP: usize = UTEMP + PT_SPAN - PAGE_SIZE;

pub const fn is_page_aligned(va: usize) -> bool {
    va & (PAGE_SIZE - 1) == 0
}

pub const fn page_round_down(va: usize) -> usize {
    va & !(PAGE_SIZE - 1)
}

/// True when `va` names a page the user may map: aligned and below [`UTOP`].
pub const fn is_user_page(va: usize) -> bool {
    va < UTOP && is_page_aligned(va)
}
