// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Checked address newtypes decoded from syscall registers.

use axon_abi::layout::{is_page_aligned, is_user_page, PAGE_SIZE, UTOP};

/// Page-aligned virtual address below `UTOP`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserPage(usize);

impl UserPage {
    /// Returns `None` when `va` is misaligned or outside user space.
    pub const fn new(va: usize) -> Option<Self> {
        if is_user_page(va) {
            Some(Self(va))
        } else {
            None
        }
    }

    pub const fn addr(self) -> usize {
        self.0
    }

    /// Following page, if still below `UTOP`.
    pub const fn next(self) -> Option<Self> {
        Self::new(self.0 + PAGE_SIZE)
    }
}

/// Address argument that may opt out of a page transfer.
///
/// Values at or above `UTOP` mean "no page"; values below must be page aligned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageArg {
    None,
    Page(UserPage),
}

impl PageArg {
    pub const fn decode(raw: usize) -> Option<Self> {
        if raw >= UTOP {
            return Some(Self::None);
        }
        if !is_page_aligned(raw) {
            return None;
        }
        Some(Self::Page(UserPage(raw)))
    }

    pub const fn page(self) -> Option<UserPage> {
        match self {
            Self::None => None,
            Self::Page(page) => Some(page),
        }
    }
}
