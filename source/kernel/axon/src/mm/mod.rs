// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Memory management: frame registry, page tables, address spaces, mapping service
//! OWNERS: @kernel-mm-team
//! PUBLIC API: FrameTable, AddressSpace, AddressSpaceView{,Mut}, Kernel::{page_alloc,page_map,page_unmap,page_share_cow}
//! DEPENDS_ON: axon-abi (Perm, layout), task (authority checks)
//! INVARIANTS: Permission words from user code are validated by `Perm::from_user`; no mapping
//!   escalates a read-only, non-COW page to writable or copy-on-write.

pub mod address_space;
pub mod frame;
mod map;
pub mod page_table;
pub mod view;

#[cfg(test)]
mod tests_prop;

pub(crate) use map::check_grant;
pub use address_space::{AddressSpace, Mapping, MappingDump};
pub use frame::{FrameId, FrameTable};
pub use view::{AddressSpaceView, AddressSpaceViewMut, PageFault};
