// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Copy-on-write fork and its page-fault handler
//! OWNERS: @runtime
//! PUBLIC API: fork, set_pgfault_handler, pgfault, PGFAULT_UPCALL
//! DEPENDS_ON: sys::Sys (page_share_cow, page_map, page_alloc)
//! INVARIANTS:
//! - After fork no process keeps write access to a frame another process maps.
//! - The exception stack is private to each process and never copy-on-write.
//! - The handler only resolves write faults on copy-on-write pages; anything else is fatal.

extern crate alloc;

use alloc::vec;

use axon_abi::layout::{page_round_down, PAGE_SIZE, PFTEMP, UTEXT, UXSTACK};
use axon_abi::trapframe::UTrapFrame;
use axon_abi::{EnvId, EnvStatus, FaultCode, Perm};

use crate::error::{Result, RtError};
use crate::sys::Sys;

/// Fault handler run on the exception stack.
pub type FaultHandler = fn(&mut Sys<'_>, &UTrapFrame) -> Result<()>;

/// Entry address registered as the page-fault upcall.
pub const PGFAULT_UPCALL: usize = UTEXT + 0x40;

/// Handler behind an upcall entry address.
pub(crate) fn upcall_handler(entry: usize) -> Option<FaultHandler> {
    match entry {
        PGFAULT_UPCALL => Some(pgfault),
        _ => None,
    }
}

/// Installs the copy-on-write handler for the running process.
///
/// Allocates the exception stack on first use; later calls only re-register
/// the entry point.
pub fn set_pgfault_handler(sys: &mut Sys<'_>) -> Result<()> {
    if sys.thisenv()?.pgfault_upcall.is_none() {
        sys.page_alloc(EnvId::CURRENT, UXSTACK, Perm::RW)?;
    }
    sys.env_set_pgfault_upcall(EnvId::CURRENT, PGFAULT_UPCALL)
}

/// Duplicates the running process.
///
/// Returns the child's handle; the child is runnable and its saved return
/// register holds 0. Writable pages end up copy-on-write in both processes,
/// read-only pages are shared as they are.
pub fn fork(sys: &mut Sys<'_>) -> Result<EnvId> {
    set_pgfault_handler(sys)?;
    let child = sys.exofork()?;
    if let Err(err) = populate(sys, child) {
        log::warn!("fork of {} failed: {}", child, err);
        if let Err(cleanup) = sys.env_destroy(child) {
            log::error!("could not reclaim half-built child {}: {}", child, cleanup);
        }
        return Err(err);
    }
    log::debug!("env {} forked {}", sys.id(), child);
    Ok(child)
}

fn populate(sys: &mut Sys<'_>, child: EnvId) -> Result<()> {
    sys.env_set_pgfault_upcall(child, PGFAULT_UPCALL)?;
    sys.page_alloc(child, UXSTACK, Perm::RW)?;
    for (page, perm) in sys.mappings()? {
        let va = page.addr();
        if va == UXSTACK {
            continue;
        }
        if perm.is_write_eligible() {
            sys.page_share_cow(EnvId::CURRENT, va, child, va)?;
        } else {
            sys.page_map(EnvId::CURRENT, va, child, va, perm & (Perm::REQUIRED | Perm::AVAIL))?;
        }
    }
    sys.env_set_status(child, EnvStatus::Runnable)
}

/// Gives the faulting process a private writable copy of a copy-on-write page.
pub fn pgfault(sys: &mut Sys<'_>, frame: &UTrapFrame) -> Result<()> {
    let va = frame.fault_va as usize;
    let code = FaultCode::from_bits_truncate(frame.err);
    if !code.contains(FaultCode::WRITE) {
        return Err(RtError::Fault { va });
    }
    let page = page_round_down(va);
    match sys.query(page)? {
        Some(perm) if perm.contains(Perm::COW) => {}
        _ => return Err(RtError::Fault { va }),
    }

    sys.page_alloc(EnvId::CURRENT, PFTEMP, Perm::RW)?;
    let mut copy = vec![0u8; PAGE_SIZE];
    sys.peek(page, &mut copy)?;
    sys.poke(PFTEMP, &copy)?;
    sys.page_map(EnvId::CURRENT, PFTEMP, EnvId::CURRENT, page, Perm::RW)?;
    sys.page_unmap(EnvId::CURRENT, PFTEMP)
}
