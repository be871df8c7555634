// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Syscall handlers
//! OWNERS: @kernel-team
//! PUBLIC API: Context, sys_* handlers
//! INVARIANTS: Stable syscall IDs; Decode→Check→Execute pattern; permission words
//!   validated before any state changes

use axon_abi::{EnvId, EnvStatus, Perm, SysError};

use super::{Args, SysResult};
use crate::error::Error;
use crate::kernel::Kernel;
use crate::types::{PageArg, UserPage};

/// Kernel state plus the process that trapped.
pub struct Context<'a> {
    pub kernel: &'a mut Kernel,
    pub caller: EnvId,
}

impl<'a> Context<'a> {
    pub fn new(kernel: &'a mut Kernel, caller: EnvId) -> Self {
        Self { kernel, caller }
    }
}

// Typed decoders for seL4-style Decode→Check→Execute

fn decode_env(raw: usize) -> Result<EnvId, Error> {
    u32::try_from(raw).map(EnvId::from_raw).map_err(|_| SysError::BadTarget.into())
}

fn decode_page(raw: usize) -> Result<UserPage, Error> {
    UserPage::new(raw).ok_or_else(|| SysError::InvalidArgument.into())
}

fn decode_perm(raw: usize) -> Result<Perm, Error> {
    u32::try_from(raw)
        .ok()
        .and_then(Perm::from_user)
        .ok_or_else(|| SysError::InvalidArgument.into())
}

fn decode_page_arg(raw: usize) -> Result<PageArg, Error> {
    PageArg::decode(raw).ok_or_else(|| SysError::InvalidArgument.into())
}

#[derive(Copy, Clone)]
struct SetStatusArgsTyped {
    target: EnvId,
    status: EnvStatus,
}

impl SetStatusArgsTyped {
    #[inline]
    fn decode(args: &Args) -> Result<Self, Error> {
        let target = decode_env(args.get(0))?;
        let status = u32::try_from(args.get(1))
            .ok()
            .and_then(EnvStatus::from_raw)
            .ok_or(SysError::InvalidArgument)?;
        Ok(Self { target, status })
    }

    #[inline]
    fn check(&self) -> Result<(), Error> {
        match self.status {
            EnvStatus::Runnable | EnvStatus::NotRunnable => Ok(()),
            _ => Err(SysError::InvalidArgument.into()),
        }
    }
}

#[derive(Copy, Clone)]
struct PageAllocArgsTyped {
    target: EnvId,
    page: UserPage,
    perm: Perm,
}

impl PageAllocArgsTyped {
    #[inline]
    fn decode(args: &Args) -> Result<Self, Error> {
        Ok(Self {
            target: decode_env(args.get(0))?,
            page: decode_page(args.get(1))?,
            perm: decode_perm(args.get(2))?,
        })
    }
}

#[derive(Copy, Clone)]
struct PageMapArgsTyped {
    src: EnvId,
    src_page: UserPage,
    dst: EnvId,
    dst_page: UserPage,
    perm: Perm,
}

impl PageMapArgsTyped {
    #[inline]
    fn decode(args: &Args) -> Result<Self, Error> {
        Ok(Self {
            src: decode_env(args.get(0))?,
            src_page: decode_page(args.get(1))?,
            dst: decode_env(args.get(2))?,
            dst_page: decode_page(args.get(3))?,
            perm: decode_perm(args.get(4))?,
        })
    }
}

#[derive(Copy, Clone)]
struct TrySendArgsTyped {
    target: EnvId,
    value: u32,
    src: PageArg,
    perm: Perm,
}

impl TrySendArgsTyped {
    #[inline]
    fn decode(args: &Args) -> Result<Self, Error> {
        let target = decode_env(args.get(0))?;
        let value = args.get(1) as u32;
        let src = decode_page_arg(args.get(2))?;
        // The permission word only matters when a page travels.
        let perm = match src {
            PageArg::None => Perm::empty(),
            PageArg::Page(_) => decode_perm(args.get(3))?,
        };
        Ok(Self { target, value, src, perm })
    }
}

#[derive(Copy, Clone)]
struct TransmitArgsTyped {
    va: usize,
    len: usize,
}

impl TransmitArgsTyped {
    #[inline]
    fn decode(args: &Args) -> Result<Self, Error> {
        Ok(Self { va: args.get(0), len: args.get(1) })
    }

    #[inline]
    fn check(&self) -> Result<(), Error> {
        if self.len > axon_abi::packet::MAX_FRAME_LEN {
            return Err(SysError::InvalidArgument.into());
        }
        Ok(())
    }
}

pub fn sys_getenvid(ctx: &mut Context<'_>, _args: &Args) -> SysResult<usize> {
    Ok(ctx.kernel.getenvid(ctx.caller)?.to_raw() as usize)
}

pub fn sys_yield(ctx: &mut Context<'_>, _args: &Args) -> SysResult<usize> {
    ctx.kernel.yield_now(ctx.caller);
    Ok(0)
}

pub fn sys_env_destroy(ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
    let target = decode_env(args.get(0))?;
    ctx.kernel.env_destroy(ctx.caller, target)?;
    Ok(0)
}

pub fn sys_exofork(ctx: &mut Context<'_>, _args: &Args) -> SysResult<usize> {
    Ok(ctx.kernel.exofork(ctx.caller)?.to_raw() as usize)
}

pub fn sys_env_set_status(ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
    let typed = SetStatusArgsTyped::decode(args)?;
    typed.check()?;
    ctx.kernel.env_set_status(ctx.caller, typed.target, typed.status)?;
    Ok(0)
}

pub fn sys_env_set_pgfault_upcall(ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
    let target = decode_env(args.get(0))?;
    ctx.kernel.env_set_pgfault_upcall(ctx.caller, target, args.get(1))?;
    Ok(0)
}

pub fn sys_page_alloc(ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
    let typed = PageAllocArgsTyped::decode(args)?;
    ctx.kernel.page_alloc(ctx.caller, typed.target, typed.page, typed.perm)?;
    Ok(0)
}

pub fn sys_page_map(ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
    let typed = PageMapArgsTyped::decode(args)?;
    ctx.kernel.page_map(ctx.caller, typed.src, typed.src_page, typed.dst, typed.dst_page, typed.perm)?;
    Ok(0)
}

pub fn sys_page_unmap(ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
    let target = decode_env(args.get(0))?;
    let page = decode_page(args.get(1))?;
    ctx.kernel.page_unmap(ctx.caller, target, page)?;
    Ok(0)
}

pub fn sys_page_share_cow(ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
    let src = decode_env(args.get(0))?;
    let src_page = decode_page(args.get(1))?;
    let dst = decode_env(args.get(2))?;
    let dst_page = decode_page(args.get(3))?;
    ctx.kernel.page_share_cow(ctx.caller, src, src_page, dst, dst_page)?;
    Ok(0)
}

pub fn sys_ipc_try_send(ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
    let typed = TrySendArgsTyped::decode(args)?;
    ctx.kernel.ipc_try_send(ctx.caller, typed.target, typed.value, typed.src, typed.perm)?;
    Ok(0)
}

pub fn sys_ipc_recv(ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
    let dst = decode_page_arg(args.get(0))?;
    ctx.kernel.ipc_recv(ctx.caller, dst)?;
    Err(Error::Blocked)
}

pub fn sys_net_try_transmit(ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
    let typed = TransmitArgsTyped::decode(args)?;
    typed.check()?;
    ctx.kernel.net_try_transmit(ctx.caller, typed.va, typed.len)?;
    Ok(0)
}

pub fn sys_net_try_receive(ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
    ctx.kernel.net_try_receive(ctx.caller, args.get(0), args.get(1), args.get(2))?;
    Ok(0)
}
