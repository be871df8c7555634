// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Address-space mapping service.

use axon_abi::{EnvId, Perm, SysError};

use super::view::{AddressSpaceView, AddressSpaceViewMut};
use crate::error::KResult;
use crate::kernel::Kernel;
use crate::log_debug;
use crate::types::UserPage;

fn user_perm(perm: Perm) -> Result<Perm, SysError> {
    Perm::from_user(perm.bits()).ok_or(SysError::InvalidArgument)
}

/// A new mapping may be writable or copy-on-write only if the mapping it
/// shares is one of the two.
pub(crate) fn check_grant(source: Perm, requested: Perm) -> Result<(), SysError> {
    if requested.is_write_eligible() && !source.is_write_eligible() {
        return Err(SysError::InvalidArgument);
    }
    Ok(())
}

impl Kernel {
    /// Maps a zeroed frame at `page` in `target`, evicting any old mapping.
    pub fn page_alloc(&mut self, caller: EnvId, target: EnvId, page: UserPage, perm: Perm) -> KResult<()> {
        let perm = user_perm(perm)?;
        let id = self.envs.resolve(caller, target, true)?;
        self.map_fresh_page(id, page, perm)
    }

    pub(crate) fn map_fresh_page(&mut self, id: EnvId, page: UserPage, perm: Perm) -> KResult<()> {
        let env = self.envs.get_mut(id).ok_or(SysError::BadTarget)?;
        let frame = self.frames.alloc_zeroed()?;
        if let Err(err) = env.space.insert(&mut self.frames, page, frame, perm) {
            self.frames.release_unmapped(frame)?;
            return Err(err);
        }
        Ok(())
    }

    /// Maps the frame behind `src_page` in `src` at `dst_page` in `dst`.
    ///
    /// Write or copy-on-write access is granted only if the source mapping is
    /// writable or copy-on-write.
    pub fn page_map(
        &mut self,
        caller: EnvId,
        src: EnvId,
        src_page: UserPage,
        dst: EnvId,
        dst_page: UserPage,
        perm: Perm,
    ) -> KResult<()> {
        let perm = user_perm(perm)?;
        let src = self.envs.resolve(caller, src, true)?;
        let dst = self.envs.resolve(caller, dst, true)?;
        let mapping = self
            .envs
            .get(src)
            .and_then(|env| env.space.lookup(src_page))
            .ok_or(SysError::InvalidArgument)?;
        check_grant(mapping.perm, perm)?;
        let env = self.envs.get_mut(dst).ok_or(SysError::BadTarget)?;
        env.space.insert(&mut self.frames, dst_page, mapping.frame, perm)
    }

    /// Removes the mapping at `page`; succeeds when nothing is mapped.
    pub fn page_unmap(&mut self, caller: EnvId, target: EnvId, page: UserPage) -> KResult<()> {
        let id = self.envs.resolve(caller, target, true)?;
        let env = self.envs.get_mut(id).ok_or(SysError::BadTarget)?;
        env.space.remove(&mut self.frames, page)?;
        Ok(())
    }

    /// Downgrade-and-share: maps the write-eligible page at `src_page` in `src`
    /// into `dst` at `dst_page` as copy-on-write and downgrades the source
    /// mapping to copy-on-write as well.
    ///
    /// Either both mappings end up copy-on-write or, on error, neither space
    /// changed. User-available bits of the source mapping are carried over.
    pub fn page_share_cow(
        &mut self,
        caller: EnvId,
        src: EnvId,
        src_page: UserPage,
        dst: EnvId,
        dst_page: UserPage,
    ) -> KResult<()> {
        let src = self.envs.resolve(caller, src, true)?;
        let dst = self.envs.resolve(caller, dst, true)?;
        let mapping = self
            .envs
            .get(src)
            .and_then(|env| env.space.lookup(src_page))
            .ok_or(SysError::InvalidArgument)?;
        if !mapping.perm.is_write_eligible() {
            return Err(SysError::InvalidArgument.into());
        }
        let shared = Perm::REQUIRED | Perm::COW | (mapping.perm & Perm::AVAIL);
        let target = self.envs.get_mut(dst).ok_or(SysError::BadTarget)?;
        target.space.insert(&mut self.frames, dst_page, mapping.frame, shared)?;
        if let Some(source) = self.envs.get_mut(src) {
            source.space.protect(src_page, shared);
        }
        log_debug!(target: "mm", "cow {}:{:#x} -> {}:{:#x}", src, src_page.addr(), dst, dst_page.addr());
        Ok(())
    }

    /// Read access to `env`'s memory.
    pub fn view(&self, env: EnvId) -> Result<AddressSpaceView<'_>, SysError> {
        let env = self.envs.get(env).ok_or(SysError::BadTarget)?;
        Ok(AddressSpaceView::new(&env.space, &self.frames))
    }

    /// Write access to `env`'s memory.
    pub fn view_mut(&mut self, env: EnvId) -> Result<AddressSpaceViewMut<'_>, SysError> {
        let env = self.envs.get(env).ok_or(SysError::BadTarget)?;
        Ok(AddressSpaceViewMut::new(&env.space, &mut self.frames))
    }
}
