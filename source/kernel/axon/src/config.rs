// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Boot-time kernel configuration.

use core::fmt;

use axon_abi::env::MAX_ENV_SLOTS;
use net_e1000::{NicConfig, NicError};

/// Largest frame arena addressable by a page-table entry.
pub const MAX_FRAMES: usize = 1 << 20;

/// Sizing of the kernel's fixed arenas and the attached NIC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelConfig {
    /// Physical page frames available to processes and page tables.
    pub frames: usize,
    /// Process table slots.
    pub max_envs: usize,
    /// NIC to attach at boot, if any.
    pub nic: Option<NicConfig>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self { frames: 1024, max_envs: 64, nic: Some(NicConfig::default()) }
    }
}

impl KernelConfig {
    pub fn with_frames(mut self, frames: usize) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_max_envs(mut self, max_envs: usize) -> Self {
        self.max_envs = max_envs;
        self
    }

    pub fn with_nic(mut self, nic: NicConfig) -> Self {
        self.nic = Some(nic);
        self
    }

    pub fn without_nic(mut self) -> Self {
        self.nic = None;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames == 0 || self.frames > MAX_FRAMES {
            return Err(ConfigError::Frames);
        }
        if self.max_envs == 0 || self.max_envs > MAX_ENV_SLOTS {
            return Err(ConfigError::MaxEnvs);
        }
        Ok(())
    }
}

/// Rejected configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    Frames,
    MaxEnvs,
}

/// Errors returned by [`crate::Kernel::boot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    Config(ConfigError),
    Nic(NicError),
}

impl From<ConfigError> for BootError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<NicError> for BootError {
    fn from(value: NicError) -> Self {
        Self::Nic(value)
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
