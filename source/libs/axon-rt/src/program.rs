// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cooperative process bodies.
//!
//! A process runs as a sequence of `step` calls. Every return from `step` is
//! a suspension point: the harness may switch to another process before the
//! next step. The only ways to wait are returning [`Step::Yield`] (busy-poll
//! with backoff) or [`Step::Blocked`] after arming a `recv`.

use crate::sys::Sys;

/// What a step did, and what the harness should do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Made progress; may be stepped again right away.
    Ran,
    /// Nothing to do until some other process runs.
    Yield,
    /// Waiting in `recv`; the process is not runnable until a sender serves it.
    Blocked,
    /// Finished; the harness destroys the process.
    Exit,
}

/// Body of a process.
pub trait Program {
    /// Runs until the next suspension point.
    fn step(&mut self, sys: &mut Sys<'_>) -> Step;

    /// Short name for logs.
    fn name(&self) -> &str {
        "program"
    }
}
