// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Debug-logging functionality.
//!
//! With the `log` feature disabled the macros here expand to nothing, so
//! neither log calls nor their format strings reach the binary. Decoders
//! still build and behave the same.
//!
//! `fwimage` code *should not* call into the [`log`] crate directly outside
//! of this module.

#[cfg(doc)]
use __raw_log as log;

/// Checks a condition, logging if it fails.
///
/// If the condition does not hold, constructs the given error, logs it, and
/// returns out of the current function with it.
macro_rules! check {
    ($cond:expr, $error:expr) => {
        if !$cond {
            let error = $error;
            return fail!(
                error,
                "check failure: `{}`; returned {:?}",
                stringify!($cond),
                error,
            );
        }
    };
}

/// Logs a newly-created error value and returns it wrapped in `Err`.
///
/// This macro is the main way to generate errors from input-driven failures.
/// The error is converted with `Into`, so the expansion must appear where
/// the error type is known, such as `return fail!(MyError)`.
macro_rules! fail {
    ($error:expr, $($format:tt)+) => {{
        error!($($format)+);
        Err($error.into())
    }};
    ($error:expr) => {{
        let error = $error;
        error!("generated error: `{:?}`", error);
        Err(error.into())
    }};
}

/// Redactable version of [`log::trace!()`].
macro_rules! trace {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        let _ = __raw_log::trace!($($args)*);
    }
}

/// Redactable version of [`log::info!()`].
#[allow(unused_macros)]
macro_rules! info {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        let _ = __raw_log::info!($($args)*);
    }
}

/// Redactable version of [`log::warn!()`].
macro_rules! warn {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        let _ = __raw_log::warn!($($args)*);
    }
}

/// Redactable version of [`log::error!()`].
macro_rules! error {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        let _ = __raw_log::error!($($args)*);
    }
}

/// Installs a stderr logger for unit tests before any test runs.
#[cfg(test)]
#[ctor::ctor]
fn init_test_logger() {
    env_logger::builder()
        .format(move |_, record| {
            let thread = std::thread::current();
            let name = thread.name().unwrap_or("<unknown>");
            for line in record.args().to_string().trim().lines() {
                // `eprintln!` output from passing tests is swallowed by the harness.
                eprintln!(
                    "[{level}({thread}) {file}:{line}] {msg}",
                    level = record.level(),
                    thread = name,
                    file = record.file().unwrap_or("<unknown>"),
                    line = record.line().unwrap_or(0),
                    msg = line,
                )
            }
            Ok(())
        })
        .init();
}
