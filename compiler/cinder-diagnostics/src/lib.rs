//! Diagnostics shared across the cinder compiler crates.
//!
//! The only export is the [`ice!`] macro, used to abort on invariant
//! violations that indicate a bug in the compiler itself rather than in the
//! program being compiled. Reportable semantic errors use the per-crate
//! diagnostic error types instead.

/// Abort with an internal compiler error, reporting the location of the
/// violated invariant.
#[macro_export]
macro_rules! ice {
    ($message:expr) => {{
        let message = $message;
        panic!(
            "internal compiler error ({}:{}:{}):\n{}",
            file!(),
            line!(),
            column!(),
            message
        )
    }};
}
