//! Macro for declaring compiler diagnostic error types.
//!
//! A pass aggregates its individual error structs into a single enum with
//! [`declare_error_type`], which wires up `thiserror` and `miette` so that
//! each variant forwards to the diagnostic of the error it wraps.

/// Declare a new error type that can be used as a diagnostic error.
#[macro_export]
macro_rules! declare_error_type {
    {
        #[error($msg:expr)]
        $vis:vis enum $type_name:ident {
            $($name:ident($ty:ty),)*
        }
    } => {
        #[derive(thiserror::Error, miette::Diagnostic, Debug)]
        $vis enum $type_name {
            $(
                #[error(transparent)]
                #[diagnostic(transparent)]
                $name(#[from] $ty),
            )*
        }
    }
}
