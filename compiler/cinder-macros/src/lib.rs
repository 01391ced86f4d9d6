//! Declarative macros used across the cinder compiler crates.

pub mod error;

#[cfg(feature = "assertion-macros")]
pub mod assertions;
